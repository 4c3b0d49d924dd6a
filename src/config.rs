pub mod mem_config {
    /// Base page size. Larger page sizes are opt-in through the translator.
    pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
    pub const PAGE_SHIFT: u32 = 12;

    /// Default size of the flat physical memory, in bytes.
    pub const SIZE: usize = 0x800_0000;
}

pub mod tlb_config {
    /// Number of translation cache slots per hart.
    pub const ENTRY_COUNT: usize = 32;
}
