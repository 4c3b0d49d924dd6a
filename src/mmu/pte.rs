use bitflags::bitflags;

use crate::mmu::config::SvLayout;

bitflags! {
    pub struct PteFlags: u8 {
        const V = 1 << 0; // valid
        const R = 1 << 1; // read
        const W = 1 << 2; // write
        const X = 1 << 3; // execute
        const U = 1 << 4; // U-Mode
        const G = 1 << 5; // global mapping, survives ASID-selective flushes
        const A = 1 << 6; // accessed
        const D = 1 << 7; // dirty
    }
}

/// One page table entry, decoded against the geometry of its mode. The raw
/// bits round-trip unchanged through memory; accessors mask and shift.
#[derive(Copy, Clone)]
pub struct Pte {
    bits: u64,
    layout: &'static SvLayout,
}

impl Pte {
    pub fn new(bits: u64, layout: &'static SvLayout) -> Self {
        Self { bits, layout }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.bits as u8)
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(PteFlags::V)
    }

    pub fn is_readable(&self) -> bool {
        self.flags().contains(PteFlags::R)
    }

    pub fn is_writable(&self) -> bool {
        self.flags().contains(PteFlags::W)
    }

    pub fn is_executable(&self) -> bool {
        self.flags().contains(PteFlags::X)
    }

    pub fn is_user(&self) -> bool {
        self.flags().contains(PteFlags::U)
    }

    pub fn is_global(&self) -> bool {
        self.flags().contains(PteFlags::G)
    }

    pub fn is_accessed(&self) -> bool {
        self.flags().contains(PteFlags::A)
    }

    pub fn is_dirty(&self) -> bool {
        self.flags().contains(PteFlags::D)
    }

    pub fn set_accessed(&mut self) {
        self.bits |= PteFlags::A.bits() as u64;
    }

    pub fn set_dirty(&mut self) {
        self.bits |= PteFlags::D.bits() as u64;
    }

    /// PPN slice for level `level`. Each slice reads its own bit range.
    pub fn ppn_slice(&self, level: usize) -> u64 {
        let lsb = self.layout.ppn_lsb(level);
        (self.bits >> lsb) & ((1u64 << self.layout.ppn_widths[level]) - 1)
    }

    /// The whole physical page number.
    pub fn ppn(&self) -> u64 {
        use crate::mmu::config::PTE_PPN_LSB;
        (self.bits >> PTE_PPN_LSB) & ((1u64 << self.layout.ppn_bits()) - 1)
    }
}
