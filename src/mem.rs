use crate::utils::UnsignedInteger;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemError {
    LoadMisaligned,
    LoadFault,
    StoreMisaligned,
    StoreFault,
}

/// Physical memory as seen by the translation core. Addresses are physical;
/// any failure (out of range, device refusal) comes back as a [`MemError`]
/// and is never fatal to the caller.
pub trait Mem {
    fn read<T>(&self, addr: u64) -> Result<T, MemError>
    where
        T: UnsignedInteger;

    /// `hart_ix` identifies the writing hart so that an embedder tracking
    /// per-hart memory consistency can attribute the store.
    fn write<T>(&mut self, hart_ix: usize, addr: u64, data: T) -> Result<(), MemError>
    where
        T: UnsignedInteger;
}
