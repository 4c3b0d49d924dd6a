use crate::{
    config::mem_config,
    mem::{Mem, MemError},
    utils::{UnsignedInteger, check_align, read_raw_ptr, write_raw_ptr},
};

/// Flat zero-initialized physical memory. One per simulated machine, shared
/// by every hart.
pub struct Ram {
    data: Box<[u8]>,
}

impl Ram {
    pub fn new() -> Self {
        Self::with_size(mem_config::SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Raw view of the backing bytes, for callers that reset memory-mapped
    /// register words in place.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn load_image(&mut self, image: &[u8], start_addr: u64) {
        if start_addr >= self.data.len() as u64
            || start_addr as usize + image.len() > self.data.len()
        {
            log::error!("ram::load_image out of range! start_addr = {:#x}", start_addr);
            panic!();
        }

        let start_addr = start_addr as usize;
        self.data[start_addr..start_addr + image.len()].copy_from_slice(image);
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Mem for Ram {
    fn read<T>(&self, addr: u64) -> Result<T, MemError>
    where
        T: UnsignedInteger,
    {
        if addr >= self.data.len() as u64 || addr as usize + size_of::<T>() > self.data.len() {
            return Err(MemError::LoadFault);
        }
        if !check_align::<T>(addr) {
            return Err(MemError::LoadMisaligned);
        }

        let raw = unsafe { read_raw_ptr::<T>(self.data.as_ptr().add(addr as usize)) };
        Ok(T::from_le(raw))
    }

    fn write<T>(&mut self, _hart_ix: usize, addr: u64, data: T) -> Result<(), MemError>
    where
        T: UnsignedInteger,
    {
        if addr >= self.data.len() as u64 || addr as usize + size_of::<T>() > self.data.len() {
            return Err(MemError::StoreFault);
        }
        if !check_align::<T>(addr) {
            return Err(MemError::StoreMisaligned);
        }

        unsafe { write_raw_ptr(self.data.as_mut_ptr().add(addr as usize), T::to_le(data)) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zeroed() {
        let r = Ram::with_size(0x1000);
        for addr in (0..0x1000).step_by(8) {
            assert_eq!(r.read::<u64>(addr).unwrap(), 0);
        }
    }

    #[test]
    fn load_image_and_read() {
        let mut r = Ram::with_size(0x1000);
        let section = [0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        r.load_image(&section, 0);

        assert_eq!(r.read::<u8>(0).unwrap(), 0x12);
        assert_eq!(r.read::<u16>(0).unwrap(), 0x3412);
        assert_eq!(r.read::<u32>(0).unwrap(), 0x78563412);
        assert_eq!(r.read::<u64>(0).unwrap(), 0xF0DEBC9A78563412);
    }

    #[test]
    fn write_is_little_endian() {
        let mut ram = Ram::with_size(0x1000);
        ram.write::<u32>(0, 0x00, 0x12345678).unwrap();
        assert_eq!(ram.read::<u8>(0x00).unwrap(), 0x78);
        assert_eq!(ram.read::<u8>(0x01).unwrap(), 0x56);
        assert_eq!(ram.read::<u8>(0x02).unwrap(), 0x34);
        assert_eq!(ram.read::<u8>(0x03).unwrap(), 0x12);
    }

    #[test]
    fn out_of_range_and_misaligned() {
        let mut ram = Ram::with_size(0x100);
        assert_eq!(ram.read::<u64>(0x100), Err(MemError::LoadFault));
        assert_eq!(ram.read::<u64>(0xFC), Err(MemError::LoadFault));
        assert_eq!(ram.read::<u64>(0x04), Err(MemError::LoadMisaligned));
        assert_eq!(ram.write::<u32>(0, 0x102, 1), Err(MemError::StoreFault));
        assert_eq!(ram.write::<u32>(0, 0x02, 1), Err(MemError::StoreMisaligned));
    }
}
