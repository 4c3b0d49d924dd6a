use num_enum::TryFromPrimitive;

pub const PAGE_OFFSET_BITS: u32 = 12;

/// Most levels any supported mode walks through.
pub const MAX_LEVELS: usize = 4;

/// Bit position of the first PPN slice inside a page table entry. The low
/// bits V|R|W|X|U|G|A|D plus the two RSW bits come first in every mode.
pub const PTE_PPN_LSB: u32 = 10;

/// Translation modes, with their satp MODE-field encodings.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum Mode {
    Bare = 0,
    Sv32 = 1,
    Sv39 = 8,
    Sv48 = 9,
}

/// Geometry of one paged translation mode: how many levels the table has,
/// how wide a table entry is on the wire, and how the VPN/PPN slices are cut.
/// Unused tail slots of the per-level arrays are zero.
pub struct SvLayout {
    pub levels: usize,
    pub pte_size: u64,
    pub vpn_width: u32,
    pub ppn_widths: [u32; MAX_LEVELS],
    pub pa_ppn_shifts: [u32; MAX_LEVELS],
}

pub static SV32_LAYOUT: SvLayout = SvLayout {
    levels: 2,
    pte_size: 4,
    vpn_width: 10,
    ppn_widths: [10, 12, 0, 0],
    pa_ppn_shifts: [12, 22, 0, 0],
};

pub static SV39_LAYOUT: SvLayout = SvLayout {
    levels: 3,
    pte_size: 8,
    vpn_width: 9,
    ppn_widths: [9, 9, 26, 0],
    pa_ppn_shifts: [12, 21, 30, 0],
};

pub static SV48_LAYOUT: SvLayout = SvLayout {
    levels: 4,
    pte_size: 8,
    vpn_width: 9,
    ppn_widths: [9, 9, 9, 17],
    pa_ppn_shifts: [12, 21, 30, 39],
};

impl Mode {
    pub fn layout(self) -> Option<&'static SvLayout> {
        match self {
            Mode::Bare => None,
            Mode::Sv32 => Some(&SV32_LAYOUT),
            Mode::Sv39 => Some(&SV39_LAYOUT),
            Mode::Sv48 => Some(&SV48_LAYOUT),
        }
    }

    /// Page sizes a leaf mapping may use under this mode.
    pub fn permits_page_size(self, size: u64) -> bool {
        const K4: u64 = 4096;
        const M2: u64 = 2 * 1024 * 1024;
        const G1: u64 = 1024 * 1024 * 1024;
        const G512: u64 = 512 * G1;

        match self {
            Mode::Bare | Mode::Sv32 => size == K4,
            Mode::Sv39 => size == K4 || size == M2 || size == G1,
            Mode::Sv48 => size == K4 || size == M2 || size == G1 || size == G512,
        }
    }
}

impl SvLayout {
    /// Bit position of PPN slice `level` inside a table entry.
    pub fn ppn_lsb(&self, level: usize) -> u32 {
        PTE_PPN_LSB + self.ppn_widths[..level].iter().sum::<u32>()
    }

    /// Width in bits of the whole PPN field.
    pub fn ppn_bits(&self) -> u32 {
        self.ppn_widths.iter().sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_from_satp_bits() {
        assert_eq!(Mode::try_from(0u8), Ok(Mode::Bare));
        assert_eq!(Mode::try_from(1u8), Ok(Mode::Sv32));
        assert_eq!(Mode::try_from(8u8), Ok(Mode::Sv39));
        assert_eq!(Mode::try_from(9u8), Ok(Mode::Sv48));
        assert!(Mode::try_from(10u8).is_err()); // Sv57 not supported
    }

    #[test]
    fn ppn_slice_positions() {
        assert_eq!(SV32_LAYOUT.ppn_lsb(0), 10);
        assert_eq!(SV32_LAYOUT.ppn_lsb(1), 20);
        assert_eq!(SV32_LAYOUT.ppn_bits(), 22);

        assert_eq!(SV39_LAYOUT.ppn_lsb(2), 28);
        assert_eq!(SV39_LAYOUT.ppn_bits(), 44);

        assert_eq!(SV48_LAYOUT.ppn_lsb(3), 37);
        assert_eq!(SV48_LAYOUT.ppn_bits(), 44);
    }

    #[test]
    fn permitted_page_sizes() {
        assert!(Mode::Sv32.permits_page_size(4096));
        assert!(!Mode::Sv32.permits_page_size(2 * 1024 * 1024));
        assert!(Mode::Sv39.permits_page_size(1 << 30));
        assert!(!Mode::Sv39.permits_page_size(512 << 30));
        assert!(Mode::Sv48.permits_page_size(512 << 30));
    }
}
