use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Capability set of a physical memory region.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Attrib: u16 {
        const EXEC       = 1 << 0;
        const READ       = 1 << 1;
        const WRITE      = 1 << 2;
        const IDEMPOTENT = 1 << 3;
        const ATOMIC     = 1 << 4;
        const ICCM       = 1 << 5;
        const DCCM       = 1 << 6;
        const MEM_MAPPED = 1 << 7;
        const CACHED     = 1 << 8;
        const ALIGNED    = 1 << 10;

        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        const MAPPED     = Self::EXEC.bits() | Self::READ.bits() | Self::WRITE.bits();
        const DEFAULT    = Self::MAPPED.bits() | Self::IDEMPOTENT.bits() | Self::ATOMIC.bits();
    }
}

/// Physical memory attribute. Usually describes a page; once a page has been
/// fractured, one instance describes each word-aligned word of it. The
/// granularity flag is bookkeeping, not part of the attribute identity.
#[derive(Copy, Clone, Debug)]
pub struct Pma {
    attrib: Attrib,
    word: bool, // word granularity, otherwise page
}

impl Pma {
    pub fn new(attrib: Attrib) -> Self {
        Self {
            attrib,
            word: false,
        }
    }

    pub fn attrib(&self) -> Attrib {
        self.attrib
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.attrib.intersects(attrib)
    }

    pub fn is_mapped(&self) -> bool {
        self.attrib.intersects(Attrib::MAPPED)
    }

    pub fn is_read(&self) -> bool {
        self.attrib.contains(Attrib::READ)
    }

    pub fn is_write(&self) -> bool {
        self.attrib.contains(Attrib::WRITE)
    }

    pub fn is_exec(&self) -> bool {
        self.attrib.contains(Attrib::EXEC)
    }

    pub fn is_idempotent(&self) -> bool {
        self.attrib.contains(Attrib::IDEMPOTENT)
    }

    pub fn is_atomic(&self) -> bool {
        self.attrib.contains(Attrib::ATOMIC)
    }

    pub fn is_iccm(&self) -> bool {
        self.attrib.contains(Attrib::ICCM)
    }

    pub fn is_dccm(&self) -> bool {
        self.attrib.contains(Attrib::DCCM)
    }

    pub fn is_mem_mapped_reg(&self) -> bool {
        self.attrib.contains(Attrib::MEM_MAPPED)
    }

    pub fn is_cacheable(&self) -> bool {
        self.attrib.contains(Attrib::CACHED)
    }

    pub fn is_aligned(&self) -> bool {
        self.attrib.contains(Attrib::ALIGNED)
    }

    pub fn is_word_granular(&self) -> bool {
        self.word
    }
}

impl Default for Pma {
    /// Unmapped: every capability cleared.
    fn default() -> Self {
        Self::new(Attrib::empty())
    }
}

impl PartialEq for Pma {
    fn eq(&self, other: &Self) -> bool {
        self.attrib == other.attrib
    }
}

impl Eq for Pma {}

/// Per-address attribute lookup. One per memory, shared between harts.
///
/// Attributes live on pages until a range operation fails to line up with a
/// page boundary; such a page is fractured and its attributes tracked per
/// word-aligned word from then on.
pub struct PmaStore {
    page_pmas: Vec<Pma>,
    word_pmas: HashMap<u64, Pma>, // word index (addr >> 2) to pma
    mem_mapped_masks: HashMap<u64, u32>,
    mem_size: u64,
    page_size: u64,
    page_shift: u32,
}

impl PmaStore {
    pub fn new(mem_size: u64, page_size: u64) -> Self {
        assert!(
            page_size.is_power_of_two() && page_size >= 64,
            "PmaStore: invalid page size {}",
            page_size
        );

        let page_count = mem_size.div_ceil(page_size) as usize;
        Self {
            page_pmas: vec![Pma::new(Attrib::DEFAULT); page_count],
            word_pmas: HashMap::new(),
            mem_mapped_masks: HashMap::new(),
            mem_size,
            page_size,
            page_shift: page_size.trailing_zeros(),
        }
    }

    /// Attribute of the word-aligned word containing `addr`. Out-of-range
    /// addresses come back unmapped.
    pub fn get_pma(&self, addr: u64) -> Pma {
        let ix = (addr >> self.page_shift) as usize;
        let Some(pma) = self.page_pmas.get(ix) else {
            return Pma::default();
        };
        if pma.word {
            self.word_pmas.get(&(addr >> 2)).copied().unwrap_or_default()
        } else {
            *pma
        }
    }

    /// Turn `attrib` on in every word-aligned word overlapping `[addr0, addr1]`.
    pub fn enable(&mut self, addr0: u64, addr1: u64, attrib: Attrib) {
        self.apply(addr0, addr1, |a| a | attrib);
    }

    /// Turn `attrib` off in every word-aligned word overlapping `[addr0, addr1]`.
    pub fn disable(&mut self, addr0: u64, addr1: u64, attrib: Attrib) {
        self.apply(addr0, addr1, |a| a & !attrib);
    }

    /// Replace the attribute of every word-aligned word overlapping
    /// `[addr0, addr1]`.
    pub fn set_attribute(&mut self, addr0: u64, addr1: u64, attrib: Attrib) {
        self.apply(addr0, addr1, move |_| attrib);
    }

    pub fn get_page_start_addr(&self, addr: u64) -> u64 {
        (addr >> self.page_shift) << self.page_shift
    }

    pub fn set_mem_mapped_mask(&mut self, addr: u64, mask: u32) {
        self.mem_mapped_masks.insert(addr & !3, mask);
    }

    /// Write mask of the word-aligned word at `addr`. A word that never had a
    /// mask associated is fully writable.
    pub fn get_mem_mapped_mask(&self, addr: u64) -> u32 {
        self.mem_mapped_masks
            .get(&(addr & !3))
            .copied()
            .unwrap_or(0xffff_ffff)
    }

    /// Zero every word registered with a write mask in the given backing
    /// bytes.
    pub fn reset_mem_mapped(&self, data: &mut [u8]) {
        for &addr in self.mem_mapped_masks.keys() {
            let addr = addr as usize;
            if let Some(word) = data.get_mut(addr..addr + 4) {
                word.fill(0);
            }
        }
    }

    fn apply<F>(&mut self, addr0: u64, addr1: u64, f: F)
    where
        F: Fn(Attrib) -> Attrib + Copy,
    {
        if self.mem_size == 0 || addr0 > addr1 || addr0 >= self.mem_size {
            return;
        }

        let first = (addr0 >> 2) << 2;
        let last = (addr1.min(self.mem_size - 1) >> 2) << 2;

        for page in (first >> self.page_shift)..=(last >> self.page_shift) {
            let page_start = page << self.page_shift;
            let page_last_word = page_start + self.page_size - 4;
            let ix = page as usize;

            if first <= page_start && last >= page_last_word && !self.page_pmas[ix].word {
                let pma = &mut self.page_pmas[ix];
                pma.attrib = f(pma.attrib);
                continue;
            }

            // Partial overlap (or an already-fractured page): attributes are
            // tracked per word.
            self.fracture(page_start);
            for word_ix in (first.max(page_start) >> 2)..=(last.min(page_last_word) >> 2) {
                if let Some(pma) = self.word_pmas.get_mut(&word_ix) {
                    pma.attrib = f(pma.attrib);
                }
            }
        }
    }

    /// Replicate a page's attribute over each of its words. Pages already at
    /// word granularity are left alone.
    fn fracture(&mut self, addr: u64) {
        let ix = (addr >> self.page_shift) as usize;
        let pma = self.page_pmas[ix];
        if pma.word {
            return;
        }
        self.page_pmas[ix].word = true;

        let replicated = Pma {
            attrib: pma.attrib,
            word: true,
        };
        let mut word_ix = (ix as u64 * self.page_size) >> 2;
        for _ in 0..self.page_size / 4 {
            self.word_pmas.insert(word_ix, replicated);
            word_ix += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> PmaStore {
        PmaStore::new(0x1_0000, 0x1000)
    }

    #[test]
    fn default_and_out_of_range() {
        let store = store();
        assert_eq!(store.get_pma(0x0), Pma::new(Attrib::DEFAULT));
        assert!(store.get_pma(0x8000).is_mapped());
        assert!(store.get_pma(0x8000).is_atomic());

        let out = store.get_pma(0x1_0000);
        assert_eq!(out.attrib(), Attrib::empty());
        assert!(!out.is_mapped());
    }

    #[test]
    fn page_equality_ignores_granularity() {
        let page = Pma::new(Attrib::DEFAULT);
        let word = Pma {
            attrib: Attrib::DEFAULT,
            word: true,
        };
        assert_eq!(page, word);
    }

    #[test]
    fn enable_whole_pages_keeps_page_granularity() {
        let mut store = store();
        store.enable(0x2000, 0x3FFF, Attrib::ICCM);

        assert!(store.get_pma(0x2000).is_iccm());
        assert!(store.get_pma(0x3FFC).is_iccm());
        assert!(!store.get_pma(0x1FFC).is_iccm());
        assert!(!store.get_pma(0x4000).is_iccm());
        assert!(!store.get_pma(0x2000).is_word_granular());
    }

    #[test]
    fn disable_range() {
        let mut store = store();
        store.disable(0x0, 0xFFF, Attrib::WRITE);
        assert!(!store.get_pma(0x0).is_write());
        assert!(store.get_pma(0x0).is_read());
        assert!(store.get_pma(0x1000).is_write());
    }

    #[test]
    fn fracture_on_subpage_range() {
        let mut store = store();
        let mmr = Attrib::MEM_MAPPED | Attrib::READ | Attrib::WRITE;
        store.set_attribute(0x1008, 0x100F, mmr);

        assert!(!store.get_pma(0x1000).has(Attrib::MEM_MAPPED));
        assert!(store.get_pma(0x1008).has(Attrib::MEM_MAPPED));
        assert!(store.get_pma(0x100C).has(Attrib::MEM_MAPPED));
        assert!(!store.get_pma(0x1010).has(Attrib::MEM_MAPPED));

        // Words outside the range keep the page's pre-fracture attribute.
        assert_eq!(store.get_pma(0x1000), Pma::new(Attrib::DEFAULT));
        assert_eq!(store.get_pma(0x1008), Pma::new(mmr));
        assert!(store.get_pma(0x1000).is_word_granular());
    }

    #[test]
    fn fracture_is_idempotent() {
        let mut store = store();
        store.set_attribute(0x1008, 0x100F, Attrib::DCCM);
        store.set_attribute(0x1008, 0x100F, Attrib::DCCM);

        assert_eq!(store.get_pma(0x1008), Pma::new(Attrib::DCCM));
        assert_eq!(store.get_pma(0x1000), Pma::new(Attrib::DEFAULT));
    }

    #[test]
    fn enable_on_fractured_page_hits_every_word() {
        let mut store = store();
        store.set_attribute(0x1008, 0x100B, Attrib::DCCM);

        // The page is already word-granular; a full-page enable must reach
        // all of its words.
        store.enable(0x1000, 0x1FFF, Attrib::ALIGNED);
        assert!(store.get_pma(0x1000).is_aligned());
        assert!(store.get_pma(0x1008).is_aligned());
        assert!(store.get_pma(0x1FFC).is_aligned());
        assert!(store.get_pma(0x1008).is_dccm());
    }

    #[test]
    fn range_spanning_page_boundary() {
        let mut store = store();
        store.enable(0x1FF8, 0x2007, Attrib::ALIGNED);

        assert!(store.get_pma(0x1FF8).is_aligned());
        assert!(store.get_pma(0x2004).is_aligned());
        assert!(!store.get_pma(0x1FF4).is_aligned());
        assert!(!store.get_pma(0x2008).is_aligned());
        assert!(store.get_pma(0x1000).is_word_granular());
        assert!(store.get_pma(0x2000).is_word_granular());
    }

    #[test]
    fn out_of_range_operations_are_noops() {
        let mut store = store();
        store.enable(0x1_0000, 0x2_0000, Attrib::ICCM);
        store.set_attribute(0x8, 0x4, Attrib::ICCM); // empty range
        assert_eq!(store.get_pma(0x0), Pma::new(Attrib::DEFAULT));

        // Overlapping tail gets clamped, not rejected.
        store.enable(0xF000, 0x2_0000, Attrib::ICCM);
        assert!(store.get_pma(0xFFFC).is_iccm());
    }

    #[test]
    fn page_start_addr() {
        let store = store();
        assert_eq!(store.get_page_start_addr(0x1234), 0x1000);
        assert_eq!(store.get_page_start_addr(0x1FFF), 0x1000);
        assert_eq!(store.get_page_start_addr(0x2000), 0x2000);
    }

    #[test]
    fn mem_mapped_masks() {
        let mut store = store();
        assert_eq!(store.get_mem_mapped_mask(0x1000), 0xffff_ffff);

        store.set_mem_mapped_mask(0x1002, 0x00ff_00ff);
        assert_eq!(store.get_mem_mapped_mask(0x1000), 0x00ff_00ff);
        assert_eq!(store.get_mem_mapped_mask(0x1003), 0x00ff_00ff);
        assert_eq!(store.get_mem_mapped_mask(0x1004), 0xffff_ffff);
    }

    #[test]
    fn reset_mem_mapped_zeroes_registered_words() {
        let mut store = store();
        store.set_mem_mapped_mask(0x10, 0xff);
        store.set_mem_mapped_mask(0x20, 0xff00);

        let mut data = vec![0xAAu8; 0x40];
        store.reset_mem_mapped(&mut data);

        assert_eq!(&data[0x10..0x14], &[0, 0, 0, 0]);
        assert_eq!(&data[0x20..0x24], &[0, 0, 0, 0]);
        assert_eq!(data[0x0F], 0xAA);
        assert_eq!(data[0x14], 0xAA);
    }
}
