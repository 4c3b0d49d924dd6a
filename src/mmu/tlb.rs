/// One cached translation. Mirrors the permission bits of the leaf PTE it
/// was filled from.
#[derive(Copy, Clone, Debug, Default)]
pub struct TlbEntry {
    pub virt_page_num: u64,
    pub phys_page_num: u64,
    pub time: u64, // last use, for replacement
    pub asid: u32,
    pub valid: bool,
    pub global: bool,
    pub user: bool,
    pub read: bool,
    pub write: bool,
    pub exec: bool,
    pub accessed: bool,
    pub dirty: bool,
}

/// Fixed-capacity fully-associative translation cache with LRU replacement.
/// Capacity never changes after construction, so the hot path allocates
/// nothing.
pub struct Tlb {
    entries: Vec<TlbEntry>,
    clock: u64,
}

impl Tlb {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "Tlb: capacity must be non-zero");
        Self {
            entries: vec![TlbEntry::default(); size],
            clock: 0,
        }
    }

    /// Look up a virtual page number. Global entries match any address
    /// space; when both a global and an exact-ASID entry exist for the same
    /// page, the exact one wins. A hit refreshes the entry's use time.
    pub fn find(&mut self, vpn: u64, asid: u32) -> Option<&mut TlbEntry> {
        let mut global_ix = None;
        let mut exact_ix = None;

        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.valid || entry.virt_page_num != vpn {
                continue;
            }
            if entry.asid == asid {
                exact_ix = Some(i);
                break;
            }
            if entry.global && global_ix.is_none() {
                global_ix = Some(i);
            }
        }

        let ix = exact_ix.or(global_ix)?;
        self.clock += 1;
        let entry = &mut self.entries[ix];
        entry.time = self.clock;
        Some(entry)
    }

    /// Insert a translation, reusing an invalid or same-key slot when one
    /// exists and evicting the least recently used entry otherwise.
    pub fn insert(&mut self, mut entry: TlbEntry) {
        self.clock += 1;
        entry.time = self.clock;
        entry.valid = true;

        let mut slot = None;
        for (i, e) in self.entries.iter().enumerate() {
            if e.valid && e.virt_page_num == entry.virt_page_num && e.asid == entry.asid {
                slot = Some(i);
                break;
            }
            if !e.valid && slot.is_none() {
                slot = Some(i);
            }
        }

        let ix = slot.unwrap_or_else(|| self.lru_victim());
        self.entries[ix] = entry;
    }

    /// Flush everything.
    pub fn invalidate(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.valid = false;
        }
    }

    /// Flush one address space. Global mappings survive.
    pub fn invalidate_asid(&mut self, asid: u32) {
        for entry in self.entries.iter_mut() {
            if entry.asid == asid && !entry.global {
                entry.valid = false;
            }
        }
    }

    /// Flush a single page of one address space. Global mappings survive.
    pub fn invalidate_page(&mut self, asid: u32, vpn: u64) {
        for entry in self.entries.iter_mut() {
            if entry.virt_page_num == vpn && entry.asid == asid && !entry.global {
                entry.valid = false;
            }
        }
    }

    fn lru_victim(&self) -> usize {
        let mut victim = 0;
        let mut low = u64::MAX;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.time < low {
                low = entry.time;
                victim = i;
            }
        }
        victim
    }
}
