pub mod address;
pub mod config;
pub mod pte;
pub mod tlb;

pub use config::Mode;

use crate::{
    config::{mem_config, tlb_config},
    mem::{Mem, MemError},
    mmu::{
        address::{PhysicalAddr, VirtualAddr},
        config::SvLayout,
        pte::Pte,
        tlb::{Tlb, TlbEntry},
    },
    trap::{ExceptionCause, PrivilegeMode},
};

/// Intent of a memory access. Exactly one per translation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

impl AccessKind {
    /// The fault cause is decided by the intent alone, whatever the reason
    /// for the denial.
    pub fn page_fault(self) -> ExceptionCause {
        match self {
            AccessKind::Read => ExceptionCause::LoadPageFault,
            AccessKind::Write => ExceptionCause::StorePageFault,
            AccessKind::Execute => ExceptionCause::InstPageFault,
        }
    }
}

/// Virtual-to-physical address translation for one hart: satp-derived state,
/// a private TLB, and the Sv32/Sv39/Sv48 table walk. The backing physical
/// memory is borrowed per call.
pub struct Translator {
    hart_ix: usize,
    mode: Mode,
    page_table_root: u64, // page number of the root table
    asid: u32,
    page_size: u64,
    page_bits: u32,
    page_mask: u64,

    // Cached mstatus bits.
    exec_readable: bool, // MXR
    supervisor_ok: bool, // SUM
    fault_on_first_access: bool,

    tlb: Tlb,
}

impl Translator {
    pub fn new(hart_ix: usize) -> Self {
        Self::with_geometry(hart_ix, mem_config::PAGE_SIZE, tlb_config::ENTRY_COUNT)
    }

    pub fn with_geometry(hart_ix: usize, page_size: u64, tlb_size: usize) -> Self {
        assert!(
            page_size.is_power_of_two() && page_size >= 64,
            "Translator: invalid page size {}",
            page_size
        );

        Self {
            hart_ix,
            mode: Mode::Bare,
            page_table_root: 0,
            asid: 0,
            page_size,
            page_bits: page_size.trailing_zeros(),
            page_mask: page_size - 1,
            exec_readable: false,
            supervisor_ok: false,
            fault_on_first_access: false,
            tlb: Tlb::new(tlb_size),
        }
    }

    /// Translate `va` for the given privilege and intent. Returns the
    /// physical address, or the page-fault cause implied by the intent.
    /// Never retries and never panics; every denial folds into that one
    /// cause.
    pub fn translate<M: Mem>(
        &mut self,
        mem: &mut M,
        va: u64,
        priv_mode: PrivilegeMode,
        access: AccessKind,
    ) -> Result<u64, ExceptionCause> {
        if self.mode == Mode::Bare {
            return Ok(va);
        }

        let fault = access.page_fault();
        let exec_readable = self.exec_readable;
        let supervisor_ok = self.supervisor_ok;
        let fault_on_first_access = self.fault_on_first_access;

        // Fast path: the page is cached.
        let vpn = VirtualAddr(va).page_num(self.page_bits);
        if let Some(entry) = self.tlb.find(vpn, self.asid) {
            if !access_allowed(
                access,
                priv_mode,
                entry.user,
                entry.read,
                entry.write,
                entry.exec,
                exec_readable,
                supervisor_ok,
            ) {
                return Err(fault);
            }

            if !entry.accessed || (access == AccessKind::Write && !entry.dirty) {
                if fault_on_first_access {
                    return Err(fault);
                }
                entry.accessed = true;
                if access == AccessKind::Write {
                    entry.dirty = true;
                }
            }

            return Ok((entry.phys_page_num << self.page_bits) | (va & self.page_mask));
        }

        if !VirtualAddr(va).is_canonical(self.mode) {
            return Err(fault);
        }

        // Mode is not Bare here, so a layout exists.
        let Some(layout) = self.mode.layout() else {
            return Err(fault);
        };

        let (pa, entry) = self.walk(mem, va, priv_mode, access, layout)?;
        self.tlb.insert(entry);
        Ok(pa.into())
    }

    /// The multi-level walk of the privileged spec (section 4.3.2),
    /// parameterized by the mode's geometry. Produces the physical address
    /// and the TLB entry mirroring the leaf PTE.
    fn walk<M: Mem>(
        &self,
        mem: &mut M,
        address: u64,
        priv_mode: PrivilegeMode,
        access: AccessKind,
        layout: &'static SvLayout,
    ) -> Result<(PhysicalAddr, TlbEntry), ExceptionCause> {
        let fault = access.page_fault();
        let va: VirtualAddr = address.into();

        let mut table = self.page_table_root * self.page_size;
        let mut level = layout.levels - 1;

        let (mut pte, pte_addr) = loop {
            let pte_addr = table + va.vpn_slice(layout, level) * layout.pte_size;
            let bits = read_pte(mem, pte_addr, layout).map_err(|_| fault)?;
            let pte = Pte::new(bits, layout);

            if !pte.is_valid() || (pte.is_writable() && !pte.is_readable()) {
                return Err(fault);
            }
            if pte.is_readable() || pte.is_executable() {
                break (pte, pte_addr);
            }

            // Pointer to the next level down.
            if level == 0 {
                return Err(fault);
            }
            level -= 1;
            table = pte.ppn() * self.page_size;
        };

        if !access_allowed(
            access,
            priv_mode,
            pte.is_user(),
            pte.is_readable(),
            pte.is_writable(),
            pte.is_executable(),
            self.exec_readable,
            self.supervisor_ok,
        ) {
            return Err(fault);
        }

        // A leaf above level 0 maps a superpage; its low PPN slices must be
        // vacant, the virtual address supplies those bits.
        for j in 0..level {
            if pte.ppn_slice(j) != 0 {
                return Err(fault);
            }
        }

        if !pte.is_accessed() || (access == AccessKind::Write && !pte.is_dirty()) {
            if self.fault_on_first_access {
                return Err(fault);
            }
            pte.set_accessed();
            if access == AccessKind::Write {
                pte.set_dirty();
            }
            write_pte(mem, self.hart_ix, pte_addr, pte.bits(), layout).map_err(|_| fault)?;
        }

        let mut pa = va.offset();
        for j in 0..level {
            pa |= va.vpn_slice(layout, j) << layout.pa_ppn_shifts[j];
        }
        for j in level..layout.levels {
            pa |= pte.ppn_slice(j) << layout.pa_ppn_shifts[j];
        }

        let entry = TlbEntry {
            virt_page_num: va.page_num(self.page_bits),
            phys_page_num: pa >> self.page_bits,
            time: 0,
            asid: self.asid,
            valid: true,
            global: pte.is_global(),
            user: pte.is_user(),
            read: pte.is_readable(),
            write: pte.is_writable(),
            exec: pte.is_executable(),
            accessed: pte.is_accessed(),
            dirty: pte.is_dirty(),
        };

        Ok((PhysicalAddr(pa), entry))
    }

    // ============================================
    // ======= satp / mstatus derived state =======
    // ============================================

    pub fn set_page_table_root(&mut self, page_num: u64) {
        self.page_table_root = page_num;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_address_space(&mut self, asid: u32) {
        self.asid = asid;
    }

    pub fn set_exec_readable(&mut self, flag: bool) {
        self.exec_readable = flag;
    }

    pub fn set_supervisor_access_user(&mut self, flag: bool) {
        self.supervisor_ok = flag;
    }

    pub fn set_fault_on_first_access(&mut self, flag: bool) {
        self.fault_on_first_access = flag;
    }

    /// Change the base page size. Rejects sizes the current mode does not
    /// permit, leaving the geometry untouched.
    pub fn set_page_size(&mut self, size: u64) -> bool {
        if size == 0 || !size.is_power_of_two() {
            return false;
        }

        if !self.mode.permits_page_size(size) {
            log::warn!(
                "set_page_size: {:#x} not permitted in {:?} mode",
                size,
                self.mode
            );
            return false;
        }

        self.page_size = size;
        self.page_bits = size.trailing_zeros();
        self.page_mask = size - 1;
        true
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    // ============================================
    // ============== sfence.vma ==================
    // ============================================

    pub fn invalidate_tlb(&mut self) {
        self.tlb.invalidate();
    }

    pub fn invalidate_tlb_asid(&mut self, asid: u32) {
        self.tlb.invalidate_asid(asid);
    }

    pub fn invalidate_tlb_page(&mut self, asid: u32, va: u64) {
        let vpn = VirtualAddr(va).page_num(self.page_bits);
        self.tlb.invalidate_page(asid, vpn);
    }
}

/// Permission check shared by the TLB fast path and the walk leaf. `user`,
/// `read`, `write` and `exec` are the mapping's bits, wherever they are
/// cached.
#[allow(clippy::too_many_arguments)]
fn access_allowed(
    access: AccessKind,
    priv_mode: PrivilegeMode,
    user: bool,
    read: bool,
    write: bool,
    exec: bool,
    exec_readable: bool,
    supervisor_ok: bool,
) -> bool {
    if priv_mode == PrivilegeMode::User && !user {
        return false;
    }
    if priv_mode == PrivilegeMode::Supervisor && user && !supervisor_ok {
        return false;
    }

    match access {
        AccessKind::Read => read || (exec_readable && exec),
        AccessKind::Write => write,
        AccessKind::Execute => exec,
    }
}

fn read_pte<M: Mem>(mem: &M, addr: u64, layout: &SvLayout) -> Result<u64, MemError> {
    if layout.pte_size == 4 {
        mem.read::<u32>(addr).map(u64::from)
    } else {
        mem.read::<u64>(addr)
    }
}

fn write_pte<M: Mem>(
    mem: &mut M,
    hart_ix: usize,
    addr: u64,
    bits: u64,
    layout: &SvLayout,
) -> Result<(), MemError> {
    if layout.pte_size == 4 {
        mem.write::<u32>(hart_ix, addr, bits as u32)
    } else {
        mem.write::<u64>(hart_ix, addr, bits)
    }
}
