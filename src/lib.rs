//! Memory attribution and address translation core of a RISC-V
//! instruction-set simulator.
//!
//! Two subsystems: a [`pma::PmaStore`] answering what the access properties
//! of a physical address are, at page or word granularity, and a
//! [`mmu::Translator`] implementing the Sv32/Sv39/Sv48 page-table walk
//! behind a per-hart TLB. The surrounding CPU model drives both; the
//! backing physical memory is any [`Mem`] implementation.

pub mod config;
pub mod logging;
pub mod mem;
pub mod mmu;
pub mod pma;
pub mod ram;
pub mod trap;
pub mod utils;

pub use config::{mem_config, tlb_config};
pub use mem::{Mem, MemError};
pub use mmu::{AccessKind, Mode, Translator};
pub use pma::{Attrib, Pma, PmaStore};
pub use ram::Ram;
pub use trap::{ExceptionCause, PrivilegeMode};
