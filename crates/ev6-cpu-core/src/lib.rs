//! Privileged core of a 21264-class CPU: architectural state, the internal
//! processor register file, translation-fault classification, and
//! exception/interrupt delivery.
//!
//! The decode/dispatch engine drives this crate: it calls the arithmetic and
//! format helpers inline, [`ev6_mmu::Mmu::translate`] for every guest
//! access, and the classifiers here when translation fails. Helpers never
//! unwind; a fault is an `Err` carrying the [`Condition`] to raise, the
//! engine abandons the instruction, and [`do_interrupt`] vectors into PAL
//! mode. Physical memory and the translated-code index stay behind the
//! capability traits in [`mem`].

#![forbid(unsafe_code)]

pub mod alu;
pub mod exceptions;
pub mod fault;
pub mod hw_mem;
pub mod interrupts;
pub mod ipr;
pub mod mem;
pub mod state;

pub use exceptions::{do_interrupt, hw_ret, Condition, EXCP_ARITH_OVERFLOW};
pub use interrupts::InterruptLines;
pub use mem::{CodeBlocks, CoreHooks, MemoryBus};
pub use state::{CpuState, PalVariant, RoundingMode, MMU_PAL_INDEX, SHADOWED_REGS};

// Re-export the MMU types that appear in this crate's signatures.
pub use ev6_mmu::{
    AccessMode, AccessType, Mmu, PhysMapping, ProbeFault, Prot, Pte, PteFlags, Stream,
    TranslateFault,
};
