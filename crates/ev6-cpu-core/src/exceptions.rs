//! Exception and interrupt delivery: the transition into PAL mode and the
//! return from it.
//!
//! Entering PAL mode is a transition, never a stack push; the processor has
//! exactly one active PAL context, and the prior mode travels in bit 0 of
//! the saved exception address.

use crate::state::{CpuState, PalVariant, IR_CALL_PAL_SAVE, MMU_PAL_INDEX};

/// A raised architectural condition. Most carry an implementation vector
/// directly; the four generic helper conditions (illegal operation,
/// arithmetic trap, floating-disabled, interrupt) map to their vectors
/// through the PAL variant at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Miss while translating a virtual PTE access, 43-bit form.
    DtbmDouble3,
    /// Miss while translating a virtual PTE access, 48-bit form.
    DtbmDouble4,
    /// Floating-point disabled.
    Fen,
    Unalign,
    /// Data-stream translation miss with no entry at all.
    DtbmSingle,
    /// Data-stream access violation, fault-on bit, or bad virtual address.
    DFault,
    /// Illegal or reserved instruction encoding.
    Opcdec,
    /// Instruction-stream access violation or bad virtual address.
    Iacv,
    MachineCheck,
    /// Instruction-stream translation miss.
    ItbMiss,
    /// Arithmetic trap (integer overflow and friends).
    Arith,
    Interrupt,
    MtFpcr,
    Reset,
    /// Entry into PAL at a CALL_PAL vector.
    CallPal { offset: u64 },
}

/// Error code recorded alongside [`Condition::Arith`] for integer overflow.
pub const EXCP_ARITH_OVERFLOW: u64 = 0;

impl From<ev6_fp::FpFault> for Condition {
    fn from(fault: ev6_fp::FpFault) -> Self {
        match fault {
            // A reserved operand decodes like an illegal instruction.
            ev6_fp::FpFault::ReservedOperand => Condition::Opcdec,
            ev6_fp::FpFault::IntegerOverflow => Condition::Arith,
        }
    }
}

impl From<crate::alu::ArithmeticTrap> for Condition {
    fn from(fault: crate::alu::ArithmeticTrap) -> Self {
        match fault {
            crate::alu::ArithmeticTrap::IntegerOverflow => Condition::Arith,
        }
    }
}

/// CALL_PAL vectors carry this bit; delivery of such a vector may save the
/// return PC (see `I_CTL.CALL_PAL_R23`).
const CALL_PAL_CLASS_BIT: u64 = 0x2000;

impl Condition {
    /// The PAL entry offset for this condition.
    pub fn vector(self, variant: PalVariant) -> u64 {
        match variant {
            PalVariant::Pal21264 => match self {
                Condition::DtbmDouble3 => 0x0100,
                Condition::DtbmDouble4 => 0x0180,
                Condition::Fen => 0x0200,
                Condition::Unalign => 0x0280,
                Condition::DtbmSingle => 0x0300,
                Condition::DFault => 0x0380,
                Condition::Opcdec => 0x0400,
                Condition::Iacv => 0x0480,
                Condition::MachineCheck => 0x0500,
                Condition::ItbMiss => 0x0580,
                Condition::Arith => 0x0600,
                Condition::Interrupt => 0x0680,
                Condition::MtFpcr => 0x0700,
                Condition::Reset => 0x0780,
                Condition::CallPal { offset } => offset,
            },
        }
    }
}

/// Deliver the pending condition: vector into PAL mode.
///
/// Panics if no condition is pending, or when asked to deliver the generic
/// interrupt condition while already in PAL mode; both are decode-engine
/// contract violations, not guest-visible states.
pub fn do_interrupt(cpu: &mut CpuState) {
    let condition = cpu
        .exception
        .take()
        .expect("interrupt dispatch with no raised condition");

    if cpu.pal_mode && condition == Condition::Interrupt {
        panic!("interrupt condition delivered while already in PAL mode");
    }

    // Bit 0 of the saved address carries the prior mode.
    cpu.exc_addr = cpu.pc | cpu.pal_mode as u64;
    cpu.error_code = 0;

    let vector = condition.vector(cpu.pal_variant);

    if cpu.sde1 && cpu.exc_addr & 1 == 0 {
        cpu.swap_shadow();
    }
    if vector & CALL_PAL_CLASS_BIT != 0 && cpu.call_pal_r23 {
        cpu.ir[IR_CALL_PAL_SAVE] = cpu.pc;
    }
    if condition == Condition::Interrupt {
        cpu.irq.clear_hard_request();
    }

    cpu.set_pal_mode(true);
    cpu.mmu_code_index = MMU_PAL_INDEX;
    cpu.pc = cpu.pal_base + vector;
}

/// HW_RET: leave PAL mode (or stay, per bit 0 of the target).
///
/// Returning to non-PAL while an interrupt is summarized pending redirects
/// straight into the interrupt vector instead of completing the return, so
/// PAL code can never unmask interrupts without immediately servicing one.
pub fn hw_ret(cpu: &mut CpuState, target: u64) {
    match cpu.pal_variant {
        PalVariant::Pal21264 => {}
    }

    if target & 1 == 0 && cpu.irq.isum() != 0 {
        cpu.exc_addr = target;
        cpu.pc = cpu.pal_base + Condition::Interrupt.vector(cpu.pal_variant);
        cpu.irq.clear_hard_request();
        return;
    }

    cpu.pc = target & !3;
    let to_pal = target & 1 != 0;
    if cpu.pal_mode != to_pal {
        cpu.set_pal_mode(to_pal);
        cpu.mmu_code_index = if to_pal {
            MMU_PAL_INDEX
        } else {
            cpu.mmu_data_index
        };
        if cpu.sde1 && !to_pal {
            cpu.swap_shadow();
        }
    }
}
