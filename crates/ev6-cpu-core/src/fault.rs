//! Translation-fault classification: turn a typed MMU failure into the
//! architectural condition, filling the fault scratch registers the PAL
//! handler will read (VA, VA_FORM/IVA_FORM, MM_STAT, EXC_SUM) before the
//! dispatcher vectors.

use ev6_mmu::{va_form, AccessType, Mmu, PteFlags, Stream, TranslateFault, PAGE_OFFSET_MASK};

use crate::exceptions::Condition;
use crate::mem::{CodeBlocks, MemoryBus};
use crate::state::CpuState;

/// EXC_SUM bit reporting a bad virtual address on the instruction stream.
const EXC_SUM_BAD_IVA: u64 = 1 << 41;

/// Classify a failed instruction-stream translation.
///
/// Captures EXC_SUM (and VA for the non-canonical case) and recomputes
/// IVA_FORM; returns the condition for the caller to raise.
pub fn classify_instruction_fault(
    cpu: &mut CpuState,
    mmu: &Mmu,
    vaddr: u64,
    fault: TranslateFault,
) -> Condition {
    let condition = match fault {
        TranslateFault::Miss => {
            cpu.exc_sum = 0;
            Condition::ItbMiss
        }
        TranslateFault::BadVirtualAddress => {
            cpu.exc_sum = EXC_SUM_BAD_IVA;
            cpu.va = vaddr;
            Condition::Iacv
        }
        TranslateFault::AccessViolation { .. } => {
            cpu.exc_sum = 0;
            Condition::Iacv
        }
    };
    cpu.iva_form = va_form(vaddr, cpu.i_vptb, mmu.va_ctl(Stream::Instruction));
    condition
}

/// Recompute VA_FORM for a data-stream fault.
pub fn capture_data_va_form(cpu: &mut CpuState, mmu: &Mmu, vaddr: u64) {
    cpu.va_form = va_form(vaddr, cpu.d_vptb, mmu.va_ctl(Stream::Data));
}

/// Classify a failed data-stream translation.
///
/// MM_STAT and EXC_SUM need the faulting instruction word, recovered through
/// the decode engine's block index: the block containing the current PC
/// yields the physical page the PC was fetched from.
///
/// # Panics
///
/// Panics when the block index has no block for the current PC; a data fault
/// can only arise from translated code, so that is a caller contract
/// violation (debugger-style probes must use [`ev6_mmu::Mmu::translate`]
/// directly).
pub fn classify_data_fault<M: MemoryBus, C: CodeBlocks>(
    cpu: &mut CpuState,
    mmu: &Mmu,
    vaddr: u64,
    access: AccessType,
    fault: TranslateFault,
    mem: &mut M,
    blocks: &C,
) -> Condition {
    let condition = match fault {
        TranslateFault::Miss => Condition::DtbmSingle,
        _ => Condition::DFault,
    };

    let block = blocks
        .locate_code_block(cpu.pc)
        .unwrap_or_else(|| panic!("data fault at pc {:#x} outside translated code", cpu.pc));
    let (low, _high) = blocks.block_physical_range(block);
    let phys_pc = (low & !PAGE_OFFSET_MASK) | (cpu.pc & PAGE_OFFSET_MASK);
    let insn = mem.read_u32(phys_pc);

    let flags = match fault {
        TranslateFault::AccessViolation { flags } => flags,
        _ => PteFlags::empty(),
    };
    let is_write = access == AccessType::Write;

    cpu.exc_sum = (((insn >> 21) & 0x1f) as u64) << 8;
    cpu.mm_stat = ((insn >> 26) << 4)
        | is_write as u32
        | if access == AccessType::Read && flags.contains(PteFlags::FAULT_ON_READ) {
            0x6
        } else {
            0
        }
        | if is_write && flags.contains(PteFlags::FAULT_ON_WRITE) {
            0xa
        } else {
            0
        }
        | if fault == TranslateFault::BadVirtualAddress {
            0x2
        } else {
            0
        };
    cpu.va = vaddr;
    capture_data_va_form(cpu, mmu, vaddr);

    condition
}

/// PAL-mode instruction fetches bypass translation: identity-map the page,
/// shifted by the relocation window when the address matches it.
pub fn translate_pal_fetch(cpu: &CpuState, vaddr: u64) -> u64 {
    let page = vaddr & !PAGE_OFFSET_MASK;
    if vaddr & cpu.pal_reloc_mask == cpu.pal_reloc_val {
        page.wrapping_add(cpu.pal_reloc_offset)
    } else {
        page
    }
}
