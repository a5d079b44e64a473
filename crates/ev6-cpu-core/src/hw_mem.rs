//! Privileged (HW_LD/HW_ST) virtual loads and stores.
//!
//! PAL code uses these to walk page tables and touch guest memory through
//! the data translation buffer without taking the normal fault path. A miss
//! during a virtual-PTE access vectors to the double-miss handlers; other
//! failures produce the single-miss or data-fault conditions with MM_STAT
//! synthesized from the qualifier, not from a decoded instruction.

use bitflags::bitflags;
use ev6_mmu::{Mmu, ProbeFault, Stream, PAGE_BITS, PAGE_OFFSET_MASK};

use crate::exceptions::Condition;
use crate::fault::capture_data_va_form;
use crate::mem::MemoryBus;
use crate::state::CpuState;

bitflags! {
    /// HW_LD/HW_ST qualifier bits, as encoded by the decode engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HwAccess: u32 {
        /// Virtual PTE fetch: a miss is a double miss.
        const VPTE = 1 << 2;
        /// Check write (or read, for loads) permission against the mode.
        const WRITE_CHECK = 1 << 3;
        /// Use the ALT_MODE register instead of the encoded mode.
        const ALT = 1 << 8;
    }
}

struct VirtToPhysParams {
    /// MM_STAT opcode field for this access kind.
    op: u32,
    /// Bit position of the kernel enable bit (KRE or KWE).
    enable_shift: u32,
    /// Bit position of the fault-on bit (FOR or FOW).
    fault_on_shift: u32,
}

const LOAD_PARAMS: VirtToPhysParams = VirtToPhysParams {
    op: 0x03,
    enable_shift: 8,
    fault_on_shift: 1,
};
const STORE_PARAMS: VirtToPhysParams = VirtToPhysParams {
    op: 0x07,
    enable_shift: 12,
    fault_on_shift: 2,
};

fn virt_to_phys(
    cpu: &mut CpuState,
    mmu: &Mmu,
    vaddr: u64,
    mode: u8,
    flags: HwAccess,
    params: &VirtToPhysParams,
) -> Result<u64, Condition> {
    let mode = if flags.contains(HwAccess::ALT) {
        cpu.altmode
    } else {
        mode & 3
    };

    let pte = match mmu.probe(Stream::Data, vaddr, cpu.asn) {
        Ok(pte) => pte,
        Err(probe_fault) => {
            let condition = if flags.contains(HwAccess::VPTE) {
                // Missed while fetching a PTE through the virtual window:
                // the double-miss handler matching the page-table depth.
                if mmu.va_ctl(Stream::Instruction) != 0 {
                    Condition::DtbmDouble4
                } else {
                    Condition::DtbmDouble3
                }
            } else {
                cpu.mm_stat = (params.op << 4)
                    | if probe_fault == ProbeFault::BadVirtualAddress {
                        2
                    } else {
                        0
                    };
                cpu.va = vaddr;
                Condition::DtbmSingle
            };
            capture_data_va_form(cpu, mmu, vaddr);
            return Err(condition);
        }
    };

    if flags.contains(HwAccess::WRITE_CHECK) {
        let bits = pte.flags.bits();
        let enabled = (bits >> (mode as u32 + params.enable_shift)) & 1 != 0;
        let fault_on = (bits >> params.fault_on_shift) & 1 != 0;
        if !enabled || fault_on {
            cpu.mm_stat = (params.op << 4)
                | if enabled { 0 } else { 2 }
                | if fault_on { 4 } else { 0 };
            cpu.va = vaddr;
            capture_data_va_form(cpu, mmu, vaddr);
            return Err(Condition::DFault);
        }
    }

    Ok(((pte.pfn as u64) << PAGE_BITS) | (vaddr & PAGE_OFFSET_MASK))
}

/// HW_LD quadword. On `Err`, the fault registers are filled and the caller
/// raises the returned condition.
pub fn hw_load_u64<M: MemoryBus>(
    cpu: &mut CpuState,
    mmu: &Mmu,
    mem: &mut M,
    vaddr: u64,
    mode: u8,
    flags: HwAccess,
) -> Result<u64, Condition> {
    let paddr = virt_to_phys(cpu, mmu, vaddr, mode, flags, &LOAD_PARAMS)?;
    Ok(mem.read_u64(paddr))
}

/// HW_LD longword, sign-extended.
pub fn hw_load_u32<M: MemoryBus>(
    cpu: &mut CpuState,
    mmu: &Mmu,
    mem: &mut M,
    vaddr: u64,
    mode: u8,
    flags: HwAccess,
) -> Result<u64, Condition> {
    let paddr = virt_to_phys(cpu, mmu, vaddr, mode, flags, &LOAD_PARAMS)?;
    Ok(mem.read_u32(paddr) as i32 as i64 as u64)
}

/// HW_ST quadword.
pub fn hw_store_u64<M: MemoryBus>(
    cpu: &mut CpuState,
    mmu: &Mmu,
    mem: &mut M,
    vaddr: u64,
    value: u64,
    mode: u8,
    flags: HwAccess,
) -> Result<(), Condition> {
    let paddr = virt_to_phys(cpu, mmu, vaddr, mode, flags, &STORE_PARAMS)?;
    mem.write_u64(paddr, value);
    Ok(())
}

/// HW_ST longword.
pub fn hw_store_u32<M: MemoryBus>(
    cpu: &mut CpuState,
    mmu: &Mmu,
    mem: &mut M,
    vaddr: u64,
    value: u32,
    mode: u8,
    flags: HwAccess,
) -> Result<(), Condition> {
    let paddr = virt_to_phys(cpu, mmu, vaddr, mode, flags, &STORE_PARAMS)?;
    mem.write_u32(paddr, value);
    Ok(())
}
