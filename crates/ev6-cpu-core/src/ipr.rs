//! The internal processor register file (HW_MFPR/HW_MTPR space).
//!
//! Every register carries its documented side effects: translation-buffer
//! fills and flushes, the shadow-register swap on SDE1 toggles, interrupt
//! summary recomputation, derived-mapping invalidation. Reads of write-only
//! or unmodeled registers return zero; writes with unsupported bit patterns
//! are diagnosed and dropped, never fatal — firmware probes undocumented
//! bits.

use ev6_mmu::{Mmu, Pte, PteFlags, Stream};

use crate::mem::CoreHooks;
use crate::state::CpuState;

// Ebox.
pub const IPR_CC: u16 = 0xc0;
pub const IPR_CC_CTL: u16 = 0xc1;
pub const IPR_VA: u16 = 0xc2;
pub const IPR_VA_FORM: u16 = 0xc3;
pub const IPR_VA_CTL: u16 = 0xc4;

// Ibox.
pub const IPR_ITB_TAG: u16 = 0x00;
pub const IPR_ITB_PTE: u16 = 0x01;
pub const IPR_ITB_IAP: u16 = 0x02;
pub const IPR_ITB_IA: u16 = 0x03;
pub const IPR_ITB_IS: u16 = 0x04;
pub const IPR_PMPC: u16 = 0x05;
pub const IPR_EXC_ADDR: u16 = 0x06;
pub const IPR_IVA_FORM: u16 = 0x07;
pub const IPR_CM: u16 = 0x09;
pub const IPR_IER: u16 = 0x0a;
pub const IPR_IER_CM: u16 = 0x0b;
pub const IPR_SIRR: u16 = 0x0c;
pub const IPR_ISUM: u16 = 0x0d;
pub const IPR_HW_INT_CLR: u16 = 0x0e;
pub const IPR_EXC_SUM: u16 = 0x0f;
pub const IPR_PAL_BASE: u16 = 0x10;
pub const IPR_I_CTL: u16 = 0x11;
pub const IPR_IC_FLUSH_ASM: u16 = 0x12;
pub const IPR_IC_FLUSH: u16 = 0x13;
pub const IPR_PCTR_CTL: u16 = 0x14;
pub const IPR_CLR_MAP: u16 = 0x15;
pub const IPR_I_STAT: u16 = 0x16;
pub const IPR_SLEEP: u16 = 0x17;
pub const IPR_PCTX: u16 = 0x40;
pub const IPR_PCTX_ALL: u16 = 0x5f;

// Mbox.
pub const IPR_DTB_TAG0: u16 = 0x20;
pub const IPR_DTB_PTE0: u16 = 0x21;
pub const IPR_DTB_IAP: u16 = 0xa2;
pub const IPR_DTB_IA: u16 = 0xa3;
pub const IPR_DTB_IS0: u16 = 0x24;
pub const IPR_DTB_IS1: u16 = 0xa4;
pub const IPR_DTB_ASN0: u16 = 0x25;
pub const IPR_DTB_ASN1: u16 = 0xa5;
pub const IPR_DTB_ALTMODE0: u16 = 0x26;
pub const IPR_DTB_ALTMODE: u16 = 0xa6;
pub const IPR_DTB_TAG1: u16 = 0xa0;
pub const IPR_DTB_PTE1: u16 = 0xa1;
pub const IPR_MM_STAT: u16 = 0x27;
pub const IPR_M_CTL: u16 = 0x28;
pub const IPR_DC_CTL: u16 = 0x29;
pub const IPR_DC_STAT: u16 = 0x2a;

// Cbox.
pub const IPR_C_DATA: u16 = 0x2b;
pub const IPR_C_SHIFT: u16 = 0x2c;

// Field placement.
pub const CM_SHIFT: u32 = 3;
pub const CM_MASK: u64 = 3 << CM_SHIFT;
const CC_CTL_ENA_SHIFT: u32 = 32;
const CC_CTL_COUNTER_MASK: u64 = 0xffff_fff0;
const I_CTL_IC_EN_SHIFT: u32 = 1;
const I_CTL_SPE_SHIFT: u32 = 3;
const I_CTL_SDE1_SHIFT: u32 = 7;
const I_CTL_HWE_SHIFT: u32 = 12;
const I_CTL_VA_48_SHIFT: u32 = 15;
const I_CTL_CALL_PAL_R23_SHIFT: u32 = 20;
const I_CTL_CHIP_ID_SHIFT: u32 = 24;
const VA_CTL_VA_48_SHIFT: u32 = 1;
const M_CTL_SPE_SHIFT: u32 = 1;
const DTB_ASN_SHIFT: u32 = 56;
const PCTX_PPCE_SHIFT: u32 = 1;
const PCTX_FPE_SHIFT: u32 = 2;
const PCTX_ASTER_SHIFT: u32 = 5;
const PCTX_ASTRR_SHIFT: u32 = 9;
const PCTX_ASN_SHIFT: u32 = 39;

// PCTX field-select bits, carried in the register number.
const PCTX_SEL_ASN: u16 = 0x01;
const PCTX_SEL_ASTER: u16 = 0x02;
const PCTX_SEL_ASTRR: u16 = 0x04;
const PCTX_SEL_PPCE: u16 = 0x08;
const PCTX_SEL_FPE: u16 = 0x10;

const ITB_PTE_WRITE_MASK: u64 = 0x0000_0fff_ffff_ef70;
const DTB_PTE_WRITE_MASK: u64 = 0x7fff_ffff_0000_ffe6;
const TB_TAG_MASK: u64 = 0x0000_ffff_ffff_e000;
const PAL_BASE_MASK: u64 = 0x0000_0fff_ffff_8000;

/// Read an internal processor register. Unmodeled registers read zero.
pub fn read_ipr(cpu: &CpuState, mmu: &Mmu, iprn: u16) -> u64 {
    match iprn {
        IPR_PAL_BASE => cpu.pal_base,
        IPR_I_CTL => {
            cpu.i_vptb
                | ((cpu.chip_id as u64) << I_CTL_CHIP_ID_SHIFT)
                | ((mmu.va_ctl(Stream::Instruction) as u64) << I_CTL_VA_48_SHIFT)
                | ((cpu.hwe as u64) << I_CTL_HWE_SHIFT)
                | ((cpu.sde1 as u64) << I_CTL_SDE1_SHIFT)
                | ((cpu.ic_en as u64) << I_CTL_IC_EN_SHIFT)
                | ((cpu.call_pal_r23 as u64) << I_CTL_CALL_PAL_R23_SHIFT)
                | ((mmu.tlb(Stream::Instruction).superpage_enable() as u64) << I_CTL_SPE_SHIFT)
        }
        IPR_IVA_FORM => cpu.iva_form,
        IPR_VA => cpu.va,
        IPR_EXC_ADDR => cpu.exc_addr,
        IPR_I_STAT | IPR_DC_STAT => 0,
        IPR_C_DATA | IPR_C_SHIFT => 0,
        IPR_PCTX..=IPR_PCTX_ALL => {
            ((cpu.asn as u64) << PCTX_ASN_SHIFT)
                | ((cpu.astrr as u64) << PCTX_ASTRR_SHIFT)
                | ((cpu.aster as u64) << PCTX_ASTER_SHIFT)
                | ((cpu.fen as u64) << PCTX_FPE_SHIFT)
                | ((cpu.ppce as u64) << PCTX_PPCE_SHIFT)
        }
        IPR_IER_CM | IPR_CM | IPR_IER => ((cpu.cm as u64) << CM_SHIFT) | cpu.irq.ier(),
        IPR_ISUM => cpu.irq.isum(),
        IPR_SIRR => cpu.irq.sirr(),
        IPR_MM_STAT => cpu.mm_stat as u64,
        IPR_VA_FORM => cpu.va_form,
        IPR_EXC_SUM => cpu.exc_sum,
        _ => {
            tracing::warn!(iprn, "read of unmodeled internal register");
            0
        }
    }
}

/// Write an internal processor register, applying its side effects.
pub fn write_ipr(
    cpu: &mut CpuState,
    mmu: &mut Mmu,
    hooks: &mut dyn CoreHooks,
    iprn: u16,
    value: u64,
) {
    match iprn {
        IPR_CC => {
            cpu.cc_offset = (value >> 32) << 32;
        }
        IPR_CC_CTL => {
            cpu.cc_ena = (value >> CC_CTL_ENA_SHIFT) & 1 != 0;
            cpu.cc_counter = (value & CC_CTL_COUNTER_MASK) as u32;
            cpu.cc_load_ticks = hooks.ticks();
        }
        IPR_ITB_TAG => {
            cpu.itb_tag = value & TB_TAG_MASK;
        }
        IPR_DTB_TAG0 => {
            cpu.dtb_tag = value & TB_TAG_MASK;
        }
        // The duplicate Mbox bank is accepted and dropped.
        IPR_DTB_TAG1 | IPR_DTB_ASN1 | IPR_DTB_PTE1 => {}
        IPR_ITB_PTE => {
            cpu.itb_pte = value & ITB_PTE_WRITE_MASK;
            let pte = Pte {
                pfn: (cpu.itb_pte >> 13) as u32,
                flags: PteFlags::from_bits_retain((cpu.itb_pte & 0x1fff) as u16)
                    | PteFlags::VALID,
                asn: cpu.asn,
            };
            mmu.tlb_mut(Stream::Instruction).insert(cpu.itb_tag, pte);
        }
        IPR_DTB_PTE0 => {
            cpu.dtb_pte = value & DTB_PTE_WRITE_MASK;
            let pte = Pte {
                pfn: (cpu.dtb_pte >> 32) as u32,
                flags: PteFlags::from_bits_retain(cpu.dtb_pte as u16) | PteFlags::VALID,
                asn: cpu.asn,
            };
            mmu.tlb_mut(Stream::Data).insert(cpu.dtb_tag, pte);
        }
        IPR_DTB_ASN0 => {
            cpu.dtb_asn = (value >> DTB_ASN_SHIFT) as u8;
        }
        IPR_PAL_BASE => {
            cpu.pal_base = value & PAL_BASE_MASK;
        }
        IPR_I_CTL => {
            let old_sde1 = cpu.sde1;
            cpu.i_vptb = ((((value as i64) << 16) >> 16) as u64) & 0xffff_ffff_c000_0000;
            cpu.hwe = (value >> I_CTL_HWE_SHIFT) & 1 != 0;
            cpu.sde1 = (value >> I_CTL_SDE1_SHIFT) & 1 != 0;
            mmu.set_va_ctl(Stream::Instruction, ((value >> I_CTL_VA_48_SHIFT) & 3) as u8);
            mmu.tlb_mut(Stream::Instruction)
                .set_superpage_enable(((value >> I_CTL_SPE_SHIFT) & 7) as u8);
            cpu.call_pal_r23 = (value >> I_CTL_CALL_PAL_R23_SHIFT) & 1 != 0;
            // Toggling shadow enable while already in PAL mode swaps
            // immediately; the return path will swap back.
            if cpu.pal_mode && old_sde1 != cpu.sde1 {
                cpu.swap_shadow();
            }
        }
        IPR_VA_CTL => {
            cpu.d_vptb = value & 0xffff_ffff_c000_0000;
            mmu.set_va_ctl(Stream::Data, ((value >> VA_CTL_VA_48_SHIFT) & 3) as u8);
            if value & 1 != 0 {
                tracing::warn!("VA_CTL byte-swap mode is not modeled; bit ignored");
            }
        }
        IPR_IER_CM | IPR_CM | IPR_IER => {
            if iprn & 2 != 0 {
                cpu.irq.write_ier(value);
            }
            if iprn & 1 != 0 {
                cpu.cm = ((value & CM_MASK) >> CM_SHIFT) as u8;
                cpu.mmu_data_index = cpu.cm;
            }
        }
        IPR_IC_FLUSH | IPR_IC_FLUSH_ASM => {
            hooks.invalidate_code_all();
        }
        IPR_ITB_IA => {
            hooks.invalidate_code_all();
            mmu.tlb_mut(Stream::Instruction).flush_all();
        }
        IPR_ITB_IAP => {
            hooks.invalidate_code_all();
            mmu.tlb_mut(Stream::Instruction).flush_non_asm();
        }
        IPR_ITB_IS => {
            let asn = cpu.asn;
            mmu.tlb_mut(Stream::Instruction)
                .flush_page(value, asn, |page| hooks.invalidate_code_page(page));
        }
        IPR_DTB_IA => {
            hooks.invalidate_code_all();
            mmu.tlb_mut(Stream::Data).flush_all();
        }
        IPR_DTB_IAP => {
            hooks.invalidate_code_all();
            mmu.tlb_mut(Stream::Data).flush_non_asm();
        }
        IPR_DTB_IS0 => {
            let asn = cpu.asn;
            mmu.tlb_mut(Stream::Data)
                .flush_page(value, asn, |page| hooks.invalidate_code_page(page));
        }
        IPR_DTB_IS1 => {}
        IPR_I_STAT | IPR_DC_STAT => {}
        IPR_MM_STAT => {} // read-only
        IPR_PCTX..=IPR_PCTX_ALL => {
            if iprn & PCTX_SEL_ASN != 0 {
                let new_asn = (value >> PCTX_ASN_SHIFT) as u8;
                if new_asn != cpu.asn {
                    cpu.asn = new_asn;
                    // Derived mappings are not ASN-tagged; drop them all.
                    // The architectural buffers keep their tagged entries.
                    hooks.invalidate_code_all();
                }
            }
            if iprn & PCTX_SEL_ASTRR != 0 {
                cpu.astrr = ((value >> PCTX_ASTRR_SHIFT) & 0xf) as u8;
                if cpu.astrr != 0 {
                    tracing::warn!(astrr = cpu.astrr, "AST request bits are not modeled");
                }
            }
            if iprn & PCTX_SEL_ASTER != 0 {
                cpu.aster = ((value >> PCTX_ASTER_SHIFT) & 0xf) as u8;
                if cpu.aster != 0 {
                    tracing::warn!(aster = cpu.aster, "AST enable bits are not modeled");
                }
            }
            if iprn & PCTX_SEL_FPE != 0 {
                cpu.fen = (value >> PCTX_FPE_SHIFT) & 1 != 0;
            }
            if iprn & PCTX_SEL_PPCE != 0 {
                cpu.ppce = (value >> PCTX_PPCE_SHIFT) & 1 != 0;
            }
        }
        IPR_M_CTL => {
            mmu.tlb_mut(Stream::Data)
                .set_superpage_enable(((value >> M_CTL_SPE_SHIFT) & 7) as u8);
        }
        IPR_SIRR => {
            cpu.irq.write_sirr(value);
        }
        IPR_HW_INT_CLR => {}
        IPR_DTB_ALTMODE0 | IPR_DTB_ALTMODE => {
            cpu.altmode = (value & 3) as u8;
        }
        IPR_PCTR_CTL => {}
        IPR_C_DATA | IPR_C_SHIFT => {}
        IPR_DC_CTL => {
            if value & 0x34 != 0 {
                tracing::warn!(value, "DC_CTL force-error bits are not modeled");
            }
        }
        _ => {
            tracing::warn!(iprn, value, "write to unmodeled internal register ignored");
        }
    }
}
