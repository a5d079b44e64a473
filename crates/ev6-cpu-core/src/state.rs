//! Architectural state of one emulated 21264 core.
//!
//! The state is owned by exactly one logical thread of control; helpers take
//! an explicit `&mut CpuState` rather than reaching through an ambient
//! current-CPU pointer. The only piece shared with other actors is the
//! interrupt cell, reachable through an `Arc` (see [`crate::interrupts`]).

use std::sync::Arc;

use crate::interrupts::InterruptLines;

/// Integer register indices with an architectural role in this core.
pub const IR_RA: usize = 26;
/// Saved-PC register for PAL calls when `I_CTL.CALL_PAL_R23` is set.
pub const IR_CALL_PAL_SAVE: usize = 23;

/// The eight general registers exchanged with their shadow copies in PAL
/// mode.
pub const SHADOWED_REGS: [usize; 8] = [4, 5, 6, 7, 20, 21, 22, 23];

/// Code-stream translation index used while in PAL mode. Modes 0..=3 are the
/// architectural access modes.
pub const MMU_PAL_INDEX: u8 = 4;

/// Implementation version reported for this core family.
pub const IMPLVER_21264: u32 = 2;

/// How PAL-mode control transfers are interpreted. The seam is kept even
/// though only one variant is exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalVariant {
    Pal21264,
}

/// FPCR dynamic rounding mode (bits 59..58).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    ToZero,
    Down,
    NearestEven,
    Up,
}

#[derive(Debug)]
pub struct CpuState {
    /// General registers; r31 always reads as zero in the decode engine and
    /// is not stored here.
    pub ir: [u64; 31],
    /// Floating register images (see `ev6-fp` for the format codecs).
    pub fir: [u64; 31],
    pub fpcr: u64,
    pub pc: u64,
    /// Locked physical address for load-locked/store-conditional.
    pub lock: u64,

    /// Floating-point enable; clear means FP instructions raise the
    /// floating-disabled condition.
    pub fen: bool,
    pub pal_mode: bool,
    pub pal_variant: PalVariant,
    /// Data-stream access mode (0..=3), mirrors the CM field.
    pub mmu_data_index: u8,
    /// Code-stream access mode (0..=3, or [`MMU_PAL_INDEX`]).
    pub mmu_code_index: u8,
    pub asn: u8,

    pub pal_base: u64,
    pub exc_addr: u64,

    /// PAL instruction-fetch relocation window, used during early PAL
    /// decompression: fetches matching `mask/val` are offset into RAM.
    pub pal_reloc_mask: u64,
    pub pal_reloc_val: u64,
    pub pal_reloc_offset: u64,

    /// Shadow copies of [`SHADOWED_REGS`], swapped while in PAL mode.
    pub shadow: [u64; 8],

    // Cycle counter.
    pub cc_counter: u32,
    pub cc_load_ticks: u64,
    /// Only the high 32 bits are ever set.
    pub cc_offset: u64,
    pub cc_ena: bool,

    // I_CTL fields not owned by the MMU.
    pub i_vptb: u64,
    pub hwe: bool,
    pub sde1: bool,
    pub chip_id: u8,
    pub ic_en: u8,
    pub call_pal_r23: bool,

    /// Current mode (CM field), the rights shift for data translation.
    pub cm: u8,

    // VA_CTL.
    pub d_vptb: u64,

    // PCTX fields.
    pub astrr: u8,
    pub aster: u8,
    pub ppce: bool,

    /// Access mode used by HW_LD/HW_ST with the ALT qualifier.
    pub altmode: u8,

    // Fault scratch registers, read by the PAL fault handlers.
    pub mm_stat: u32,
    pub iva_form: u64,
    pub va_form: u64,
    pub va: u64,
    pub exc_sum: u64,

    // Translation-buffer staging registers.
    pub itb_tag: u64,
    pub itb_pte: u64,
    pub dtb_tag: u64,
    pub dtb_pte: u64,
    pub dtb_asn: u8,

    /// Condition raised by the last failed helper, consumed by
    /// [`crate::exceptions::do_interrupt`].
    pub exception: Option<crate::exceptions::Condition>,
    pub error_code: u64,

    pub features: u32,
    pub amask: u32,
    pub implver: u32,

    /// Interrupt state shared with external interrupt sources.
    pub irq: Arc<InterruptLines>,
}

impl CpuState {
    /// A 21264 core in its post-reset configuration.
    pub fn new_21264(irq: Arc<InterruptLines>) -> Self {
        Self {
            ir: [0; 31],
            fir: [0; 31],
            fpcr: 0,
            pc: 0,
            lock: 0,
            fen: false,
            pal_mode: true,
            pal_variant: PalVariant::Pal21264,
            mmu_data_index: 0,
            mmu_code_index: MMU_PAL_INDEX,
            asn: 0,
            pal_base: 0,
            exc_addr: 0,
            pal_reloc_mask: 0,
            pal_reloc_val: 0,
            pal_reloc_offset: 0,
            shadow: [0; 8],
            cc_counter: 0,
            cc_load_ticks: 0,
            cc_offset: 0,
            cc_ena: false,
            i_vptb: 0,
            hwe: false,
            sde1: false,
            chip_id: 0x21,
            ic_en: 3,
            call_pal_r23: false,
            cm: 0,
            d_vptb: 0,
            astrr: 0,
            aster: 0,
            ppce: false,
            altmode: 0,
            mm_stat: 0,
            iva_form: 0,
            va_form: 0,
            va: 0,
            exc_sum: 0,
            itb_tag: 0,
            itb_pte: 0,
            dtb_tag: 0,
            dtb_pte: 0,
            dtb_asn: 0,
            exception: None,
            error_code: 0,
            features: 0,
            amask: 0,
            implver: IMPLVER_21264,
            irq,
        }
    }

    /// Set the PAL flag, keeping the copy published to the interrupt cell
    /// in sync for concurrent delivery.
    pub fn set_pal_mode(&mut self, in_pal_mode: bool) {
        self.pal_mode = in_pal_mode;
        self.irq.set_pal_mode(in_pal_mode);
    }

    /// Exchange the eight shadowed general registers with their shadow
    /// copies.
    pub fn swap_shadow(&mut self) {
        for (slot, &reg) in SHADOWED_REGS.iter().enumerate() {
            std::mem::swap(&mut self.shadow[slot], &mut self.ir[reg]);
        }
    }

    /// Record a raised condition for the dispatcher. Always terminates the
    /// current instruction in the decode engine.
    pub fn raise(&mut self, condition: crate::exceptions::Condition, error: u64) {
        self.exception = Some(condition);
        self.error_code = error;
    }

    /// Dynamic rounding mode from FPCR bits 59..58.
    pub fn fpcr_rounding(&self) -> RoundingMode {
        match (self.fpcr >> 58) & 3 {
            0 => RoundingMode::ToZero,
            1 => RoundingMode::Down,
            2 => RoundingMode::NearestEven,
            _ => RoundingMode::Up,
        }
    }

    /// Compose the FPCR image. Only the rounding-mode field survives a
    /// store/load cycle here; exception summary bits are maintained by the
    /// software-completion handler.
    pub fn read_fpcr(&self) -> u64 {
        match self.fpcr_rounding() {
            RoundingMode::ToZero => 0,
            RoundingMode::Down => 1 << 58,
            RoundingMode::NearestEven => 2 << 58,
            RoundingMode::Up => 3 << 58,
        }
    }

    pub fn write_fpcr(&mut self, value: u64) {
        self.fpcr = value;
    }

    /// The processor cycle counter: low half counts cycles while enabled,
    /// high half is the software-written offset.
    pub fn load_pcc(&self, now_ticks: u64) -> u64 {
        let mut res = self.cc_counter;
        if self.cc_ena {
            res = res.wrapping_add((now_ticks.wrapping_sub(self.cc_load_ticks) >> 3) as u32);
        }
        res as u64 | self.cc_offset
    }
}
