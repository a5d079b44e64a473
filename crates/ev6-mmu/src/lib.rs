//! 21264 MMU: virtual → physical translation with the software-managed
//! architectural translation buffer.
//!
//! Translation order, per stream:
//! - canonical (sign-extension) check at the stream's configured 43/48-bit
//!   width,
//! - the three hardware superpage windows (largest first), which bypass the
//!   translation buffer and map straight to a computable frame with
//!   kernel-only rights,
//! - the translation buffer itself.
//!
//! The PAL handler fills the buffer through the control-register file; a
//! miss here is reported to the caller as a typed fault, never resolved by a
//! page-table walk.

mod tlb;

pub use tlb::{Pte, PteFlags, Tlb, PAGE_BITS, PAGE_OFFSET_MASK, PAGE_SIZE, TLB_SLOTS};

use bitflags::bitflags;

#[cfg(test)]
mod tests;

/// Type of memory access being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

impl AccessType {
    #[inline]
    fn is_write(self) -> bool {
        matches!(self, AccessType::Write)
    }

    #[inline]
    fn is_execute(self) -> bool {
        matches!(self, AccessType::Execute)
    }
}

/// Which translation buffer an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Instruction,
    Data,
}

/// Current access mode, encoded as the rights shift count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessMode {
    Kernel = 0,
    Executive = 1,
    Supervisor = 2,
    User = 3,
}

impl AccessMode {
    /// Decode the 2-bit mode field; values are exhaustive.
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => AccessMode::Kernel,
            1 => AccessMode::Executive,
            2 => AccessMode::Supervisor,
            _ => AccessMode::User,
        }
    }
}

/// A translation failure from [`Mmu::probe`]: the buffer has no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFault {
    /// No matching valid entry. A present-but-invalid entry is
    /// architecturally indistinguishable from no entry.
    Miss,
    /// The address failed the canonical sign-extension check.
    BadVirtualAddress,
}

/// A translation failure from [`Mmu::translate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateFault {
    /// No matching valid entry.
    Miss,
    /// The address failed the canonical sign-extension check.
    BadVirtualAddress,
    /// A valid entry matched but denied the access. The entry's flag word is
    /// carried out for fault-status synthesis.
    AccessViolation { flags: PteFlags },
}

bitflags! {
    /// Capability mask of a successful translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Prot: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

/// A successful translation: the 8 KiB-aligned physical page containing the
/// queried address, plus the capability mask the mapping supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysMapping {
    /// Physical address of the base page containing the query address.
    pub phys_page: u64,
    pub prot: Prot,
}

impl PhysMapping {
    /// Complete physical address for `vaddr` within this mapping.
    #[inline]
    pub fn physical(&self, vaddr: u64) -> u64 {
        self.phys_page | (vaddr & PAGE_OFFSET_MASK)
    }
}

/// Per-core MMU state: one translation buffer per stream plus the per-stream
/// canonical-width control bits.
#[derive(Debug, Clone, Default)]
pub struct Mmu {
    itlb: Tlb,
    dtlb: Tlb,
    /// I-stream VA control: bit 0 selects 48-bit addressing, bit 1 the
    /// 32-bit VA_FORM layout.
    iva_ctl: u8,
    /// D-stream VA control, same encoding.
    dva_ctl: u8,
}

impl Mmu {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn tlb(&self, stream: Stream) -> &Tlb {
        match stream {
            Stream::Instruction => &self.itlb,
            Stream::Data => &self.dtlb,
        }
    }

    #[inline]
    pub fn tlb_mut(&mut self, stream: Stream) -> &mut Tlb {
        match stream {
            Stream::Instruction => &mut self.itlb,
            Stream::Data => &mut self.dtlb,
        }
    }

    /// The 2-bit VA control field for a stream.
    #[inline]
    pub fn va_ctl(&self, stream: Stream) -> u8 {
        match stream {
            Stream::Instruction => self.iva_ctl,
            Stream::Data => self.dva_ctl,
        }
    }

    pub fn set_va_ctl(&mut self, stream: Stream, bits: u8) {
        match stream {
            Stream::Instruction => self.iva_ctl = bits & 3,
            Stream::Data => self.dva_ctl = bits & 3,
        }
    }

    /// Whether a stream uses 48-bit canonical addressing. Any nonzero VA
    /// control selects the wide check.
    #[inline]
    pub fn wide_va(&self, stream: Stream) -> bool {
        self.va_ctl(stream) != 0
    }

    /// Find the PTE covering `vaddr`, consulting the superpage windows and
    /// then the stream's translation buffer. No permission checks.
    pub fn probe(&self, stream: Stream, vaddr: u64, asn: u8) -> Result<Pte, ProbeFault> {
        let tlb = self.tlb(stream);
        let address = vaddr as i64;
        let va_sh = if self.wide_va(stream) { 64 - 48 } else { 64 - 43 };

        if ((address << va_sh) >> va_sh) != address {
            return Err(ProbeFault::BadVirtualAddress);
        }

        let spe = tlb.superpage_enable();
        let kernel_rw = PteFlags::KRE | PteFlags::KWE | PteFlags::VALID;
        if spe & 4 != 0 && (address >> 46) & 3 == 2 {
            return Ok(Pte {
                pfn: ((vaddr & 0x0000_08ff_ffff_e000) >> PAGE_BITS) as u32,
                flags: kernel_rw,
                asn: 0,
            });
        }
        if spe & 2 != 0 && (address >> 41) & 0x7f == 0x7e {
            return Ok(Pte {
                pfn: ((((address << 23) >> 23) as u64 & 0x0000_08ff_ffff_e000) >> PAGE_BITS)
                    as u32,
                flags: kernel_rw,
                asn: 0,
            });
        }
        if spe & 1 != 0 && (address >> 30) & 0x3ffff == 0x3fffe {
            return Ok(Pte {
                pfn: ((vaddr & 0x0000_0000_3fff_e000) >> PAGE_BITS) as u32,
                flags: kernel_rw,
                asn: 0,
            });
        }

        tlb.lookup(vaddr, asn).ok_or(ProbeFault::Miss)
    }

    /// Translate `vaddr` for `access` under the current ASN and access mode.
    ///
    /// The stream is implied by the access type (execute uses the I-stream).
    /// Pure: fault-status capture is the caller's responsibility.
    pub fn translate(
        &self,
        vaddr: u64,
        access: AccessType,
        asn: u8,
        mode: AccessMode,
    ) -> Result<PhysMapping, TranslateFault> {
        let stream = if access.is_execute() {
            Stream::Instruction
        } else {
            Stream::Data
        };

        let pte = match self.probe(stream, vaddr, asn) {
            Ok(pte) => pte,
            Err(ProbeFault::Miss) => return Err(TranslateFault::Miss),
            Err(ProbeFault::BadVirtualAddress) => {
                return Err(TranslateFault::BadVirtualAddress)
            }
        };

        // Rights for the current mode sit at the mode's shift distance from
        // the kernel bits; fault-on bits apply to reads and writes only.
        let rights = PteFlags::from_bits_retain(pte.flags.bits() >> mode as u8);
        let enable = if access.is_write() {
            PteFlags::KWE
        } else {
            PteFlags::KRE
        };
        let fault_on = match access {
            AccessType::Read => pte.flags.contains(PteFlags::FAULT_ON_READ),
            AccessType::Write => pte.flags.contains(PteFlags::FAULT_ON_WRITE),
            AccessType::Execute => false,
        };

        if !(pte.flags.contains(PteFlags::VALID) && rights.contains(enable) && !fault_on) {
            // The probe filtered out invalid entries, so a failure here is a
            // permission problem on a live entry.
            return Err(TranslateFault::AccessViolation { flags: pte.flags });
        }

        let mask = ((1u64 << (3 * pte.flags.granularity_hint())) - 1) << PAGE_BITS;
        let phys_page = (((pte.pfn as u64) << PAGE_BITS) & !mask) | (vaddr & mask);

        let prot = if access.is_execute() {
            Prot::READ | Prot::EXEC
        } else {
            let mut prot = Prot::empty();
            if rights.contains(PteFlags::KWE) && !pte.flags.contains(PteFlags::FAULT_ON_WRITE) {
                prot |= Prot::WRITE;
            }
            if rights.contains(PteFlags::KRE) && !pte.flags.contains(PteFlags::FAULT_ON_READ) {
                prot |= Prot::READ;
            }
            prot
        };

        Ok(PhysMapping { phys_page, prot })
    }
}

/// Compose a VA_FORM register image: the virtual PTE address for `va` given
/// a page-table base and the 2-bit VA control field.
pub fn va_form(va: u64, vptb: u64, form: u8) -> u64 {
    let va = ((va as i64 >> PAGE_BITS) << 3) as u64;
    match form {
        // VA_48 = 0, VA_FORM_32 = 0.
        0 => (vptb & 0xffff_fffe_0000_0000) | (va & 0x0000_0001_ffff_fff8),
        // VA_48 = 1, VA_FORM_32 = 0.
        1 => {
            (vptb & 0xffff_f800_0000_0000)
                | ((((va as i64) << 26) >> 26) as u64 & 0x0000_07ff_ffff_fff8)
        }
        // VA_48 = 0, VA_FORM_32 = 1.
        2 => (vptb & 0xffff_ffff_c000_0000) | (va & 0x0000_0000_003f_fff8),
        _ => {
            // Both control bits set is a reserved combination; fall back to
            // the 48-bit layout rather than faulting the host.
            tracing::warn!(form, "reserved VA_FORM layout");
            (vptb & 0xffff_f800_0000_0000)
                | ((((va as i64) << 26) >> 26) as u64 & 0x0000_07ff_ffff_fff8)
        }
    }
}
