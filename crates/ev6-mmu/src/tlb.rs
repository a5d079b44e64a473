//! The architectural translation buffer: a fixed 128-slot, cyclically
//! replaced associative array, one instance per stream.
//!
//! Slots are never individually freed; insertion always claims the next slot
//! in round-robin order, even when a matching tag already exists (lookups
//! return the first match, so duplicates are harmless). Each entry derives
//! its own page size from the granularity hint in its flag word, so the
//! match test shifts both tag and query by a per-entry amount.

use bitflags::bitflags;

/// Base page is 8 KiB.
pub const PAGE_BITS: u32 = 13;
/// Base page size in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_BITS;
/// Low-bit mask selecting the in-page offset.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Fixed translation buffer capacity per stream.
pub const TLB_SLOTS: usize = 128;

bitflags! {
    /// The architectural PTE flag word (low 16 bits of a PTE).
    ///
    /// Bits 6..5 are the granularity hint, a 2-bit field rather than
    /// independent flags; use [`PteFlags::granularity_hint`] to read it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PteFlags: u16 {
        const VALID = 1 << 0;
        const FAULT_ON_READ = 1 << 1;
        const FAULT_ON_WRITE = 1 << 2;
        /// Address-space match: entry applies to every ASN.
        const ASM = 1 << 4;
        const KRE = 1 << 8;
        const ERE = 1 << 9;
        const SRE = 1 << 10;
        const URE = 1 << 11;
        const KWE = 1 << 12;
        const EWE = 1 << 13;
        const SWE = 1 << 14;
        const UWE = 1 << 15;
        // Granularity-hint bits and anything reserved are retained verbatim.
        const _ = !0;
    }
}

impl PteFlags {
    /// The 2-bit granularity hint: page covers `8 KiB << (3 * gh)`.
    #[inline]
    pub fn granularity_hint(self) -> u32 {
        ((self.bits() >> 5) & 3) as u32
    }

    /// Shift amount that page-aligns an address for this entry's page size.
    #[inline]
    pub fn page_shift(self) -> u32 {
        PAGE_BITS + 3 * self.granularity_hint()
    }
}

/// A page-table-entry-shaped descriptor: physical page number, flag word,
/// owning address-space number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pte {
    pub pfn: u32,
    pub flags: PteFlags,
    pub asn: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct TlbEntry {
    /// Sign-extended virtual tag, page aligned at the base page size.
    vaddr: i64,
    pte: Pte,
}

/// One stream's translation buffer plus its superpage-enable mask (the mask
/// lives here because the control registers program it per stream).
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: [TlbEntry; TLB_SLOTS],
    next: usize,
    spe: u8,
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Tlb {
    pub fn new() -> Self {
        Self {
            entries: [TlbEntry::default(); TLB_SLOTS],
            next: 0,
            spe: 0,
        }
    }

    /// The 3-bit superpage-enable mask for this stream.
    #[inline]
    pub fn superpage_enable(&self) -> u8 {
        self.spe
    }

    pub fn set_superpage_enable(&mut self, mask: u8) {
        self.spe = mask & 7;
    }

    /// Scan every slot for a valid entry covering `vaddr` under `asn`.
    ///
    /// Non-ASM entries match only when their ASN equals `asn`; ASM entries
    /// match regardless. First match wins.
    pub fn lookup(&self, vaddr: u64, asn: u8) -> Option<Pte> {
        let vaddr = vaddr as i64;
        for entry in &self.entries {
            if !entry.pte.flags.contains(PteFlags::VALID) {
                continue;
            }
            let pg_sh = entry.pte.flags.page_shift();
            if (entry.vaddr >> pg_sh) == (vaddr >> pg_sh)
                && (entry.pte.asn == asn || entry.pte.flags.contains(PteFlags::ASM))
            {
                return Some(entry.pte);
            }
        }
        None
    }

    /// Write `pte` into the next cyclic slot, unconditionally. The tag is
    /// base-page aligned and re-sign-extended from bit 47.
    pub fn insert(&mut self, vaddr: u64, pte: Pte) {
        let tag = (((vaddr & !PAGE_OFFSET_MASK) as i64) << 16) >> 16;
        self.entries[self.next] = TlbEntry { vaddr: tag, pte };
        self.next = (self.next + 1) % TLB_SLOTS;
    }

    /// Invalidate every slot.
    pub fn flush_all(&mut self) {
        for entry in &mut self.entries {
            entry.pte.flags = PteFlags::empty();
        }
    }

    /// Invalidate every slot not marked ASM.
    pub fn flush_non_asm(&mut self) {
        for entry in &mut self.entries {
            if !entry.pte.flags.contains(PteFlags::ASM) {
                entry.pte.flags = PteFlags::empty();
            }
        }
    }

    /// Invalidate every entry whose page range covers `vaddr` under `asn`,
    /// reporting each base-page sub-range the entry spanned to `invalidate`
    /// so derived mappings (translated code, host page tables) can drop it.
    pub fn flush_page(&mut self, vaddr: u64, asn: u8, mut invalidate: impl FnMut(u64)) {
        for entry in &mut self.entries {
            let pg_sh = entry.pte.flags.page_shift();
            if ((entry.vaddr >> pg_sh) as u64) == (vaddr >> pg_sh)
                && (entry.pte.flags.contains(PteFlags::ASM) || entry.pte.asn == asn)
            {
                let base = (vaddr >> pg_sh) << pg_sh;
                let mut offset = 0u64;
                while offset < (1 << pg_sh) {
                    invalidate(base.wrapping_add(offset));
                    offset += PAGE_SIZE;
                }
                entry.pte.flags = PteFlags::empty();
            }
        }
    }
}
