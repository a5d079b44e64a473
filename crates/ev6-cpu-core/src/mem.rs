//! Capability interfaces onto the surrounding emulator.
//!
//! The core never owns what lives behind these: physical memory is an opaque
//! byte store, and translated-code bookkeeping (block index, derived
//! mappings) belongs to the decode engine. Handles are borrowed, never
//! freed here.

/// Physical memory access at the widths this core uses.
pub trait MemoryBus {
    fn read_u32(&mut self, paddr: u64) -> u32;
    fn read_u64(&mut self, paddr: u64) -> u64;
    fn write_u32(&mut self, paddr: u64, value: u32);
    fn write_u64(&mut self, paddr: u64, value: u64);
}

impl<T: MemoryBus + ?Sized> MemoryBus for &mut T {
    #[inline]
    fn read_u32(&mut self, paddr: u64) -> u32 {
        <T as MemoryBus>::read_u32(&mut **self, paddr)
    }

    #[inline]
    fn read_u64(&mut self, paddr: u64) -> u64 {
        <T as MemoryBus>::read_u64(&mut **self, paddr)
    }

    #[inline]
    fn write_u32(&mut self, paddr: u64, value: u32) {
        <T as MemoryBus>::write_u32(&mut **self, paddr, value)
    }

    #[inline]
    fn write_u64(&mut self, paddr: u64, value: u64) {
        <T as MemoryBus>::write_u64(&mut **self, paddr, value)
    }
}

/// The decode engine's translated-block index, needed by the data-fault
/// path to recover the faulting opcode.
pub trait CodeBlocks {
    type Handle: Copy;

    /// Find the translated block containing `pc`. `None` means the caller
    /// violated the translation contract (a data fault can only arise from
    /// translated code).
    fn locate_code_block(&self, pc: u64) -> Option<Self::Handle>;

    /// Physical address range `[low, high)` occupied by the block's first
    /// page.
    fn block_physical_range(&self, block: Self::Handle) -> (u64, u64);
}

/// Side-effect collaborator for control-register writes: the tick source for
/// the cycle counter, and invalidation of mappings the engine derived from
/// the translation state (translated code, host page mappings).
pub trait CoreHooks {
    fn ticks(&mut self) -> u64;

    /// Drop every derived mapping, both streams, whole address space.
    fn invalidate_code_all(&mut self);

    /// Drop derived mappings for one base page.
    fn invalidate_code_page(&mut self, vaddr: u64);
}
