//! Interrupt summary state shared between the core and external interrupt
//! sources.
//!
//! Device-side delivery is the one operation allowed to run concurrently
//! with instruction emulation, and it only touches this cell. The invariant
//! maintained here: `ISUM == IPEND & IER` immediately after either operand
//! changes, and the externally visible hard-request line is asserted
//! whenever the summary becomes nonzero while the core is out of PAL mode.
//! The critical section is a single short-held mutex; the request line and
//! the published PAL flag are atomics so the scheduler and interrupt
//! sources never need the lock for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Hardware interrupt lines occupy IPEND bits 38..33.
pub const HW_INT_SHIFT: u32 = 33;
pub const HW_INT_MASK: u64 = 0x3f << HW_INT_SHIFT;

/// Software interrupt requests occupy bits 28..14.
pub const SIRR_SHIFT: u32 = 14;
pub const SIRR_MASK: u64 = 0x7fff << SIRR_SHIFT;

/// Writable IER bits.
pub const IER_MASK: u64 = 0x0000_007f_ffff_e000;

#[derive(Debug, Default)]
struct IrqState {
    ipend: u64,
    ier: u64,
    isum: u64,
    sirr: u64,
    /// The flag toggled by the RS/RC interrupt-disable primitive.
    intr_flag: bool,
}

#[derive(Debug)]
pub struct InterruptLines {
    state: Mutex<IrqState>,
    hard_request: AtomicBool,
    /// Core PAL flag as published by the dispatcher, so concurrent delivery
    /// can honor the "no request line while in PAL mode" rule.
    pal_mode: AtomicBool,
}

impl Default for InterruptLines {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptLines {
    /// A fresh cell for a core at reset (in PAL mode).
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IrqState::default()),
            hard_request: AtomicBool::new(false),
            pal_mode: AtomicBool::new(true),
        }
    }

    /// Publish the core's PAL flag. Only the owning core's dispatcher and
    /// return path call this.
    pub fn set_pal_mode(&self, in_pal_mode: bool) {
        self.pal_mode.store(in_pal_mode, Ordering::Release);
    }

    fn recompute(&self, state: &mut IrqState) {
        state.isum = state.ipend & state.ier;
        if state.isum != 0 && !self.pal_mode.load(Ordering::Acquire) {
            self.hard_request.store(true, Ordering::Release);
        }
    }

    /// Replace the asserted hardware interrupt lines (6-bit mask) and
    /// recompute the summary. Callable from outside the core thread.
    pub fn deliver(&self, lines: u8) {
        let mut state = self.state.lock().unwrap();
        state.ipend =
            (state.ipend & !HW_INT_MASK) | (((lines as u64) & 0x3f) << HW_INT_SHIFT);
        self.recompute(&mut state);
    }

    /// Write the interrupt-enable mask and recompute the summary.
    pub fn write_ier(&self, value: u64) {
        let mut state = self.state.lock().unwrap();
        state.ier = value & IER_MASK;
        self.recompute(&mut state);
    }

    /// Write the software-interrupt request register, folding it into IPEND.
    pub fn write_sirr(&self, value: u64) {
        let mut state = self.state.lock().unwrap();
        state.sirr = value & SIRR_MASK;
        state.ipend = (state.ipend & !SIRR_MASK) | state.sirr;
        self.recompute(&mut state);
    }

    pub fn ier(&self) -> u64 {
        self.state.lock().unwrap().ier
    }

    pub fn ipend(&self) -> u64 {
        self.state.lock().unwrap().ipend
    }

    pub fn isum(&self) -> u64 {
        self.state.lock().unwrap().isum
    }

    pub fn sirr(&self) -> u64 {
        self.state.lock().unwrap().sirr
    }

    /// Whether the externally visible interrupt line is asserted.
    pub fn hard_request_pending(&self) -> bool {
        self.hard_request.load(Ordering::Acquire)
    }

    /// Deassert the line; the dispatcher does this when vectoring the
    /// generic interrupt condition (the source re-asserts if still active).
    pub fn clear_hard_request(&self) {
        self.hard_request.store(false, Ordering::Release);
    }

    /// Read-and-set the interrupt flag (the RS primitive). Returns the
    /// previous value.
    pub fn rs(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        std::mem::replace(&mut state.intr_flag, true)
    }

    /// Read-and-clear the interrupt flag (the RC primitive). Returns the
    /// previous value.
    pub fn rc(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        std::mem::replace(&mut state.intr_flag, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_outside_pal() -> InterruptLines {
        let irq = InterruptLines::new();
        irq.set_pal_mode(false);
        irq
    }

    #[test]
    fn summary_is_always_pend_and_enable() {
        let irq = lines_outside_pal();
        irq.deliver(0x3f);
        assert_eq!(irq.isum(), 0);
        irq.write_ier(IER_MASK);
        assert_eq!(irq.isum(), irq.ipend() & irq.ier());
        assert_eq!(irq.isum(), HW_INT_MASK);
        irq.write_ier(0);
        assert_eq!(irq.isum(), 0);
    }

    #[test]
    fn masked_delivery_raises_no_request() {
        let irq = lines_outside_pal();
        irq.deliver(1 << 3);
        assert_eq!(irq.isum(), 0);
        assert!(!irq.hard_request_pending());
        // Enabling the line afterwards raises the request with no further
        // delivery call.
        irq.write_ier(1 << (HW_INT_SHIFT + 3));
        assert_ne!(irq.isum(), 0);
        assert!(irq.hard_request_pending());
    }

    #[test]
    fn pal_mode_suppresses_the_request_line() {
        let irq = InterruptLines::new();
        irq.write_ier(IER_MASK);
        irq.deliver(1);
        assert_ne!(irq.isum(), 0);
        assert!(!irq.hard_request_pending());
    }

    #[test]
    fn sirr_folds_into_ipend() {
        let irq = lines_outside_pal();
        irq.write_sirr(0x7fff << SIRR_SHIFT);
        assert_eq!(irq.ipend() & SIRR_MASK, SIRR_MASK);
        assert_eq!(irq.sirr(), SIRR_MASK);
        // Clearing SIRR clears the software bits out of IPEND.
        irq.write_sirr(0);
        assert_eq!(irq.ipend() & SIRR_MASK, 0);
    }

    #[test]
    fn sirr_reserved_bits_ignored() {
        let irq = lines_outside_pal();
        irq.write_sirr(!0);
        assert_eq!(irq.sirr(), SIRR_MASK);
    }

    #[test]
    fn rs_rc_return_previous_flag() {
        let irq = InterruptLines::new();
        assert!(!irq.rs());
        assert!(irq.rs());
        assert!(irq.rc());
        assert!(!irq.rc());
    }
}
