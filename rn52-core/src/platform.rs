//! Platform capabilities the core consumes.
//!
//! Pin levels go through `embedded-hal` ([`InputPin`](embedded_hal::digital::InputPin),
//! [`OutputPin`](embedded_hal::digital::OutputPin)) and millisecond sleeps
//! through [`DelayNs`](embedded_hal::delay::DelayNs). The three traits here
//! cover what `embedded-hal` has no notion of.

/// Cycle-exact busy wait.
///
/// One unit is four CPU cycles. Implementations must not yield, sleep or
/// touch interrupts: the receive path calls this from interrupt context and
/// the transmit path from inside a critical section.
pub trait CycleDelay {
    fn delay_units(&self, units: u16);
}

/// Per-pin edge interrupt gate.
///
/// Disabling must only mask this pin's trigger; the shared interrupt vector
/// stays enabled for other users.
pub trait EdgeTrigger {
    fn set_enabled(&mut self, enabled: bool);
}

/// Millisecond monotonic clock for idle-gap and timeout measurement.
///
/// Wraps around; callers compare with `wrapping_sub`.
pub trait Monotonic {
    fn now_ms(&self) -> u32;
}

impl<T: CycleDelay + ?Sized> CycleDelay for &T {
    #[inline]
    fn delay_units(&self, units: u16) {
        T::delay_units(self, units);
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    #[inline]
    fn now_ms(&self) -> u32 {
        T::now_ms(self)
    }
}
