//! RP2040 implementations of the core's platform traits.

use core::convert::Infallible;

use embassy_rp::pac;
use embedded_hal::digital::{ErrorType, InputPin};
use portable_atomic::{AtomicBool, Ordering};
use rn52_core::{CycleDelay, EdgeTrigger, Monotonic};

/// GPIO input read straight from the SIO block.
///
/// The pin itself (function select, pull) is configured through an
/// `embassy_rp::gpio::Input` owned by the RX task; this handle only reads
/// the level, so both can exist at once.
#[derive(Clone, Copy)]
pub struct SioInput {
    mask: u32,
}

impl SioInput {
    #[must_use]
    pub const fn new(pin: u8) -> Self {
        Self {
            mask: 1 << (pin & 31),
        }
    }

    #[inline(always)]
    fn level(&self) -> bool {
        pac::SIO.gpio_in(0).read() & self.mask != 0
    }
}

impl ErrorType for SioInput {
    type Error = Infallible;
}

impl InputPin for SioInput {
    #[inline(always)]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    #[inline(always)]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

/// Busy wait in 4-cycle units.
#[derive(Clone, Copy, Default)]
pub struct CortexMDelay;

impl CycleDelay for CortexMDelay {
    #[inline(always)]
    fn delay_units(&self, units: u16) {
        cortex_m::asm::delay(u32::from(units) * 4);
    }
}

/// Edge trigger gate checked by the RX task before dispatching an edge.
///
/// The GPIO interrupt itself stays armed; the task drops edges while the
/// gate is closed.
#[derive(Clone, Copy)]
pub struct EdgeGate {
    open: &'static AtomicBool,
}

impl EdgeGate {
    #[must_use]
    pub const fn new(open: &'static AtomicBool) -> Self {
        Self { open }
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl EdgeTrigger for EdgeGate {
    #[inline]
    fn set_enabled(&mut self, enabled: bool) {
        self.open.store(enabled, Ordering::Release);
    }
}

/// Millisecond clock on top of the embassy time driver.
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Monotonic for EmbassyClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        embassy_time::Instant::now().as_millis() as u32
    }
}
