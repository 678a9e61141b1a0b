//! Bit-banged, interrupt-driven software UART (8N1).
//!
//! Reception runs from the receive pin's edge interrupt: the falling edge of
//! the start bit fires it, the routine masks its own trigger, samples eight
//! data bits LSB first at the bit centers, stores the byte and re-arms inside
//! the stop bit. Transmission holds a critical section for the whole frame so
//! no interrupt can stretch a bit.
//!
//! ```text
//!  idle  start  d0  d1  d2  d3  d4  d5  d6  d7  stop  idle
//!  ‾‾‾‾‾|____|‾‾‾‾|___|...                  |‾‾‾‾‾‾‾‾‾‾‾‾
//!       ^edge
//!       |-- centering + intra_bit --^ first sample
//! ```
//!
//! A [`SoftSerial`] does not decide on its own whether it is listening;
//! that relation lives in the [`ListenerRegistry`](crate::ListenerRegistry).

use core::cell::{Cell, RefCell};

use critical_section::{CriticalSection, Mutex};
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::platform::{CycleDelay, EdgeTrigger};
use crate::ring::{RxRing, RX_BUFFER_SIZE};
use crate::stream::StreamError;
use crate::timing::{BitDelays, CalibrationTable, TimingError};

/// Line configuration fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// CPU clock the cycle delays count against.
    pub clock_hz: u32,
    /// Idle-low line with inverted data (RS-232 levels without a driver).
    pub inverse_logic: bool,
    /// Instruction overheads of the receive/transmit code on this platform.
    pub calibration: CalibrationTable,
}

impl SerialConfig {
    /// Non-inverted line with no overhead compensation.
    #[must_use]
    pub const fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            inverse_logic: false,
            calibration: CalibrationTable::IDEAL,
        }
    }

    #[must_use]
    pub const fn inverted(mut self, inverse_logic: bool) -> Self {
        self.inverse_logic = inverse_logic;
        self
    }

    #[must_use]
    pub const fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = calibration;
        self
    }
}

/// What a [`ListenerRegistry`](crate::ListenerRegistry) needs from a port.
///
/// Everything takes `&self`: ports are shared between the mainline and the
/// interrupt dispatcher, typically from a `static`.
pub trait Transceiver {
    /// Receive one symbol. Called by the dispatcher from interrupt context.
    ///
    /// Must be bounded in time and must not allocate or block.
    fn on_edge(&self, cs: CriticalSection<'_>);

    /// Arm or mask this port's edge trigger.
    fn set_trigger(&self, cs: CriticalSection<'_>, enabled: bool);

    /// Compute and store the bit delays for `baud`.
    ///
    /// # Errors
    ///
    /// Returns a [`TimingError`] if the rate is unusable on this clock; the
    /// port is left uncalibrated.
    fn calibrate(&self, baud: u32) -> Result<BitDelays, TimingError>;

    /// Whether reception can be armed (delays calibrated).
    fn can_receive(&self) -> bool;

    /// Empty the receive buffer. Caller holds a critical section.
    fn reset_rx(&self, cs: CriticalSection<'_>);

    fn rx_len(&self) -> usize;

    fn rx_pop(&self) -> Option<u8>;

    fn rx_peek(&self) -> Option<u8>;

    /// Return and clear the sticky overflow flag.
    fn take_overflow(&self) -> bool;

    /// Transmit one byte, blocking.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::WriteUnavailable`] before calibration.
    fn write(&self, byte: u8) -> Result<(), StreamError>;
}

/// Receive pin and its edge trigger, only touched inside critical sections.
struct RxSide<R, E> {
    pin: R,
    trigger: E,
}

impl<R: InputPin, E> RxSide<R, E> {
    #[inline(always)]
    fn is_high(&mut self) -> bool {
        matches!(self.pin.is_high(), Ok(true))
    }
}

/// Software UART on two arbitrary pins.
///
/// - `R`: receive pin, with pull-up configured by the platform when the
///   line is not inverted
/// - `T`: transmit pin, already in output mode
/// - `E`: edge trigger of the receive pin
/// - `D`: cycle delay
/// - `N`: receive buffer slots (`N - 1` usable)
pub struct SoftSerial<R, T, E, D, const N: usize = RX_BUFFER_SIZE> {
    rx: Mutex<RefCell<RxSide<R, E>>>,
    tx: Mutex<RefCell<T>>,
    delays: Mutex<Cell<BitDelays>>,
    ring: RxRing<N>,
    delay: D,
    config: SerialConfig,
}

impl<R, T, E, D, const N: usize> SoftSerial<R, T, E, D, N>
where
    R: InputPin,
    T: OutputPin,
    E: EdgeTrigger,
    D: CycleDelay,
{
    /// Bind the pins. The transmit line is driven to idle right away.
    pub fn new(rx: R, mut tx: T, trigger: E, delay: D, config: SerialConfig) -> Self {
        drive(&mut tx, !config.inverse_logic);
        Self {
            rx: Mutex::new(RefCell::new(RxSide { pin: rx, trigger })),
            tx: Mutex::new(RefCell::new(tx)),
            delays: Mutex::new(Cell::new(BitDelays::UNCALIBRATED)),
            ring: RxRing::new(),
            delay,
            config,
        }
    }

    /// Currently stored bit delays.
    #[must_use]
    pub fn delays(&self) -> BitDelays {
        critical_section::with(|cs| self.delays.borrow(cs).get())
    }

    #[must_use]
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl<R, T, E, D, const N: usize> Transceiver for SoftSerial<R, T, E, D, N>
where
    R: InputPin,
    T: OutputPin,
    E: EdgeTrigger,
    D: CycleDelay,
{
    fn on_edge(&self, cs: CriticalSection<'_>) {
        let delays = self.delays.borrow(cs).get();
        let inverse = self.config.inverse_logic;
        let mut rx = self.rx.borrow_ref_mut(cs);

        // Line still at idle level: no start bit, the edge was not ours
        if rx.is_high() != inverse {
            return;
        }

        // Mask our own trigger so data-bit edges do not re-enter
        rx.trigger.set_enabled(false);

        self.delay.delay_units(delays.centering);

        let mut byte: u8 = 0;
        for _ in 0..8 {
            self.delay.delay_units(delays.intra_bit);
            byte >>= 1;
            if rx.is_high() {
                byte |= 0x80;
            }
        }

        if inverse {
            byte = !byte;
        }

        // A full buffer drops the byte and raises the overflow flag
        let _ = self.ring.push(byte);

        // Re-arm inside the stop bit
        self.delay.delay_units(delays.stop_bit);
        rx.trigger.set_enabled(true);
    }

    fn set_trigger(&self, cs: CriticalSection<'_>, enabled: bool) {
        self.rx.borrow_ref_mut(cs).trigger.set_enabled(enabled);
    }

    fn calibrate(&self, baud: u32) -> Result<BitDelays, TimingError> {
        // One store, so a listening port never samples with half-set delays
        let result = BitDelays::calculate(self.config.clock_hz, baud, &self.config.calibration);
        let stored = result.unwrap_or(BitDelays::UNCALIBRATED);
        critical_section::with(|cs| self.delays.borrow(cs).set(stored));
        let delays = result?;

        // If the line was low this establishes the end of a frame
        self.delay.delay_units(delays.transmit);
        Ok(delays)
    }

    fn can_receive(&self) -> bool {
        self.delays().can_receive()
    }

    fn reset_rx(&self, _cs: CriticalSection<'_>) {
        self.ring.reset();
    }

    fn rx_len(&self) -> usize {
        self.ring.len()
    }

    fn rx_pop(&self) -> Option<u8> {
        self.ring.pop()
    }

    fn rx_peek(&self) -> Option<u8> {
        self.ring.peek()
    }

    fn take_overflow(&self) -> bool {
        self.ring.take_overflow()
    }

    fn write(&self, byte: u8) -> Result<(), StreamError> {
        let delays = self.delays();
        if !delays.is_calibrated() {
            return Err(StreamError::WriteUnavailable);
        }

        let inverse = self.config.inverse_logic;
        let hold = delays.transmit;
        let mut bits = if inverse { !byte } else { byte };

        critical_section::with(|cs| {
            let mut tx = self.tx.borrow_ref_mut(cs);

            // Start bit
            drive(&mut *tx, inverse);
            self.delay.delay_units(hold);

            for _ in 0..8 {
                drive(&mut *tx, bits & 1 != 0);
                self.delay.delay_units(hold);
                bits >>= 1;
            }

            // Back to idle, which doubles as the stop bit
            drive(&mut *tx, !inverse);
        });

        self.delay.delay_units(hold);
        Ok(())
    }
}

#[inline(always)]
fn drive<T: OutputPin>(pin: &mut T, high: bool) {
    let _ = pin.set_state(PinState::from(high));
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::sim::SimLine;

    const CLOCK: u32 = 16_000_000;
    const BAUD: u32 = 9600;
    const BIT: u64 = 416;

    fn line(inverse: bool) -> SimLine {
        SimLine::new(BIT, inverse, SerialConfig::new(CLOCK).inverted(inverse))
    }

    #[test]
    fn test_write_before_calibration_fails() {
        let line = line(false);
        assert_eq!(line.serial.write(0x55), Err(StreamError::WriteUnavailable));
        // Only the idle level from construction, no start bit
        assert_eq!(line.wire.tx_levels(), vec![true]);
    }

    #[test]
    fn test_write_frame_lsb_first() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();
        let before = line.wire.now();

        line.serial.write(0b1010_0011).unwrap();

        let log = line.wire.tx_log();
        let frame: Vec<bool> = log[1..].iter().map(|&(_, level)| level).collect();
        assert_eq!(
            frame,
            vec![false, true, true, false, false, false, true, false, true, true]
        );

        // Every bit held for one transmit delay
        let times: Vec<u64> = log[1..].iter().map(|&(t, _)| t - before).collect();
        let expected: Vec<u64> = (0..10).map(|i| i * BIT).collect();
        assert_eq!(times, expected);

        // One more transmit delay after returning to idle
        assert_eq!(line.wire.now() - before, 10 * BIT);
    }

    #[test]
    fn test_write_inverted() {
        let line = line(true);
        line.serial.calibrate(BAUD).unwrap();
        line.serial.write(0x01).unwrap();

        let levels: Vec<bool> = line.wire.tx_levels();
        // idle low, start high, data inverted, idle low
        assert_eq!(
            levels,
            vec![false, true, false, true, true, true, true, true, true, true, false]
        );
    }

    #[test]
    fn test_receive_samples_bit_centers() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();

        for byte in [0x00, 0xFF, 0x4B, 0x80, 0x01] {
            line.wire.send_frame(byte);
            critical_section::with(|cs| line.serial.on_edge(cs));
            line.wire.finish_frame();
        }

        let received: Vec<u8> = core::iter::from_fn(|| line.serial.rx_pop()).collect();
        assert_eq!(received, [0x00, 0xFF, 0x4B, 0x80, 0x01]);
    }

    #[test]
    fn test_receive_inverted() {
        let line = line(true);
        line.serial.calibrate(BAUD).unwrap();

        line.wire.send_frame(0x3C);
        critical_section::with(|cs| line.serial.on_edge(cs));

        assert_eq!(line.serial.rx_pop(), Some(0x3C));
    }

    #[test]
    fn test_receive_rearms_trigger_inside_stop_bit() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();
        critical_section::with(|cs| line.serial.set_trigger(cs, true));

        let start = line.wire.now();
        line.wire.send_frame(0xA5);
        critical_section::with(|cs| line.serial.on_edge(cs));

        assert!(line.trigger.get());
        assert_eq!(line.trigger.toggles(), vec![true, false, true]);
        let elapsed = line.wire.now() - start;
        assert!(elapsed > 9 * BIT && elapsed < 10 * BIT, "{elapsed}");
    }

    #[test]
    fn test_edge_on_idle_line_is_ignored() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();
        let before = line.wire.now();

        critical_section::with(|cs| line.serial.on_edge(cs));

        assert_eq!(line.serial.rx_len(), 0);
        assert_eq!(line.wire.now(), before);
    }

    #[test]
    fn test_receive_overflow_is_sticky() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();

        for byte in 0..64u8 {
            line.wire.send_frame(byte);
            critical_section::with(|cs| line.serial.on_edge(cs));
            line.wire.finish_frame();
        }

        assert_eq!(line.serial.rx_len(), 63);
        assert!(line.serial.take_overflow());
        assert!(!line.serial.take_overflow());
        assert_eq!(line.serial.rx_pop(), Some(0));
    }

    #[test]
    fn test_recalibrate_while_receiving() {
        let line = SimLine::new(2 * BIT, false, SerialConfig::new(CLOCK));
        line.serial.calibrate(BAUD).unwrap();
        critical_section::with(|cs| line.serial.set_trigger(cs, true));

        let delays = line.serial.calibrate(BAUD / 2).unwrap();
        assert_eq!(line.serial.delays(), delays);
        // 16 MHz / 4800 / 4
        assert_eq!(delays.transmit, 833);
        // The trigger is never touched by recalibration
        assert_eq!(line.trigger.toggles(), vec![true]);

        line.wire.send_frame(0x5A);
        critical_section::with(|cs| line.serial.on_edge(cs));
        assert_eq!(line.serial.rx_pop(), Some(0x5A));
    }

    #[test]
    fn test_bad_baud_leaves_port_uncalibrated() {
        let line = line(false);
        line.serial.calibrate(BAUD).unwrap();
        assert!(line.serial.calibrate(0).is_err());
        assert!(!line.serial.can_receive());
        assert_eq!(line.serial.write(0), Err(StreamError::WriteUnavailable));
    }
}
