//! Bit timing for the software UART.
//!
//! All delays are expressed in 4-cycle busy-wait steps, the unit of
//! [`CycleDelay::delay_units`](crate::platform::CycleDelay::delay_units).
//! The code between two delays also burns cycles (interrupt entry, the
//! sampling loop, pin writes); those fixed costs are subtracted per platform
//! through a [`CalibrationTable`].

/// Fixed instruction overheads, in CPU cycles, of the code around each delay.
///
/// These depend on the target and on the code the compiler emitted for the
/// receive and transmit routines, so they are measured per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationTable {
    /// Edge to first sample, minus one sampling-loop iteration.
    pub centering: u16,
    /// One iteration of the 8-bit sampling loop, excluding its delay.
    pub sampling: u16,
    /// Last sample to re-arming the edge trigger.
    pub stop_bit: u16,
    /// One iteration of the transmit loop, excluding its delay.
    pub transmit: u16,
}

impl CalibrationTable {
    /// No overhead at all. Useful for simulation and as a starting point.
    pub const IDEAL: Self = Self {
        centering: 0,
        sampling: 0,
        stop_bit: 0,
        transmit: 0,
    };

    /// AVR, counted from avr-gcc 4.8 output. Good to 115200 baud at 16 MHz.
    ///
    /// Centering: 4 cycles to raise the flag, 4 to vector, 75 to the first
    /// delay and 17 to the pin read, less the 23 the loop already accounts for.
    pub const AVR_GCC48: Self = Self {
        centering: 4 + 4 + 75 + 17 - 23,
        sampling: 23,
        stop_bit: 37 + 11,
        transmit: 15,
    };

    /// AVR, counted from avr-gcc 4.3 output. Good to 57600 baud at 16 MHz.
    pub const AVR_GCC43: Self = Self {
        centering: 4 + 4 + 97 + 29 - 11,
        sampling: 11,
        stop_bit: 44 + 17,
        transmit: 15,
    };

    /// RP2040 at 125 MHz with the receive path on an interrupt executor.
    ///
    /// Centering covers the GPIO interrupt, executor wake and task poll.
    pub const RP2040: Self = Self {
        centering: 620,
        sampling: 36,
        stop_bit: 64,
        transmit: 24,
    };
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::IDEAL
    }
}

/// Error type for timing calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// Baud rate of zero.
    ZeroBaud,
    /// Bit period is zero or does not fit the 16-bit delay counter.
    BitPeriodOutOfRange,
}

impl core::fmt::Display for TimingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroBaud => write!(f, "baud rate is zero"),
            Self::BitPeriodOutOfRange => write!(f, "bit period out of range for clock"),
        }
    }
}

/// The four delays the transceiver waits on, in 4-cycle units.
///
/// Every calibrated value is at least 1. A transmit delay of 0 means
/// "never calibrated" and disables transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitDelays {
    /// Edge to the middle of the start bit.
    pub centering: u16,
    /// Between consecutive data bit samples.
    pub intra_bit: u16,
    /// Last data bit to three quarters into the stop bit.
    pub stop_bit: u16,
    /// Hold time of each transmitted bit.
    pub transmit: u16,
}

impl BitDelays {
    /// Delays before `begin`.
    pub const UNCALIBRATED: Self = Self {
        centering: 0,
        intra_bit: 0,
        stop_bit: 0,
        transmit: 0,
    };

    /// Derive the delays for `baud` on a `clock_hz` CPU.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::ZeroBaud`] for a zero baud rate and
    /// [`TimingError::BitPeriodOutOfRange`] if one bit is shorter than one
    /// delay step or longer than the 16-bit counter allows.
    ///
    /// # Example
    ///
    /// ```
    /// use rn52_core::timing::{BitDelays, CalibrationTable};
    ///
    /// let d = BitDelays::calculate(16_000_000, 9600, &CalibrationTable::AVR_GCC48).unwrap();
    /// assert_eq!(d.transmit, 413);
    /// ```
    pub fn calculate(
        clock_hz: u32,
        baud: u32,
        calibration: &CalibrationTable,
    ) -> Result<Self, TimingError> {
        let bit = bit_period(clock_hz, baud)?;

        Ok(Self {
            centering: subtract_cap(bit / 2, calibration.centering / 4),
            intra_bit: subtract_cap(bit, calibration.sampling / 4),
            // Aim at 3/4 of the stop bit to leave room for ISR cleanup
            stop_bit: subtract_cap((bit as u32 * 3 / 4) as u16, calibration.stop_bit / 4),
            transmit: subtract_cap(bit, calibration.transmit / 4),
        })
    }

    /// Whether `begin` has populated the delays.
    #[inline]
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        self.transmit != 0
    }

    /// Whether reception can be armed.
    #[inline]
    #[must_use]
    pub const fn can_receive(&self) -> bool {
        self.stop_bit != 0
    }
}

/// One bit time in 4-cycle delay steps: `clock_hz / baud / 4`.
///
/// # Errors
///
/// See [`BitDelays::calculate`].
pub fn bit_period(clock_hz: u32, baud: u32) -> Result<u16, TimingError> {
    if baud == 0 {
        return Err(TimingError::ZeroBaud);
    }
    let period = clock_hz / baud / 4;
    match u16::try_from(period) {
        Ok(0) | Err(_) => Err(TimingError::BitPeriodOutOfRange),
        Ok(p) => Ok(p),
    }
}

/// `num - sub`, or 1 if the result would be below 1.
#[inline]
#[must_use]
pub const fn subtract_cap(num: u16, sub: u16) -> u16 {
    if num > sub {
        num - sub
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLES: [CalibrationTable; 4] = [
        CalibrationTable::IDEAL,
        CalibrationTable::AVR_GCC48,
        CalibrationTable::AVR_GCC43,
        CalibrationTable::RP2040,
    ];

    #[test]
    fn test_16mhz_9600() {
        assert_eq!(bit_period(16_000_000, 9600), Ok(416));

        let d = BitDelays::calculate(16_000_000, 9600, &CalibrationTable::AVR_GCC48).unwrap();
        assert_eq!(d.transmit, 413);
        // 416/2 - 77/4
        assert_eq!(d.centering, 208 - 19);
        assert_eq!(d.intra_bit, 416 - 5);
        assert_eq!(d.stop_bit, 312 - 12);
    }

    #[test]
    fn test_all_delays_at_least_one() {
        let clocks = [1_000_000, 8_000_000, 16_000_000, 20_000_000, 125_000_000];
        let bauds = [
            1200, 2400, 4800, 9600, 14_400, 19_200, 28_800, 38_400, 57_600, 115_200, 250_000,
        ];

        for table in &TABLES {
            for &clock in &clocks {
                for &baud in &bauds {
                    if let Ok(d) = BitDelays::calculate(clock, baud, table) {
                        assert!(d.centering >= 1, "{clock} {baud}");
                        assert!(d.intra_bit >= 1, "{clock} {baud}");
                        assert!(d.stop_bit >= 1, "{clock} {baud}");
                        assert!(d.transmit >= 1, "{clock} {baud}");
                        assert!(d.is_calibrated());
                    }
                }
            }
        }
    }

    #[test]
    fn test_overhead_larger_than_bit_saturates() {
        // 1 MHz / 115200 -> bit period of 2 steps, far below the overhead
        let d = BitDelays::calculate(1_000_000, 115_200, &CalibrationTable::AVR_GCC43).unwrap();
        assert_eq!(d.centering, 1);
        assert_eq!(d.intra_bit, 1);
        assert_eq!(d.stop_bit, 1);
        assert_eq!(d.transmit, 1);
    }

    #[test]
    fn test_rejects_unusable_rates() {
        assert_eq!(bit_period(16_000_000, 0), Err(TimingError::ZeroBaud));
        assert_eq!(
            bit_period(125_000_000, 300),
            Err(TimingError::BitPeriodOutOfRange)
        );
        assert_eq!(
            bit_period(1_000_000, 1_000_000),
            Err(TimingError::BitPeriodOutOfRange)
        );
    }

    #[test]
    fn test_uncalibrated() {
        assert!(!BitDelays::UNCALIBRATED.is_calibrated());
        assert!(!BitDelays::UNCALIBRATED.can_receive());
        assert_eq!(BitDelays::default(), BitDelays::UNCALIBRATED);
    }

    #[test]
    fn test_subtract_cap() {
        assert_eq!(subtract_cap(10, 3), 7);
        assert_eq!(subtract_cap(3, 3), 1);
        assert_eq!(subtract_cap(0, 5), 1);
    }
}
