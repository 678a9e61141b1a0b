//! 16-bit configuration and status words.
//!
//! The module exposes its settings as whole words: the host fetches one in
//! full, flips bits in its local copy and writes the whole word back. None
//! of these types talk to the device; they only do the bit arithmetic.

use core::ops::{BitOr, BitOrAssign};

/// Extended features register (`G%` / `S%`).
///
/// # Example
///
/// ```
/// use rn52_proto::ExtFeatures;
///
/// let mut features = ExtFeatures(0x0001);
/// features.set(ExtFeatures::VOLUME_TONE_MUTE, true);
/// assert_eq!(features.raw(), 0x0021);
/// assert!(features.contains(ExtFeatures::AVRCP_BUTTONS));
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtFeatures(pub u16);

impl ExtFeatures {
    pub const AVRCP_BUTTONS: Self = Self(1 << 0);
    pub const POWER_UP_RECONNECT: Self = Self(1 << 1);
    pub const STARTUP_DISCOVERABLE: Self = Self(1 << 2);
    pub const REBOOT_ON_DISCONNECT: Self = Self(1 << 4);
    pub const VOLUME_TONE_MUTE: Self = Self(1 << 5);
    pub const SYSTEM_TONES_DISABLED: Self = Self(1 << 7);
    pub const POWER_DOWN_AFTER_PAIRING_TIMEOUT: Self = Self(1 << 8);
    pub const RESET_AFTER_POWER_DOWN: Self = Self(1 << 9);
    pub const RECONNECT_AFTER_PANIC: Self = Self(1 << 10);
    /// Undocumented: raise a track-change event in the `Q` register.
    pub const TRACK_CHANGE_EVENT: Self = Self(1 << 12);
    pub const TONES_AT_FIXED_VOLUME: Self = Self(1 << 13);
    pub const AUTO_ACCEPT_PASSKEY: Self = Self(1 << 14);

    /// No features enabled.
    pub const NONE: Self = Self(0);

    /// Flag for a raw bit index (0-15).
    #[inline]
    #[must_use]
    pub const fn bit(index: u8) -> Self {
        Self(1 << (index & 0xF))
    }

    /// Check if the given flag(s) are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, flag: ExtFeatures) -> bool {
        (self.0 & flag.0) == flag.0
    }

    /// Set or clear flag(s), leaving all other bits untouched.
    #[inline]
    pub fn set(&mut self, flag: ExtFeatures, enabled: bool) {
        if enabled {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    /// Copy of this word with `flag` set or cleared.
    #[inline]
    #[must_use]
    pub fn with(mut self, flag: ExtFeatures, enabled: bool) -> Self {
        self.set(flag, enabled);
        self
    }

    /// Get the raw u16 value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl BitOr for ExtFeatures {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExtFeatures {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Event/status register returned by `Q`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventRegister(pub u16);

impl EventRegister {
    /// Bit raised when the playing track changed.
    pub const TRACK_CHANGED: u16 = 1 << 13;
    /// Connection state nibble.
    pub const CONNECTION_MASK: u16 = 0x0F00;

    /// Whether the track-change event bit is raised.
    #[inline]
    #[must_use]
    pub const fn track_changed(self) -> bool {
        self.0 & Self::TRACK_CHANGED != 0
    }

    /// Whether any connection state bit is set.
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        self.0 & Self::CONNECTION_MASK != 0
    }

    /// Raw connection state nibble (0 when idle).
    #[inline]
    #[must_use]
    pub const fn connection_state(self) -> u8 {
        ((self.0 & Self::CONNECTION_MASK) >> 8) as u8
    }
}

/// Audio routing register (`G|` / `S|`), three 4-bit fields.
///
/// ```text
/// bits 11..8  A2DP route
/// bits  7..4  sample width
/// bits  3..0  sample rate
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioRouting(pub u16);

impl AudioRouting {
    const RATE_SHIFT: u16 = 0;
    const WIDTH_SHIFT: u16 = 4;
    const ROUTE_SHIFT: u16 = 8;

    #[inline]
    const fn nibble(self, shift: u16) -> u8 {
        ((self.0 >> shift) & 0xF) as u8
    }

    #[inline]
    const fn with_nibble(self, shift: u16, value: u8) -> Self {
        let cleared = self.0 & !(0xF << shift);
        Self(cleared | (((value & 0xF) as u16) << shift))
    }

    #[must_use]
    pub const fn sample_rate(self) -> u8 {
        self.nibble(Self::RATE_SHIFT)
    }

    #[must_use]
    pub const fn with_sample_rate(self, rate: u8) -> Self {
        self.with_nibble(Self::RATE_SHIFT, rate)
    }

    #[must_use]
    pub const fn sample_width(self) -> u8 {
        self.nibble(Self::WIDTH_SHIFT)
    }

    #[must_use]
    pub const fn with_sample_width(self, width: u8) -> Self {
        self.with_nibble(Self::WIDTH_SHIFT, width)
    }

    #[must_use]
    pub const fn a2dp_route(self) -> u8 {
        self.nibble(Self::ROUTE_SHIFT)
    }

    #[must_use]
    pub const fn with_a2dp_route(self, route: u8) -> Self {
        self.with_nibble(Self::ROUTE_SHIFT, route)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Host-side shadow of one GPIO control word (`I@` direction or `I&` level).
///
/// The module only accepts some pins; every write is forced through a fixed
/// mask (bits that must stay set) and protect word (bits the host may touch).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioWord {
    shadow: u16,
    mask: u16,
    protect: u16,
}

impl GpioWord {
    /// Direction word: GPIO2 forced, GPIO 2,5,6,10-13 writable.
    pub const DIRECTION: Self = Self::new(0x0004, 0x3C64);
    /// Level word: GPIO 2,4,7 forced, GPIO 2,4-7,10-13 writable.
    pub const LEVELS: Self = Self::new(0x0094, 0x3CF4);

    #[must_use]
    pub const fn new(mask: u16, protect: u16) -> Self {
        Self {
            shadow: 0,
            mask,
            protect,
        }
    }

    /// Update one pin in the shadow copy.
    #[inline]
    pub fn set_pin(&mut self, pin: u8, high: bool) {
        let bit = 1u16 << (pin & 0xF);
        if high {
            self.shadow |= bit;
        } else {
            self.shadow &= !bit;
        }
    }

    /// The word to send: `(shadow | mask) & protect`.
    #[inline]
    #[must_use]
    pub const fn wire_value(&self) -> u16 {
        (self.shadow | self.mask) & self.protect
    }

    /// Read one pin out of a word reported by the module.
    #[inline]
    #[must_use]
    pub const fn pin_of(word: u16, pin: u8) -> bool {
        (word >> (pin & 0xF)) & 1 == 1
    }
}
