//! Request builder for the RN52 ASCII command set.
//!
//! Every request is a verb, optionally followed by comma-separated
//! arguments, and terminated by CR LF:
//!
//! ```text
//! <verb>[,<arg>[,<arg>...]]\r\n
//! ```
//!
//! # Example
//!
//! ```
//! use rn52_proto::{Request, Verb};
//!
//! let req = Request::new(Verb::SetExtFeatures).hex16(0x0021).unwrap();
//! assert_eq!(req.as_bytes(), b"S%,0021");
//!
//! let req = Request::new(Verb::Call).arg("5551234").unwrap();
//! assert_eq!(req.as_str(), "A,5551234");
//! ```

use core::fmt::Write;

use heapless::String;

use crate::hex::{encode_hex_u16, write_hex_u8};

/// Maximum request length, excluding the line terminator.
pub const MAX_REQUEST_LENGTH: usize = 48;

/// Terminator appended to every request on the wire.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Error type for request construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The request does not fit in [`MAX_REQUEST_LENGTH`] bytes.
    Overflow,
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overflow => write!(f, "request too long"),
        }
    }
}

/// Command verbs understood by the module.
///
/// This is the illustrative subset used by the device facade, not the
/// module's complete command reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verb {
    /// `GN` - get device name.
    GetName,
    /// `SN` - set device name verbatim.
    SetName,
    /// `S-` - set normalized device name (module appends MAC digits).
    SetNameNormalized,
    /// `@` - discoverability on/off.
    Discoverable,
    /// `+` - toggle local echo.
    ToggleEcho,
    /// `SF` - factory defaults.
    FactoryReset,
    /// `R` - reboot.
    Reboot,
    /// `G^` - get idle power-down timer.
    GetIdlePowerDown,
    /// `S^` - set idle power-down timer.
    SetIdlePowerDown,
    /// `A` - dial a number.
    Call,
    /// `E` - end or reject a call.
    EndCall,
    /// `AP` - play/pause.
    PlayPause,
    /// `AT+` - next track.
    NextTrack,
    /// `AT-` - previous track.
    PrevTrack,
    /// `AV+` - volume up.
    VolumeUp,
    /// `AV-` - volume down.
    VolumeDown,
    /// `AD` - track metadata block.
    Metadata,
    /// `D` - connection information block.
    ConnectionData,
    /// `G%` - get extended features register.
    GetExtFeatures,
    /// `S%` - set extended features register.
    SetExtFeatures,
    /// `Q` - query event/status register.
    EventRegister,
    /// `GS` - get startup volume.
    GetStartupVolume,
    /// `SS` - set startup volume.
    SetStartupVolume,
    /// `G|` - get audio routing register.
    GetAudioRouting,
    /// `S|` - set audio routing register.
    SetAudioRouting,
    /// `I@` - GPIO direction word.
    GpioDirection,
    /// `I&` - GPIO level word (query without args, write with one).
    GpioLevels,
}

impl Verb {
    /// The verb as sent on the wire.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::GetName => "GN",
            Self::SetName => "SN",
            Self::SetNameNormalized => "S-",
            Self::Discoverable => "@",
            Self::ToggleEcho => "+",
            Self::FactoryReset => "SF",
            Self::Reboot => "R",
            Self::GetIdlePowerDown => "G^",
            Self::SetIdlePowerDown => "S^",
            Self::Call => "A",
            Self::EndCall => "E",
            Self::PlayPause => "AP",
            Self::NextTrack => "AT+",
            Self::PrevTrack => "AT-",
            Self::VolumeUp => "AV+",
            Self::VolumeDown => "AV-",
            Self::Metadata => "AD",
            Self::ConnectionData => "D",
            Self::GetExtFeatures => "G%",
            Self::SetExtFeatures => "S%",
            Self::EventRegister => "Q",
            Self::GetStartupVolume => "GS",
            Self::SetStartupVolume => "SS",
            Self::GetAudioRouting => "G|",
            Self::SetAudioRouting => "S|",
            Self::GpioDirection => "I@",
            Self::GpioLevels => "I&",
        }
    }
}

/// A single request line, built argument by argument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Request {
    line: String<MAX_REQUEST_LENGTH>,
}

impl Request {
    /// Start a request with no arguments.
    pub fn new(verb: Verb) -> Self {
        let mut line = String::new();
        // Longest mnemonic is 3 bytes, always fits.
        let _ = line.push_str(verb.mnemonic());
        Self { line }
    }

    /// Append a text argument.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Overflow`] if the request gets too long.
    pub fn arg(mut self, value: &str) -> Result<Self, CommandError> {
        self.separator()?;
        self.line
            .push_str(value)
            .map_err(|()| CommandError::Overflow)?;
        Ok(self)
    }

    /// Append a 4-digit zero-padded hex argument.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Overflow`] if the request gets too long.
    pub fn hex16(self, value: u16) -> Result<Self, CommandError> {
        let digits = encode_hex_u16(value);
        // Hex digits are always ASCII.
        let text = core::str::from_utf8(&digits).map_err(|_| CommandError::Overflow)?;
        self.arg(text)
    }

    /// Append a 2-digit hex argument.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Overflow`] if the request gets too long.
    pub fn hex8(self, value: u8) -> Result<Self, CommandError> {
        let mut digits = [0u8; 2];
        write_hex_u8(&mut digits, value);
        let text = core::str::from_utf8(&digits).map_err(|_| CommandError::Overflow)?;
        self.arg(text)
    }

    /// Append a decimal argument.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Overflow`] if the request gets too long.
    pub fn decimal(mut self, value: u32) -> Result<Self, CommandError> {
        self.separator()?;
        write!(self.line, "{value}").map_err(|_| CommandError::Overflow)?;
        Ok(self)
    }

    /// Append a `1`/`0` flag argument.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Overflow`] if the request gets too long.
    pub fn flag(self, on: bool) -> Result<Self, CommandError> {
        self.arg(if on { "1" } else { "0" })
    }

    /// The request text without terminator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }

    /// The request bytes without terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    fn separator(&mut self) -> Result<(), CommandError> {
        self.line.push(',').map_err(|()| CommandError::Overflow)
    }
}

impl From<Verb> for Request {
    fn from(verb: Verb) -> Self {
        Self::new(verb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_verb() {
        assert_eq!(Request::new(Verb::GetName).as_str(), "GN");
        assert_eq!(Request::from(Verb::NextTrack).as_str(), "AT+");
    }

    #[test]
    fn test_hex16_argument_is_padded() {
        let req = Request::new(Verb::SetAudioRouting).hex16(0x0B).unwrap();
        assert_eq!(req.as_str(), "S|,000B");
    }

    #[test]
    fn test_hex8_argument() {
        let req = Request::new(Verb::SetStartupVolume).hex8(11).unwrap();
        assert_eq!(req.as_str(), "SS,0B");
    }

    #[test]
    fn test_decimal_and_flag_arguments() {
        let req = Request::new(Verb::SetIdlePowerDown).decimal(120).unwrap();
        assert_eq!(req.as_str(), "S^,120");

        let req = Request::new(Verb::FactoryReset).flag(true).unwrap();
        assert_eq!(req.as_str(), "SF,1");

        let req = Request::new(Verb::Discoverable).flag(false).unwrap();
        assert_eq!(req.as_str(), "@,0");
    }

    #[test]
    fn test_overflow_is_reported() {
        let long = "0123456789012345678901234567890123456789012345678";
        assert_eq!(
            Request::new(Verb::SetName).arg(long),
            Err(CommandError::Overflow)
        );
    }
}
