//! Reply parsing helpers.
//!
//! The module answers in three shapes: a single CR-terminated line, a block
//! of `Key=Value\r\n` lines (metadata and connection info), or a bare hex
//! word. The functions here work on complete, already-framed replies.
//!
//! # Block format
//!
//! ```text
//! Title=Some Song\r\n
//! Artist=Somebody\r\n
//! TrackNumber=3\r\n
//! ```

use heapless::String;

/// Segments in a metadata (`AD`) block.
pub const METADATA_SEGMENTS: usize = 8;

/// Segments in a connection information (`D`) block.
pub const CONNECTION_SEGMENTS: usize = 13;

/// Length of a MAC address as printed by the module (12 hex digits).
pub const MAC_LENGTH: usize = 12;

/// Reply markers that ask the host to repeat its query.
pub const RETRY_MARKERS: [u8; 2] = [b'?', b'!'];

/// Acknowledge byte for accepted commands.
pub const ACK: u8 = b'A';

/// Check whether a byte asks for the query to be re-issued.
#[inline]
#[must_use]
pub fn is_retry_marker(b: u8) -> bool {
    RETRY_MARKERS.contains(&b)
}

/// Strip a trailing CR (and any LF around it) from a single-line reply.
///
/// A leading LF left over from the previous reply's CR LF is dropped too.
#[inline]
#[must_use]
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_prefix('\n').unwrap_or(line);
    line.trim_end_matches(['\r', '\n'])
}

/// Extract the value of `key` from a `Key=Value` block.
///
/// `key` includes the `=`, e.g. `"Title="`. The value runs up to the next CR.
/// A block truncated before the CR yields everything after the key, minus
/// any trailing LF. Returns `None` when the key is absent.
///
/// # Example
///
/// ```
/// use rn52_proto::reply::field;
///
/// let block = "Title=Blue\r\nArtist=Someone\r\n";
/// assert_eq!(field(block, "Artist="), Some("Someone"));
/// assert_eq!(field(block, "Genre="), None);
/// ```
#[must_use]
pub fn field<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    let start = block.find(key)? + key.len();
    let rest = &block[start..];
    let end = rest.find('\r').unwrap_or(rest.len());
    Some(rest[..end].trim_end_matches('\n'))
}

/// Parse a decimal field the way the module's numeric fields are read:
/// leading digits only, anything unparseable reads as 0.
#[must_use]
pub fn parse_decimal(s: &str) -> u32 {
    s.trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Bluetooth address of the connected peer, as 12 uppercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddress(String<MAC_LENGTH>);

impl MacAddress {
    /// Validate and wrap a MAC string. Only exactly 12 characters pass.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != MAC_LENGTH {
            return None;
        }
        let mut out = String::new();
        out.push_str(s).ok()?;
        Some(Self(out))
    }

    /// The address text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl core::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = "Title=Blue Monday\r\nArtist=New Order\r\nAlbum=Power\r\nTrackNumber=3\r\nTrackCount=12\r\nGenre=Synth\r\nTime(ms)=448000\r\n";

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending("MyDevice\r"), "MyDevice");
        assert_eq!(strip_line_ending("\nMyDevice\r\n"), "MyDevice");
        assert_eq!(strip_line_ending("MyDevice"), "MyDevice");
        assert_eq!(strip_line_ending("\r"), "");
    }

    #[test]
    fn test_field_extraction() {
        assert_eq!(field(METADATA, "Title="), Some("Blue Monday"));
        assert_eq!(field(METADATA, "Album="), Some("Power"));
        assert_eq!(field(METADATA, "TrackCount="), Some("12"));
        assert_eq!(field(METADATA, "Composer="), None);
    }

    #[test]
    fn test_field_on_truncated_block() {
        assert_eq!(field("Title=Half a na", "Title="), Some("Half a na"));
        assert_eq!(field("Genre=Pop\n", "Genre="), Some("Pop"));
        assert_eq!(field("Title=", "Title="), Some(""));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("12"), 12);
        assert_eq!(parse_decimal(" 7"), 7);
        assert_eq!(parse_decimal("3abc"), 3);
        assert_eq!(parse_decimal("abc"), 0);
        assert_eq!(parse_decimal(""), 0);
    }

    #[test]
    fn test_mac_address_length() {
        let mac = MacAddress::parse("0018E4A1B2C3").unwrap();
        assert_eq!(mac.as_str(), "0018E4A1B2C3");
        assert!(MacAddress::parse("0018E4A1B2").is_none());
        assert!(MacAddress::parse("").is_none());
    }

    #[test]
    fn test_retry_markers() {
        assert!(is_retry_marker(b'?'));
        assert!(is_retry_marker(b'!'));
        assert!(!is_retry_marker(b'A'));
    }
}
