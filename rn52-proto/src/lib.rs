//! RN52 command vocabulary, hex codec and reply parsing.
//!
//! This crate holds everything about the module's textual protocol that
//! does not need a serial line:
//!
//! - **Requests**: [`Verb`] and the [`Request`] line builder
//! - **Hex codec**: [`hex::encode_hex_u16`], [`HexAccumulator`]
//! - **Replies**: terminator stripping, `Key=Value` field extraction,
//!   [`MacAddress`]
//! - **Registers**: [`ExtFeatures`], [`EventRegister`], [`AudioRouting`],
//!   [`GpioWord`]
//!
//! # Protocol Format
//!
//! Requests are ASCII lines:
//!
//! ```text
//! <verb>[,<args>]\r\n
//! ```
//!
//! Replies are one of:
//!
//! - a single line ending in `\r` (`GN` -> `MyDevice\r`)
//! - a block of `Key=Value\r\n` lines, sometimes cut short (`AD`, `D`)
//! - a hex word ending in `\r` (`G%` -> `0021\r`), or `?` / `!` when the
//!   module wants the query repeated
//!
//! # Example
//!
//! ```
//! use rn52_proto::{ExtFeatures, Request, Verb};
//!
//! let current = ExtFeatures(0x0001);
//! let updated = current.with(ExtFeatures::VOLUME_TONE_MUTE, true);
//! let req = Request::new(Verb::SetExtFeatures).hex16(updated.raw()).unwrap();
//! assert_eq!(req.as_str(), "S%,0021");
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod command;
pub mod hex;
pub mod registers;
pub mod reply;

pub use command::{CommandError, Request, Verb, LINE_TERMINATOR, MAX_REQUEST_LENGTH};
pub use hex::{decode_hex_u16, encode_hex_u16, HexAccumulator};
pub use registers::{AudioRouting, EventRegister, ExtFeatures, GpioWord};
pub use reply::{field, parse_decimal, strip_line_ending, MacAddress};
