//! Software UART and command channel for the Microchip RN52 Bluetooth module.
//!
//! This crate lets a microcontroller without a spare hardware UART talk to an
//! RN52 over any two GPIO pins. It has no platform dependencies: pins come in
//! through `embedded-hal`, and the few capabilities `embedded-hal` lacks
//! (cycle-exact delays, per-pin edge interrupt gating, a millisecond clock)
//! through the traits in [`platform`].
//!
//! # Overview
//!
//! - [`timing`]: bit delays from clock and baud ([`BitDelays`], [`CalibrationTable`])
//! - [`ring`]: lock-free receive buffer ([`RxRing`])
//! - [`serial`]: the bit-banged transceiver ([`SoftSerial`])
//! - [`registry`]: single active listener and ISR dispatch ([`ListenerRegistry`], [`Port`])
//! - [`stream`]: byte stream contract ([`ByteStream`])
//! - [`channel`]: request/reply framing ([`CommandChannel`])
//! - [`device`]: the RN52 command surface ([`Rn52`])
//!
//! # Data Flow
//!
//! ```text
//! RX edge ISR -> ListenerRegistry::on_edge -> SoftSerial -> RxRing
//!                                                             |
//!     Rn52 <- CommandChannel <- Port (ByteStream) <-----------+
//!       |
//!       +--> CommandChannel::send -> Port::write -> SoftSerial TX
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt and derive `defmt::Format` (for embedded logging)
//! - **`log`**: Log through the `log` facade when defmt is off
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations. The
//! interrupt path never logs.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod channel;
pub mod device;
pub mod platform;
pub mod registry;
pub mod ring;
pub mod serial;
pub mod stream;
pub mod timing;

#[cfg(test)]
mod sim;

// Re-export main types at crate root
pub use channel::{ChannelConfig, ChannelError, CommandChannel, Requery};
pub use device::Rn52;
pub use platform::{CycleDelay, EdgeTrigger, Monotonic};
pub use registry::{ListenerRegistry, Port};
pub use ring::{RxRing, RX_BUFFER_SIZE};
pub use serial::{SerialConfig, SoftSerial, Transceiver};
pub use stream::{ByteStream, StreamError};
pub use timing::{BitDelays, CalibrationTable, TimingError};
