//! RN52 Bluetooth module driver for RP2040.
//!
//! This crate binds the platform-agnostic [`rn52_core`] software UART to the
//! RP2040: GPIO reads straight from the SIO block, cycle delays from
//! `cortex-m`, and time from `embassy-time`.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) and:
//! 1. Bit-bangs a 9600 baud 8N1 link to the RN52 on two GPIOs
//! 2. Receives from a high-priority interrupt executor woken by RX edges
//! 3. Queries the module from a thread-mode task and logs what it reports
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | Soft TX  | 8    | To RN52 UART_RX |
//! | Soft RX  | 9    | From RN52 UART_TX (pull-up) |
//!
//! # Architecture
//!
//! - **RX Task** (interrupt executor, `SWI_IRQ_1`): awaits the start-bit edge
//!   and calls [`ListenerRegistry::on_edge`](rn52_core::ListenerRegistry::on_edge)
//! - **Device Task** (thread executor): enables track-change events and polls
//!   the event register
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`inverse-logic`**: Idle-low lines with inverted data
//!
//! # Re-exports
//!
//! This crate re-exports the public items of [`rn52_core`] used by the
//! binary, so it only needs to depend on this crate.

#![no_std]

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features");

pub use rn52_core::{
    ByteStream, CalibrationTable, ChannelError, CommandChannel, ListenerRegistry, Port, Rn52,
    SerialConfig, SoftSerial,
};
pub use rn52_proto::ExtFeatures;

pub mod platform;

pub use platform::{CortexMDelay, EdgeGate, EmbassyClock, SioInput};

/// System clock the cycle delays are counted against.
pub const CLOCK_HZ: u32 = 125_000_000;

/// RN52 default UART rate.
pub const RN52_BAUD: u32 = 9600;

/// Soft RX pin number.
pub const RX_PIN: u8 = 9;

/// Whether the lines idle low.
pub const INVERSE_LOGIC: bool = cfg!(feature = "inverse-logic");

/// The software UART as wired on this board.
pub type Rn52Serial = SoftSerial<SioInput, embassy_rp::gpio::Output<'static>, EdgeGate, CortexMDelay>;

/// Registry holding the one software port.
pub type Ports = ListenerRegistry<Rn52Serial, 1>;

/// Line configuration for this board.
#[must_use]
pub const fn serial_config() -> SerialConfig {
    SerialConfig::new(CLOCK_HZ)
        .inverted(INVERSE_LOGIC)
        .with_calibration(CalibrationTable::RP2040)
}
