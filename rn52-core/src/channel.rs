//! Request/response framing over a [`ByteStream`].
//!
//! Every exchange follows the same shape: drop stale bytes, write the request
//! line with CR LF, then collect the reply in one of the module's reply
//! shapes (single line, multi-line block, hex value, single-byte ack).
//! Waiting is a poll loop with a short sleep, measured against a
//! [`Monotonic`] clock and bounded by [`ChannelConfig::reply_timeout_ms`].

use embedded_hal::delay::DelayNs;
use heapless::String;
use rn52_proto::reply::{is_retry_marker, ACK};
use rn52_proto::{strip_line_ending, CommandError, HexAccumulator, Request, LINE_TERMINATOR};

use crate::platform::Monotonic;
use crate::stream::{ByteStream, StreamError};

/// Capacity of a single-line reply.
pub const MAX_LINE_LENGTH: usize = 64;

/// Capacity of a multi-line block reply (metadata, connection data).
pub const MAX_BLOCK_LENGTH: usize = 512;

pub type Line = String<MAX_LINE_LENGTH>;
pub type Block = String<MAX_BLOCK_LENGTH>;

/// Error type for command exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// The underlying port refused the request.
    Stream(StreamError),
    /// The request did not fit the request buffer.
    Command(CommandError),
    /// No reply within [`ChannelConfig::reply_timeout_ms`].
    Timeout,
    /// The reply line did not fit its buffer. The rest of it was discarded.
    ReplyTooLong,
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "stream error: {e}"),
            Self::Command(e) => write!(f, "command error: {e}"),
            Self::Timeout => write!(f, "no reply from module"),
            Self::ReplyTooLong => write!(f, "reply exceeds buffer"),
        }
    }
}

impl From<StreamError> for ChannelError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<CommandError> for ChannelError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

/// Timing knobs of the command layer. All durations in milliseconds unless
/// named otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Silence that ends a block reply before all segments arrived.
    pub idle_gap_ms: u32,
    /// Re-send period for queries the module may ignore while busy.
    pub requery_interval_ms: u32,
    /// Sleep between polls of the receive buffer, in microseconds.
    pub poll_interval_us: u32,
    /// Upper bound on any wait for a reply. `None` waits forever.
    pub reply_timeout_ms: Option<u32>,
    /// Pause after a fire-and-forget command.
    pub settle_ms: u32,
    /// Pause after writing a configuration register.
    pub register_settle_ms: u32,
    /// Pause after a reboot or factory reset.
    pub reboot_settle_ms: u32,
    /// Reads of a metadata field while it comes back empty.
    pub field_attempts: u8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            idle_gap_ms: 500,
            requery_interval_ms: 50,
            poll_interval_us: 100,
            reply_timeout_ms: Some(2000),
            settle_ms: 50,
            register_settle_ms: 100,
            reboot_settle_ms: 2000,
            field_attempts: 5,
        }
    }
}

/// How a hex query is (re-)sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Requery {
    /// Send once, re-send only after a retry marker.
    Once,
    /// Keep re-sending every `requery_interval_ms` while the line is silent.
    WhileSilent,
}

/// Command/response channel to the module.
pub struct CommandChannel<S, C, D> {
    stream: S,
    clock: C,
    delay: D,
    config: ChannelConfig,
}

impl<S, C, D> CommandChannel<S, C, D>
where
    S: ByteStream,
    C: Monotonic,
    D: DelayNs,
{
    pub fn new(stream: S, clock: C, delay: D) -> Self {
        Self::with_config(stream, clock, delay, ChannelConfig::default())
    }

    pub fn with_config(stream: S, clock: C, delay: D, config: ChannelConfig) -> Self {
        Self {
            stream,
            clock,
            delay,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stream(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_parts(self) -> (S, C, D) {
        (self.stream, self.clock, self.delay)
    }

    /// Sleep for `ms` milliseconds.
    pub fn pause(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    /// Write `request` followed by CR LF.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Stream`] if the port cannot transmit.
    pub fn send(&mut self, request: &Request) -> Result<(), ChannelError> {
        trace!("> {}", request.as_str());
        self.stream.write_all(request.as_bytes())?;
        self.stream.write_all(LINE_TERMINATOR)?;
        Ok(())
    }

    /// Fire-and-forget command followed by the default settle pause.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn command(&mut self, request: &Request) -> Result<(), ChannelError> {
        self.command_settle(request, self.config.settle_ms)
    }

    /// Fire-and-forget command followed by a `settle_ms` pause.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn command_settle(&mut self, request: &Request, settle_ms: u32) -> Result<(), ChannelError> {
        self.send(request)?;
        self.pause(settle_ms);
        Ok(())
    }

    /// Query answered by one CR-terminated line.
    ///
    /// The returned line has its line ending (and a stray leading LF) removed.
    /// Non-ASCII bytes read as `?`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] if the CR never arrives,
    /// [`ChannelError::ReplyTooLong`] if the line overruns [`MAX_LINE_LENGTH`].
    pub fn query_line(&mut self, request: &Request) -> Result<Line, ChannelError> {
        self.discard_stale();
        self.send(request)?;

        let started = self.clock.now_ms();
        let mut raw = Line::new();
        let mut truncated = false;
        loop {
            let b = self.wait_for_byte(started)?;
            if b == b'\r' {
                break;
            }
            truncated |= push_ascii(&mut raw, b).is_err();
        }

        // An overlong line is still consumed up to its CR
        if truncated {
            warn!("reply to {} overran {} bytes", request.as_str(), MAX_LINE_LENGTH);
            return Err(ChannelError::ReplyTooLong);
        }

        let mut line = Line::new();
        let _ = line.push_str(strip_line_ending(&raw));
        trace!("< {}", line.as_str());
        Ok(line)
    }

    /// Query answered by `segments` LF-terminated lines.
    ///
    /// Reading stops after the last expected LF, or once the line has been
    /// silent for longer than `idle_gap_ms` after the first byte: some
    /// fields are simply not sent when empty. A block that overruns
    /// [`MAX_BLOCK_LENGTH`] is truncated, not rejected.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] if not even the first byte arrives.
    pub fn query_block(&mut self, request: &Request, segments: usize) -> Result<Block, ChannelError> {
        self.discard_stale();
        self.send(request)?;

        let started = self.clock.now_ms();
        let first = self.wait_for_byte(started)?;

        let mut block = Block::new();
        let mut truncated = false;
        let mut remaining = segments;
        let mut last_rx = self.clock.now_ms();
        let mut accept = |block: &mut Block, remaining: &mut usize, b: u8| {
            if b == b'\n' {
                *remaining = remaining.saturating_sub(1);
            }
            truncated |= push_ascii(block, b).is_err();
        };
        accept(&mut block, &mut remaining, first);

        while remaining > 0 {
            if let Some(b) = self.stream.read() {
                last_rx = self.clock.now_ms();
                accept(&mut block, &mut remaining, b);
                continue;
            }
            if self.clock.now_ms().wrapping_sub(last_rx) > self.config.idle_gap_ms {
                debug!("{} ended by idle gap, {} segments missing", request.as_str(), remaining);
                break;
            }
            self.delay.delay_us(self.config.poll_interval_us);
        }

        if truncated {
            warn!("block reply to {} truncated at {} bytes", request.as_str(), MAX_BLOCK_LENGTH);
        }
        Ok(block)
    }

    /// Query answered by hex digits up to a CR.
    ///
    /// A retry marker (`?` or `!`) means the module was busy: buffered bytes
    /// are dropped, the partial value is forgotten and the query goes out
    /// again. If the marker's own CR was not among the dropped bytes, the
    /// first CR seen before any new digit belongs to it and is skipped.
    /// Other non-hex bytes are ignored.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] if no complete value arrives in time.
    pub fn query_hex(&mut self, request: &Request, requery: Requery) -> Result<u16, ChannelError> {
        self.discard_stale();

        let mut last_sent = None;
        if requery == Requery::Once {
            self.send(request)?;
        }

        let started = self.clock.now_ms();
        let mut acc = HexAccumulator::new();
        let mut marker_cr_pending = false;
        loop {
            let b = loop {
                if let Some(b) = self.stream.read() {
                    break b;
                }
                self.check_deadline(started)?;
                if requery == Requery::WhileSilent {
                    let now = self.clock.now_ms();
                    let due = last_sent.map_or(true, |at: u32| {
                        now.wrapping_sub(at) >= self.config.requery_interval_ms
                    });
                    if due {
                        self.send(request)?;
                        last_sent = Some(now);
                    }
                }
                self.delay.delay_us(self.config.poll_interval_us);
            };

            if b == b'\r' {
                // The CR closing a marker line can trail the re-sent query
                if marker_cr_pending && acc.digits() == 0 {
                    marker_cr_pending = false;
                    continue;
                }
                trace!("< {}", acc.value());
                return Ok(acc.value());
            }

            if !acc.push(b) && is_retry_marker(b) {
                debug!("module busy, re-sending {}", request.as_str());
                let mut saw_cr = false;
                while let Some(stale) = self.stream.read() {
                    saw_cr |= stale == b'\r';
                }
                marker_cr_pending = !saw_cr;
                acc.reset();
                match requery {
                    Requery::Once => self.send(request)?,
                    Requery::WhileSilent => last_sent = None,
                }
            }
        }
    }

    /// Query answered by exactly `count` characters, folded as hex.
    ///
    /// Used where the module sends a fixed-width word without a reliable
    /// terminator. Non-hex characters count toward `count` but do not
    /// contribute digits.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] if fewer than `count` bytes arrive.
    pub fn query_hex_digits(&mut self, request: &Request, count: usize) -> Result<u16, ChannelError> {
        self.discard_stale();
        self.send(request)?;

        let started = self.clock.now_ms();
        let mut acc = HexAccumulator::new();
        for _ in 0..count {
            let b = self.wait_for_byte(started)?;
            let _ = acc.push(b);
        }
        Ok(acc.value())
    }

    /// Query answered by one decimal line.
    ///
    /// # Errors
    ///
    /// See [`query_line`](Self::query_line).
    pub fn query_decimal(&mut self, request: &Request) -> Result<u32, ChannelError> {
        let line = self.query_line(request)?;
        Ok(rn52_proto::parse_decimal(&line))
    }

    /// Command acknowledged by a single byte.
    ///
    /// Returns whether that byte was the ack. Whatever follows it is
    /// discarded after `register_settle_ms`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] if nothing comes back.
    pub fn command_ack(&mut self, request: &Request) -> Result<bool, ChannelError> {
        self.discard_stale();
        self.send(request)?;

        let started = self.clock.now_ms();
        let reply = self.wait_for_byte(started)?;
        self.pause(self.config.register_settle_ms);
        self.stream.flush();

        if reply != ACK {
            debug!("{} not acknowledged: {}", request.as_str(), reply);
        }
        Ok(reply == ACK)
    }

    /// Repeat `attempt` while `unset` holds for its result, up to
    /// `field_attempts` tries in total. Returns the last result.
    ///
    /// The module sometimes answers a metadata query before it has the data;
    /// asking again usually fills the field in.
    ///
    /// # Errors
    ///
    /// The first error from `attempt`.
    pub fn retry_while<T>(
        &mut self,
        mut attempt: impl FnMut(&mut Self) -> Result<T, ChannelError>,
        unset: impl Fn(&T) -> bool,
    ) -> Result<T, ChannelError> {
        let limit = self.config.field_attempts.max(1);
        let mut value = attempt(self)?;
        let mut tries = 1;
        while unset(&value) && tries < limit {
            debug!("field empty, asking again ({}/{})", tries, limit);
            value = attempt(self)?;
            tries += 1;
        }
        Ok(value)
    }

    fn discard_stale(&mut self) {
        if self.stream.overflow() {
            warn!("receive buffer overflowed since last exchange");
        }
        let dropped = self.stream.discard_pending();
        if dropped > 0 {
            trace!("dropped {} stale bytes", dropped);
        }
    }

    fn wait_for_byte(&mut self, started: u32) -> Result<u8, ChannelError> {
        loop {
            if let Some(b) = self.stream.read() {
                return Ok(b);
            }
            self.check_deadline(started)?;
            self.delay.delay_us(self.config.poll_interval_us);
        }
    }

    fn check_deadline(&self, started: u32) -> Result<(), ChannelError> {
        match self.config.reply_timeout_ms {
            Some(limit) if self.clock.now_ms().wrapping_sub(started) >= limit => {
                warn!("no reply after {} ms", limit);
                Err(ChannelError::Timeout)
            }
            _ => Ok(()),
        }
    }
}

/// Append `b` as a char, mapping non-ASCII to `?`.
fn push_ascii<const N: usize>(out: &mut String<N>, b: u8) -> Result<(), ()> {
    let c = if b.is_ascii() { char::from(b) } else { '?' };
    out.push(c)
}
