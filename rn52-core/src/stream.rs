//! Byte-stream contract between a serial port and the command channel.

/// Error type for byte-stream operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// The port is not the active listener.
    NotListening,
    /// Transmit attempted before `begin` calibrated the bit timing.
    WriteUnavailable,
}

impl core::fmt::Display for StreamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotListening => write!(f, "port is not listening"),
            Self::WriteUnavailable => write!(f, "transmit timing not initialized"),
        }
    }
}

/// Non-blocking byte stream.
///
/// Reads never wait: an empty or inactive stream answers `None`/`0`.
/// Writes are allowed to block for the duration of one byte.
pub trait ByteStream {
    /// Bytes waiting to be read.
    fn available(&self) -> usize;

    /// Take the next byte.
    fn read(&mut self) -> Option<u8>;

    /// Look at the next byte without taking it.
    fn peek(&self) -> Option<u8>;

    /// Send one byte. Either the whole byte goes out or nothing does.
    fn write(&mut self, byte: u8) -> Result<(), StreamError>;

    /// Drop everything waiting to be read.
    fn flush(&mut self);

    /// Return and clear the sticky receive-overflow flag.
    fn overflow(&mut self) -> bool;

    /// Send a slice, stopping at the first failed byte.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        for &b in bytes {
            self.write(b)?;
        }
        Ok(())
    }

    /// Read and drop unread bytes. Returns how many were dropped.
    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.available() > 0 && self.read().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn available(&self) -> usize {
        T::available(self)
    }

    fn read(&mut self) -> Option<u8> {
        T::read(self)
    }

    fn peek(&self) -> Option<u8> {
        T::peek(self)
    }

    fn write(&mut self, byte: u8) -> Result<(), StreamError> {
        T::write(self, byte)
    }

    fn flush(&mut self) {
        T::flush(self);
    }

    fn overflow(&mut self) -> bool {
        T::overflow(self)
    }
}
