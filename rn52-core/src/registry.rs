//! Which software port owns the receive interrupt.
//!
//! Only one port can receive at a time: a bit-banged receiver monopolizes the
//! CPU for a whole frame, so two receivers would corrupt each other. The
//! registry holds every port and an index to the active one; the pin-change
//! interrupt calls [`ListenerRegistry::on_edge`], which forwards to that port
//! alone.
//!
//! # Example
//!
//! ```ignore
//! static PORTS: StaticCell<ListenerRegistry<MySerial, 2>> = StaticCell::new();
//! let ports = PORTS.init(ListenerRegistry::new([gps, rn52]));
//!
//! let rn52 = ports.port(1).unwrap();
//! rn52.begin(9600)?;      // calibrates and listens
//!
//! // In the pin-change interrupt:
//! ports.on_edge();
//! ```

use portable_atomic::{AtomicUsize, Ordering};

use crate::serial::Transceiver;
use crate::stream::{ByteStream, StreamError};
use crate::timing::TimingError;

const NO_LISTENER: usize = usize::MAX;

/// Fixed set of ports with at most one active listener.
pub struct ListenerRegistry<S, const PORTS: usize> {
    ports: [S; PORTS],
    active: AtomicUsize,
}

impl<S: Transceiver, const PORTS: usize> ListenerRegistry<S, PORTS> {
    /// Take ownership of the ports. Nobody listens yet.
    pub const fn new(ports: [S; PORTS]) -> Self {
        Self {
            ports,
            active: AtomicUsize::new(NO_LISTENER),
        }
    }

    /// Handle to port `index`, or `None` if out of range.
    #[must_use]
    pub fn port(&self, index: usize) -> Option<Port<'_, S, PORTS>> {
        (index < PORTS).then_some(Port {
            registry: self,
            index,
        })
    }

    /// Index of the listening port.
    #[must_use]
    pub fn active(&self) -> Option<usize> {
        match self.active.load(Ordering::Acquire) {
            NO_LISTENER => None,
            index => Some(index),
        }
    }

    /// Pin-change interrupt entry point.
    ///
    /// Receives one symbol on the active port; does nothing when no port is
    /// listening.
    pub fn on_edge(&self) {
        critical_section::with(|cs| {
            if let Some(port) = self.ports.get(self.active.load(Ordering::Acquire)) {
                port.on_edge(cs);
            }
        });
    }

    fn listen(&self, index: usize) -> bool {
        let port = &self.ports[index];
        if !port.can_receive() {
            warn!("port {} cannot listen before begin", index);
            return false;
        }

        let switched = critical_section::with(|cs| {
            let previous = self.active.load(Ordering::Acquire);
            if previous == index {
                return false;
            }

            // Old trigger off before the new one goes on
            if let Some(old) = self.ports.get(previous) {
                old.set_trigger(cs, false);
            }

            port.reset_rx(cs);
            let _ = port.take_overflow();
            self.active.store(index, Ordering::Release);
            port.set_trigger(cs, true);
            true
        });

        if switched {
            debug!("port {} listening", index);
        }
        switched
    }

    fn stop_listening(&self, index: usize) -> bool {
        critical_section::with(|cs| {
            if self.active.load(Ordering::Acquire) != index {
                return false;
            }
            self.ports[index].set_trigger(cs, false);
            self.active.store(NO_LISTENER, Ordering::Release);
            true
        })
    }

    fn is_listening(&self, index: usize) -> bool {
        self.active.load(Ordering::Acquire) == index
    }
}

/// One port of a [`ListenerRegistry`], usable as a [`ByteStream`].
///
/// Reads only see data while the port is the active listener.
pub struct Port<'r, S, const PORTS: usize> {
    registry: &'r ListenerRegistry<S, PORTS>,
    index: usize,
}

impl<S, const PORTS: usize> Clone for Port<'_, S, PORTS> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, const PORTS: usize> Copy for Port<'_, S, PORTS> {}

impl<'r, S: Transceiver, const PORTS: usize> Port<'r, S, PORTS> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The underlying transceiver.
    #[must_use]
    pub fn transceiver(&self) -> &'r S {
        &self.registry.ports[self.index]
    }

    /// Calibrate for `baud` and start listening.
    ///
    /// # Errors
    ///
    /// Returns a [`TimingError`] if `baud` is unusable; the port is left
    /// uncalibrated and does not listen.
    pub fn begin(&self, baud: u32) -> Result<(), TimingError> {
        if let Err(e) = self.transceiver().calibrate(baud) {
            warn!("port {} rejected baud {}: {}", self.index, baud, e);
            let _ = self.stop_listening();
            return Err(e);
        }
        let _ = self.listen();
        Ok(())
    }

    /// Stop listening. Calibration is kept, so [`listen`](Self::listen)
    /// resumes without another `begin`.
    pub fn end(&self) {
        let _ = self.stop_listening();
    }

    /// Become the active listener, displacing any other port.
    ///
    /// Returns `true` if this call switched the listener; `false` if this
    /// port already listened or was never calibrated.
    pub fn listen(&self) -> bool {
        self.registry.listen(self.index)
    }

    /// Returns `true` if this port was listening.
    pub fn stop_listening(&self) -> bool {
        self.registry.stop_listening(self.index)
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.registry.is_listening(self.index)
    }
}

impl<S: Transceiver, const PORTS: usize> ByteStream for Port<'_, S, PORTS> {
    fn available(&self) -> usize {
        if self.is_listening() {
            self.transceiver().rx_len()
        } else {
            0
        }
    }

    fn read(&mut self) -> Option<u8> {
        if self.is_listening() {
            self.transceiver().rx_pop()
        } else {
            None
        }
    }

    fn peek(&self) -> Option<u8> {
        if self.is_listening() {
            self.transceiver().rx_peek()
        } else {
            None
        }
    }

    fn write(&mut self, byte: u8) -> Result<(), StreamError> {
        self.transceiver().write(byte)
    }

    fn flush(&mut self) {
        if self.is_listening() {
            critical_section::with(|cs| self.transceiver().reset_rx(cs));
        }
    }

    fn overflow(&mut self) -> bool {
        self.transceiver().take_overflow()
    }
}
