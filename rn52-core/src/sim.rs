//! Host-side stand-ins for pins, timers and the module, shared by the tests.

extern crate std;

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::platform::{CycleDelay, EdgeTrigger, Monotonic};
use crate::serial::{SerialConfig, SoftSerial};
use crate::stream::{ByteStream, StreamError};

/// One simulated wire pair. Time is counted in delay units and only moves
/// when the transceiver busy-waits.
pub struct Wire {
    now: Cell<u64>,
    bit: u64,
    inverse: bool,
    frame: Cell<Option<(u64, u8)>>,
    tx: RefCell<Vec<(u64, bool)>>,
}

impl Wire {
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Start an 8N1 frame on the receive line right now.
    pub fn send_frame(&self, byte: u8) {
        self.frame.set(Some((self.now.get(), byte)));
    }

    /// Move past the stop bit of the current frame.
    pub fn finish_frame(&self) {
        if let Some((start, _)) = self.frame.take() {
            let end = start + 10 * self.bit;
            if self.now.get() < end {
                self.now.set(end);
            }
        }
    }

    fn rx_level(&self) -> bool {
        let level = match self.frame.get() {
            Some((start, byte)) if self.now.get() >= start => {
                match (self.now.get() - start) / self.bit {
                    0 => false,
                    k @ 1..=8 => (byte >> (k - 1)) & 1 != 0,
                    _ => true,
                }
            }
            _ => true,
        };
        level != self.inverse
    }

    pub fn tx_log(&self) -> Vec<(u64, bool)> {
        self.tx.borrow().clone()
    }

    pub fn tx_levels(&self) -> Vec<bool> {
        self.tx.borrow().iter().map(|&(_, level)| level).collect()
    }
}

pub struct SimRx(Rc<Wire>);

impl ErrorType for SimRx {
    type Error = Infallible;
}

impl InputPin for SimRx {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.rx_level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.rx_level())
    }
}

pub struct SimTx(Rc<Wire>);

impl ErrorType for SimTx {
    type Error = Infallible;
}

impl OutputPin for SimTx {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.tx.borrow_mut().push((self.0.now.get(), false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.tx.borrow_mut().push((self.0.now.get(), true));
        Ok(())
    }
}

pub struct CycleCounter(Rc<Wire>);

impl CycleDelay for CycleCounter {
    fn delay_units(&self, units: u16) {
        self.0.now.set(self.0.now.get() + u64::from(units));
    }
}

/// Trigger changes across several lines, in the order they happened.
pub type TriggerJournal = Rc<RefCell<Vec<(usize, bool)>>>;

#[derive(Default)]
pub struct TriggerState {
    enabled: Cell<bool>,
    toggles: RefCell<Vec<bool>>,
    journal: RefCell<Option<(usize, TriggerJournal)>>,
}

impl TriggerState {
    /// Also record every change into `journal`, tagged with `id`.
    pub fn record_into(&self, id: usize, journal: &TriggerJournal) {
        *self.journal.borrow_mut() = Some((id, journal.clone()));
    }

    pub fn get(&self) -> bool {
        self.enabled.get()
    }

    pub fn toggles(&self) -> Vec<bool> {
        self.toggles.borrow().clone()
    }
}

pub struct SimTrigger(Rc<TriggerState>);

impl EdgeTrigger for SimTrigger {
    fn set_enabled(&mut self, enabled: bool) {
        self.0.enabled.set(enabled);
        self.0.toggles.borrow_mut().push(enabled);
        if let Some((id, journal)) = &*self.0.journal.borrow() {
            journal.borrow_mut().push((*id, enabled));
        }
    }
}

pub type SimSerial = SoftSerial<SimRx, SimTx, SimTrigger, CycleCounter>;

/// A transceiver wired to its own simulated line.
pub struct SimLine {
    pub wire: Rc<Wire>,
    pub trigger: Rc<TriggerState>,
    pub serial: SimSerial,
}

impl SimLine {
    pub fn new(bit: u64, inverse: bool, config: SerialConfig) -> Self {
        let wire = Rc::new(Wire {
            now: Cell::new(0),
            bit,
            inverse,
            frame: Cell::new(None),
            tx: RefCell::new(Vec::new()),
        });
        let trigger = Rc::new(TriggerState::default());
        let serial = SoftSerial::new(
            SimRx(wire.clone()),
            SimTx(wire.clone()),
            SimTrigger(trigger.clone()),
            CycleCounter(wire.clone()),
            config,
        );
        Self {
            wire,
            trigger,
            serial,
        }
    }
}

/// Virtual time for the command layer. Serves as both clock and sleeper.
#[derive(Clone, Default)]
pub struct VirtualClock(Rc<Cell<u64>>);

impl VirtualClock {
    pub fn elapsed_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

impl Monotonic for VirtualClock {
    fn now_ms(&self) -> u32 {
        (self.0.get() / 1_000_000) as u32
    }
}

impl DelayNs for VirtualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns));
    }
}

#[derive(Default)]
struct Script {
    replies: Vec<(String, VecDeque<Vec<u8>>)>,
    sent: Vec<String>,
    partial: Vec<u8>,
    rx: VecDeque<u8>,
    overflow: bool,
    clock: Option<VirtualClock>,
    scheduled: VecDeque<(u64, Vec<u8>)>,
}

impl Script {
    /// Move bursts whose time has come into the receive buffer.
    fn release(&mut self) {
        let Some(now) = self.clock.as_ref().map(VirtualClock::elapsed_ms) else {
            return;
        };
        while self.scheduled.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, bytes)) = self.scheduled.pop_front() {
                self.rx.extend(bytes);
            }
        }
    }
}

/// Fake module on the far end of a [`ByteStream`].
///
/// Each complete request line pops the next scripted reply for it; the last
/// reply repeats forever. Unknown requests get no answer.
#[derive(Clone, Default)]
pub struct ScriptedModule(Rc<RefCell<Script>>);

impl ScriptedModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// A module whose [`schedule`](Self::schedule)d bytes follow `clock`.
    pub fn with_clock(clock: VirtualClock) -> Self {
        let module = Self::default();
        module.0.borrow_mut().clock = Some(clock);
        module
    }

    /// Deliver `bytes` once the clock reaches `at_ms`. Bursts must be
    /// scheduled in time order.
    pub fn schedule(&self, at_ms: u64, bytes: &[u8]) -> &Self {
        self.0
            .borrow_mut()
            .scheduled
            .push_back((at_ms, bytes.to_vec()));
        self
    }

    /// Queue `reply` for the next `request` line.
    pub fn reply(&self, request: &str, reply: &[u8]) -> &Self {
        let mut script = self.0.borrow_mut();
        match script.replies.iter_mut().find(|(r, _)| r == request) {
            Some((_, queue)) => queue.push_back(reply.to_vec()),
            None => {
                let queue = VecDeque::from([reply.to_vec()]);
                script.replies.push((request.into(), queue));
            }
        }
        self
    }

    /// Bytes already sitting in the receive buffer.
    pub fn preload(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn set_overflow(&self) {
        self.0.borrow_mut().overflow = true;
    }

    /// Request lines written so far, without terminators.
    pub fn sent(&self) -> Vec<String> {
        self.0.borrow().sent.clone()
    }

    pub fn pending(&self) -> usize {
        self.0.borrow().rx.len()
    }
}

impl ByteStream for ScriptedModule {
    fn available(&self) -> usize {
        let mut script = self.0.borrow_mut();
        script.release();
        script.rx.len()
    }

    fn read(&mut self) -> Option<u8> {
        let mut script = self.0.borrow_mut();
        script.release();
        script.rx.pop_front()
    }

    fn peek(&self) -> Option<u8> {
        let mut script = self.0.borrow_mut();
        script.release();
        script.rx.front().copied()
    }

    fn write(&mut self, byte: u8) -> Result<(), StreamError> {
        let mut script = self.0.borrow_mut();
        script.partial.push(byte);
        if !script.partial.ends_with(b"\r\n") {
            return Ok(());
        }

        let raw = core::mem::take(&mut script.partial);
        let line = String::from_utf8_lossy(&raw[..raw.len() - 2]).into_owned();

        let reply = script
            .replies
            .iter_mut()
            .find(|(r, _)| *r == line)
            .and_then(|(_, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            });
        if let Some(reply) = reply {
            script.rx.extend(reply);
        }
        script.sent.push(line);
        Ok(())
    }

    fn flush(&mut self) {
        self.0.borrow_mut().rx.clear();
    }

    fn overflow(&mut self) -> bool {
        core::mem::take(&mut self.0.borrow_mut().overflow)
    }
}
