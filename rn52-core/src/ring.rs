//! Receive ring buffer shared between the edge interrupt and the mainline.
//!
//! Single producer (the receive routine, in interrupt context) and single
//! consumer (the caller). The producer only ever stores `tail`, the consumer
//! only ever stores `head`; both are single-word atomics, so neither side
//! needs a lock. One slot stays empty to tell "full" from "empty", which
//! leaves `N - 1` usable bytes.

use core::cell::UnsafeCell;

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

/// Default receive buffer size.
pub const RX_BUFFER_SIZE: usize = 64;

/// Fixed-capacity circular byte buffer with a sticky overflow flag.
pub struct RxRing<const N: usize = RX_BUFFER_SIZE> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    overflow: AtomicBool,
}

// SAFETY: a slot is written by the producer only while it sits outside
// `head..tail`, and read by the consumer only once `tail` has been published
// past it. The index protocol hands each slot to exactly one side at a time.
unsafe impl<const N: usize> Sync for RxRing<N> {}

impl<const N: usize> RxRing<N> {
    const CAPACITY_CHECK: () = assert!(N >= 2, "ring buffer needs at least 2 slots");

    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
        }
    }

    /// Bytes that can be held at once.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Store a byte. Producer side only.
    ///
    /// On a full buffer the byte is dropped, the overflow flag is raised and
    /// the byte is handed back; unread data is never overwritten.
    #[inline]
    pub fn push(&self, byte: u8) -> Result<(), u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % N;
        if next == self.head.load(Ordering::Acquire) {
            self.overflow.store(true, Ordering::Relaxed);
            return Err(byte);
        }
        // SAFETY: `tail` is outside the consumer's readable range until the
        // store below publishes it.
        unsafe { (*self.buf.get())[tail] = byte };
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Take the oldest byte. Consumer side only.
    #[inline]
    pub fn pop(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `head != tail`, so the producer has published this slot and
        // will not touch it until `head` moves past it.
        let byte = unsafe { (*self.buf.get())[head] };
        self.head.store((head + 1) % N, Ordering::Release);
        Some(byte)
    }

    /// Look at the oldest byte without taking it. Consumer side only.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: see `pop`.
        Some(unsafe { (*self.buf.get())[head] })
    }

    /// Bytes waiting to be read: `(tail - head) mod N`.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (tail + N - head) % N
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return and clear the overflow flag.
    #[inline]
    pub fn take_overflow(&self) -> bool {
        self.overflow.swap(false, Ordering::Relaxed)
    }

    /// Empty the buffer.
    ///
    /// Touches both indices, so the producer must be quiesced: call it inside
    /// a critical section or with the edge trigger disabled.
    pub fn reset(&self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Release);
    }

    /// Empty the buffer and clear the overflow flag. Same rules as [`reset`](Self::reset).
    pub fn clear(&self) {
        self.reset();
        self.overflow.store(false, Ordering::Relaxed);
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
