//! Request Generations
//!
//! A monotonic counter per logical operation. Starting a new operation bumps
//! the generation; a response is applied only if its ticket is still current.
//!
//! [`InFlight`] is the companion single-flight guard: at most one holder per
//! flag, released on drop (including when the holding future is cancelled).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Monotonic generation counter
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

/// Snapshot of a generation taken when a request started
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

impl Generation {
    /// Create a counter at generation zero
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Invalidate every outstanding ticket and return a fresh one
    pub fn advance(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Ticket for the current generation (does not invalidate anything)
    pub fn current(&self) -> Ticket {
        Ticket(self.0.load(Ordering::SeqCst))
    }

    /// Whether a ticket still belongs to the current generation
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.0
    }
}

impl Ticket {
    /// Raw generation number (for logging)
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Single-flight guard over an `AtomicBool`
#[derive(Debug)]
pub struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// Take the flag, or `None` if someone else holds it
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
