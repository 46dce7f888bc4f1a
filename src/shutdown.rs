//! Cooperative halt for in-flight collection runs.
//!
//! An interrupt must never abort mid-write. The Ctrl+C handler flips a
//! shared flag; collection loops poll it between units of work, save a
//! checkpoint naming the next unfetched page, and only then return with
//! an interrupted run status.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Shared handle to a halt flag
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Halt flag polled at safe boundaries.
///
/// A halt request is advisory: work in flight finishes its current page,
/// checkpoints its position, and returns on its own terms. Nothing is
/// cancelled mid-call.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    halt: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            halt: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// New coordinator behind an [`Arc`], ready to hand to the signal task
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Ask the run to stop at its next safe boundary.
    /// Idempotent; waiters are woken once.
    pub fn request_halt(&self) {
        if !self.halt.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether a halt has been requested.
    ///
    /// Polled between sources and between pages. A caller that observes
    /// `true` checkpoints the next unit of work before returning, so the
    /// following run resumes where this one stopped.
    pub fn halt_requested(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    /// Wait until a halt is requested. Returns immediately if one
    /// already was.
    pub async fn halted(&self) {
        let mut notified = pin!(self.notify.notified());
        // Register before checking the flag so a request landing in
        // between cannot be missed
        notified.as_mut().enable();
        if self.halt_requested() {
            return;
        }
        notified.await;
    }
}
