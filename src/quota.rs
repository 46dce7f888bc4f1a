//! Daily quota ledger gating every remote call.
//!
//! The YouTube Data API accounts every request in quota units against a
//! daily budget. The ledger tracks units consumed so far and refuses new
//! reservations once `budget - buffer` would be exceeded. Refusal is a
//! control signal, not an error: callers stop gracefully and checkpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default daily quota budget in units (the API's standard project quota)
pub const DEFAULT_DAILY_QUOTA: u64 = 10_000;

/// Default safety buffer in units.
/// Kept aside so a run never lands exactly on the provider's hard limit.
pub const DEFAULT_QUOTA_BUFFER: u64 = 500;

/// Returned when a reservation would cross the budget-minus-buffer line.
///
/// Carries enough context for the caller to log and report; the ledger's
/// consumed counter is untouched when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("quota exhausted: requested {requested} units with {available} available ({consumed}/{budget} consumed, buffer {buffer})")]
pub struct QuotaExhausted {
    /// Units the caller asked for
    pub requested: u64,
    /// Units still available below the buffer line
    pub available: u64,
    /// Units consumed so far today
    pub consumed: u64,
    /// Daily budget
    pub budget: u64,
    /// Safety buffer
    pub buffer: u64,
}

/// Tracks quota units consumed against a daily budget and safety buffer.
///
/// Consumed-today is supplied externally when resuming (from the checkpoint
/// or the previous run record), never derived from wall-clock inside the
/// ledger, which keeps it trivially testable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLedger {
    daily_budget: u64,
    buffer: u64,
    consumed: u64,
}

impl QuotaLedger {
    /// Create a ledger with nothing consumed yet
    pub fn new(daily_budget: u64, buffer: u64) -> Self {
        Self {
            daily_budget,
            buffer,
            consumed: 0,
        }
    }

    /// Create a ledger resuming from an externally supplied consumed value
    pub fn with_consumed(daily_budget: u64, buffer: u64, consumed: u64) -> Self {
        Self {
            daily_budget,
            buffer,
            consumed,
        }
    }

    /// The usable ceiling: budget minus safety buffer
    fn ceiling(&self) -> u64 {
        self.daily_budget.saturating_sub(self.buffer)
    }

    /// Reserve `units` for an imminent remote call.
    ///
    /// On success the consumed counter is incremented atomically with the
    /// check. On refusal nothing is mutated and the caller must not make
    /// the call.
    pub fn reserve(&mut self, units: u64) -> Result<(), QuotaExhausted> {
        let ceiling = self.ceiling();
        if self.consumed.saturating_add(units) > ceiling {
            return Err(QuotaExhausted {
                requested: units,
                available: ceiling.saturating_sub(self.consumed),
                consumed: self.consumed,
                budget: self.daily_budget,
                buffer: self.buffer,
            });
        }
        self.consumed += units;
        debug!(
            units = units,
            consumed = self.consumed,
            remaining = self.remaining(),
            "Reserved quota units"
        );
        Ok(())
    }

    /// Units still reservable below the buffer line
    pub fn remaining(&self) -> u64 {
        self.ceiling().saturating_sub(self.consumed)
    }

    /// Units consumed so far today
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Daily budget
    pub fn daily_budget(&self) -> u64 {
        self.daily_budget
    }

    /// Safety buffer
    pub fn buffer(&self) -> u64 {
        self.buffer
    }

    /// Overwrite the consumed counter from an external reporting source
    /// (e.g. a loaded checkpoint)
    pub fn set_consumed(&mut self, consumed: u64) {
        self.consumed = consumed;
    }
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_QUOTA, DEFAULT_QUOTA_BUFFER)
    }
}
