//! Fatal simulation errors.

use std::error::Error;
use std::fmt;

use crate::component::Id;

/// An unrecoverable state violation detected inside an event handler.
///
/// Fatal errors indicate a bookkeeping bug (a lost job, a broken state machine),
/// not a modeled failure. They are surfaced through the stepping methods of
/// [`Simulation`](crate::Simulation) so the run loop halts with full diagnostic
/// context instead of continuing after corruption.
#[derive(Debug, Clone, PartialEq)]
pub struct FatalError {
    /// Simulation time at which the violation was detected.
    pub time: f64,
    /// Component that detected the violation.
    pub component: Id,
    /// Human-readable diagnostic, including expected vs. actual state.
    pub message: String,
}

impl FatalError {
    /// Creates a new fatal error.
    pub fn new(time: f64, component: Id, message: impl Into<String>) -> Self {
        Self {
            time,
            component,
            message: message.into(),
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fatal error at t={:.3} in component {}: {}",
            self.time, self.component, self.message
        )
    }
}

impl Error for FatalError {}
