// ABOUTME: Non-fatal problems seen while tearing a chain down.
// ABOUTME: A failed disconnect is reported here instead of replacing the caller's result.

use crate::types::HopId;
use std::fmt;

/// Warnings gathered during cascade close or rollback, innermost hop first.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Log through tracing and keep the warning for the caller.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings raised for the hop at a 1-based index.
    pub fn for_hop(&self, index: usize) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.hop.index() == index)
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub hop: HopId,
    pub message: String,
}

impl Warning {
    /// A session of a completed chain did not disconnect cleanly.
    pub fn disconnect(hop: HopId, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Disconnect,
            hop,
            message: message.into(),
        }
    }

    /// A session opened by a failed chain build did not disconnect cleanly.
    pub fn rollback(hop: HopId, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Rollback,
            hop,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.kind {
            WarningKind::Disconnect => "close",
            WarningKind::Rollback => "rollback",
        };
        write!(f, "{} during {}: {}", self.hop, phase, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Cascade close of a finished chain.
    Disconnect,
    /// Unwinding a chain that failed part way.
    Rollback,
}
