use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduling::SlotStatus;

/// Error taxonomy of the scheduling core. Nothing here is retried internally;
/// retries, if any, belong to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
pub enum SchedulingError {
    /// Malformed input: bad time format, end before start, inactive provider.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Overlapping window, or a booking race lost. The caller may retry with
    /// different parameters.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Window, slot, or provider id unknown.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid slot status transition.
    #[error("Invalid slot status transition from {from} to {to}")]
    State { from: SlotStatus, to: SlotStatus },

    /// Failure reported by the storage collaborator.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub fn validation(message: impl Into<String>) -> Self {
        SchedulingError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SchedulingError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        SchedulingError::NotFound(message.into())
    }
}
