//! Error types for the context-tree weighting crates.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers probing "what if" sequences
//!
//! The only error a well-formed model run can produce is
//! [`Error::ImpossibleHistory`]: a deterministic estimator encodes a hard
//! belief that data may falsify. The model is left exactly as it was before
//! the offending bit, so callers may keep going with a different bit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ctw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model state transitions (impossible data, invalid undo).
    Model,
    /// Malformed bits, bit strings or history shapes at the boundary.
    Input,
    /// Configuration loading and validation.
    Config,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the ctw crates.
#[derive(Error, Debug)]
pub enum Error {
    // Model errors (10-19)
    #[error("impossible history: generated bit at position {position} has zero probability")]
    ImpossibleHistory { position: usize },

    #[error("nothing to undo: requested {requested} bit(s), {available} available since the last history switch")]
    NothingToUndo { requested: usize, available: usize },

    #[error("undo mismatch: {0}")]
    UndoMismatch(String),

    // Input errors (20-29)
    #[error("invalid bit {value:?} at position {position}: expected 0 or 1")]
    InvalidBit { value: String, position: usize },

    #[error("bit string length {len} is not a multiple of 8")]
    BitLength { len: usize },

    #[error("history length {len} is not a whole number of {step}-bit steps")]
    HistoryShape { len: usize, step: usize },

    #[error("variable offset {index} does not point into the past")]
    VarOffset { index: isize },

    // Configuration errors (30-39)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Model errors
    /// - 20-29: Input errors
    /// - 30-39: Configuration errors
    /// - 40-49: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::ImpossibleHistory { .. } => 10,
            Error::NothingToUndo { .. } => 11,
            Error::UndoMismatch(_) => 12,
            Error::InvalidBit { .. } => 20,
            Error::BitLength { .. } => 21,
            Error::HistoryShape { .. } => 22,
            Error::VarOffset { .. } => 23,
            Error::Config(_) => 30,
            Error::Io(_) => 40,
            Error::Json(_) => 41,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ImpossibleHistory { .. } | Error::NothingToUndo { .. } | Error::UndoMismatch(_) => {
                ErrorCategory::Model
            }
            Error::InvalidBit { .. }
            | Error::BitLength { .. }
            | Error::HistoryShape { .. }
            | Error::VarOffset { .. } => ErrorCategory::Input,
            Error::Config(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether the model is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The model rolled the bit back; try the other value or undo further.
            Error::ImpossibleHistory { .. } => true,
            Error::NothingToUndo { .. } => false,
            Error::UndoMismatch(_) => true,

            // Input has to be fixed by the caller.
            Error::InvalidBit { .. } => false,
            Error::BitLength { .. } => false,
            Error::HistoryShape { .. } => false,
            Error::VarOffset { .. } => false,

            Error::Config(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::ImpossibleHistory { .. } => {
                "The deterministic estimator cannot explain this data. Undo the bit or use the KT estimator."
            }
            Error::NothingToUndo { .. } => {
                "Undo only reaches back to the last history switch."
            }
            Error::UndoMismatch(_) => {
                "Undo added and generated bits in the reverse order they were observed."
            }
            Error::InvalidBit { .. } => "Bit strings may only contain the characters 0 and 1.",
            Error::BitLength { .. } => "Pad the bit string to a whole number of bytes.",
            Error::HistoryShape { .. } => {
                "The history must consist of whole steps of generated bits followed by added bits."
            }
            Error::VarOffset { .. } => "Selected variables use offsets of -1 (the previous bit) or less.",
            Error::Config(_) => "Check the model configuration file and command-line flags.",
            Error::Io(_) => "Check that the input path exists and is readable.",
            Error::Json(_) => "A value could not be encoded as or decoded from JSON.",
        }
    }
}
