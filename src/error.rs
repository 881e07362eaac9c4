// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Error Types
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias for
//! `std::result::Result<T, CodecError>`. No error is retried internally and a
//! failed operation never produces a partial artifact.
//!
//! ## Error Categories
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `Configuration` | a transcoding rule, layout or pairing setting is invalid |
//! | `AnchorNotFound` | an edit's anchor excerpt does not occur in the prior version |
//! | `EditConflict` | two edits of one batch touch the same content |
//! | `IndexCapacity` | an index cannot be expressed within the configured widths |
//! | `PairingExhausted` | no partner or filler produces a decodable sequence |
//! | `MalformedSequence` | a symbol sequence or segment does not parse |
//! | `Io` | reading or writing a file failed |
//! | `Model` | a persisted model could not be (de)serialized |

use std::fmt;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced by the codec, the index machinery and the diff engine.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A configuration value violates a structural rule.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The anchor (plus any content slated for removal) of edit `op` was not found.
    #[error("anchor of edit #{op} not found in the prior version")]
    AnchorNotFound {
        /// Position of the offending edit in the submitted batch.
        op: usize,
    },

    /// Two edits of one batch overlap in the prior content.
    #[error("edits #{first} and #{second} overlap")]
    EditConflict {
        /// Earlier edit (by position in the prior content).
        first: usize,
        /// Later edit.
        second: usize,
    },

    /// The index budget cannot express the requested layout.
    #[error("index capacity exceeded: {0}")]
    IndexCapacity(CapacityShortfall),

    /// The pairer could not produce a decodable sequence for a segment.
    #[error("pairing exhausted: {0}")]
    PairingExhausted(String),

    /// Input symbols or segments are structurally invalid.
    #[error("malformed sequence: {0}")]
    MalformedSequence(String),

    /// Underlying file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model persistence failure.
    #[error("model serialization error: {0}")]
    Model(#[from] serde_json::Error),
}

impl CodecError {
    /// Shorthand for a [`CodecError::Configuration`] error.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CodecError::Configuration(msg.into())
    }

    /// Shorthand for a [`CodecError::MalformedSequence`] error.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CodecError::MalformedSequence(msg.into())
    }
}

impl From<CapacityShortfall> for CodecError {
    fn from(shortfall: CapacityShortfall) -> Self {
        CodecError::IndexCapacity(shortfall)
    }
}

/// The specific way an index budget was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityShortfall {
    /// Even at the deepest permitted chain depth the gap between the
    /// neighbouring indices cannot hold the new segments.
    LevelLimit {
        /// Configured maximum number of chain levels.
        limit: usize,
        /// Number of index slots the edit required.
        needed: usize,
    },
    /// Extending the chain would leave no room for a framed payload.
    PayloadExhausted {
        /// Chain depth that was attempted.
        depth: usize,
        /// Payload width remaining at that depth.
        payload_width: usize,
    },
    /// An index has more chain levels than the layout permits.
    DepthExceeded {
        /// Chain depth of the index.
        depth: usize,
        /// Configured maximum number of chain levels.
        limit: usize,
    },
    /// An index value does not fit in its field.
    ValueOverflow {
        /// Value that was to be written.
        value: u128,
        /// Width of the field in bits.
        width: usize,
    },
}

impl fmt::Display for CapacityShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityShortfall::LevelLimit { limit, needed } => write!(
                f,
                "{} index slots needed but the gap stays too small at the {}-level limit",
                needed, limit
            ),
            CapacityShortfall::PayloadExhausted {
                depth,
                payload_width,
            } => write!(
                f,
                "chain depth {} leaves only {} payload bits",
                depth, payload_width
            ),
            CapacityShortfall::DepthExceeded { depth, limit } => {
                write!(f, "chain depth {} exceeds the limit of {} levels", depth, limit)
            }
            CapacityShortfall::ValueOverflow { value, width } => {
                write!(f, "value {} does not fit in a {}-bit field", value, width)
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
