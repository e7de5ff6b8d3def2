//! Error types for table operations.
//!
//! Every error carries the identifiers needed to diagnose it (key, index,
//! offset, type tags) and a stable error code.

use crate::types::TypeTag;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for table operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TblError {
    // =========================================================================
    // Access Errors (E001-E099)
    // =========================================================================
    /// Array index is not below the array length.
    #[error("E001: Index {index} out of range for array of length {len}")]
    OutOfRange {
        /// The requested index.
        index: u64,
        /// The array length at the time of the access.
        len: u64,
    },

    /// A read requested a type the slot does not hold.
    #[error("E002: Type mismatch for key '{key}': stored {stored}, requested {requested}")]
    KeyTypeMismatch {
        /// The key that was read.
        key: String,
        /// The tag stored in the slot.
        stored: TypeTag,
        /// The tag the caller asked for.
        requested: TypeTag,
    },

    /// The key is not present in the map.
    #[error("E003: Key '{key}' not found")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// The key cannot be stored in a slot key buffer.
    #[error("E004: Invalid key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// The value cannot be assigned to a map slot.
    #[error("E005: Value of type {tag} cannot be stored under key '{key}'")]
    UnsupportedValue {
        /// The key being assigned.
        key: String,
        /// Tag of the rejected value.
        tag: TypeTag,
    },

    /// An integer division or remainder had a zero divisor.
    #[error("E006: Division by zero at array index {index}")]
    DivisionByZero {
        /// Array index of the zero divisor.
        index: u64,
    },

    // =========================================================================
    // Layout Errors (E100-E199)
    // =========================================================================
    /// Reallocating the block failed; the previous block is untouched.
    #[error("E101: Allocation of {requested} bytes failed: {cause}")]
    AllocationFailure {
        /// Total bytes requested for the new block.
        requested: u64,
        /// Reason reported by the allocator.
        cause: String,
    },

    /// A header field was assigned a value wider than its bit width.
    #[error("E102: Header field '{field}' cannot hold {value} ({bits} bits)")]
    FieldOverflow {
        /// The header field name.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// The field width in bits.
        bits: u32,
    },

    // =========================================================================
    // Image Errors (E200-E299)
    // =========================================================================
    /// Bytes do not form a valid table image.
    #[error("E201: Malformed table image at offset {offset}: {cause}")]
    MalformedImage {
        /// Byte offset (relative to the image start) where validation failed.
        offset: u64,
        /// Description of the problem.
        cause: String,
    },

    /// A child offset points outside the block that holds it.
    #[error("E202: Child reference at offset {offset} exceeds block of {size} bytes")]
    ChildOutOfBounds {
        /// The child offset stored in the slot.
        offset: u64,
        /// The size of the enclosing block.
        size: u64,
    },

    /// Flattening met a table that is already being flattened or nested too deep.
    #[error("E203: Cyclic or too deeply nested table reference at depth {depth}")]
    CyclicReference {
        /// Nesting depth at which the cycle was detected.
        depth: usize,
    },

    // =========================================================================
    // Internal Defects (E300-E399)
    // =========================================================================
    /// A full probe cycle ended without a match or an empty slot.
    #[error("E301: Probe exhausted {capacity} slots for key '{key}'")]
    ProbeExhaustion {
        /// The key being probed (empty for a reorder pass).
        key: String,
        /// The map capacity that was exhausted.
        capacity: u64,
    },

    // =========================================================================
    // Store Errors (E400-E499)
    // =========================================================================
    /// The blob store rejected an operation.
    #[error("E401: Blob store operation on '{key}' failed: {cause}")]
    Store {
        /// The blob key.
        key: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Filesystem I/O failed.
    #[error("E402: I/O error at {path}: {cause}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },
}

impl TblError {
    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "E001",
            Self::KeyTypeMismatch { .. } => "E002",
            Self::KeyNotFound { .. } => "E003",
            Self::InvalidKey { .. } => "E004",
            Self::UnsupportedValue { .. } => "E005",
            Self::DivisionByZero { .. } => "E006",
            Self::AllocationFailure { .. } => "E101",
            Self::FieldOverflow { .. } => "E102",
            Self::MalformedImage { .. } => "E201",
            Self::ChildOutOfBounds { .. } => "E202",
            Self::CyclicReference { .. } => "E203",
            Self::ProbeExhaustion { .. } => "E301",
            Self::Store { .. } => "E401",
            Self::Io { .. } => "E402",
        }
    }

    /// Check if this error indicates a broken internal invariant.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::ProbeExhaustion { .. })
    }

    /// Check if this error was caused by the arguments of the call.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::KeyTypeMismatch { .. }
                | Self::KeyNotFound { .. }
                | Self::InvalidKey { .. }
                | Self::UnsupportedValue { .. }
                | Self::DivisionByZero { .. }
                | Self::FieldOverflow { .. }
        )
    }

    /// Check if this error came from validating untrusted bytes.
    #[must_use]
    pub fn is_image_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedImage { .. } | Self::ChildOutOfBounds { .. }
        )
    }

    pub(crate) fn malformed(offset: usize, cause: impl Into<String>) -> Self {
        Self::MalformedImage {
            offset: offset as u64,
            cause: cause.into(),
        }
    }
}

/// Result type alias using `TblError`.
pub type Result<T> = std::result::Result<T, TblError>;
