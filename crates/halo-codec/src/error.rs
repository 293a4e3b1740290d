//! Error types for the canonical codec.

use serde::{Deserialize, Serialize};

/// Errors from canonical encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecError {
    /// A number in the input was NaN or infinite
    NonFiniteNumber,
    /// A projection was asked to run over a non-object value
    ExpectedObject,
}
