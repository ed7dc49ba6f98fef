//! Error kinds raised by input validation.
//!
//! Public operations return `anyhow::Result`; validation failures are carried as a
//! [`ProportionError`] inside the `anyhow::Error` so callers can recover the kind with
//! `downcast_ref::<ProportionError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProportionError {
    #[error("'{0}' not found in observation columns")]
    MissingColumn(String),

    #[error("Comparison group list must not be empty")]
    EmptyGroupList,

    #[error("Comparison group '{0}' is the reference group")]
    SelfComparison(String),

    #[error("Group label '{0}' not found in the data")]
    UnknownGroupLabel(String),

    #[error("Group '{0}' has no observations")]
    DegenerateGroup(String),

    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Empty data: {0}")]
    EmptyData(String),
}
