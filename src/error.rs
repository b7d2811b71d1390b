use std::error::Error;
use std::fmt;

pub type Result<T> = std::result::Result<T, MganError>;

#[derive(Debug, Clone, PartialEq)]
pub enum MganError {
    /// A model or task parameter is missing or out of range.
    Configuration { field: &'static str, reason: String },
    /// A step was requested without an argument it cannot run without.
    MissingArgument {
        step: &'static str,
        argument: &'static str,
    },
    /// The step cannot run in the mode the model was built for.
    UnsupportedStep {
        step: &'static str,
        mode: &'static str,
    },
    /// Batch tensors disagree on their shape.
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// A per-example length exceeds the padded sequence length.
    InvalidLength {
        index: usize,
        length: i64,
        seq_len: usize,
    },
    Checkpoint { path: String, reason: String },
}

impl MganError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        MganError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MganError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MganError::Configuration { field, reason } => {
                write!(formatter, "Invalid configuration for `{}`: {}", field, reason)
            }
            MganError::MissingArgument { step, argument } => {
                write!(formatter, "Step {} requires argument `{}`", step, argument)
            }
            MganError::UnsupportedStep { step, mode } => {
                write!(formatter, "Step {} is not available in {} mode", step, mode)
            }
            MganError::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(
                formatter,
                "Shape mismatch for {}: expected {:?}, got {:?}",
                what, expected, actual
            ),
            MganError::InvalidLength {
                index,
                length,
                seq_len,
            } => write!(
                formatter,
                "Length {} of example {} is outside 0..={}",
                length, index, seq_len
            ),
            MganError::Checkpoint { path, reason } => {
                write!(formatter, "Checkpoint {} failed: {}", path, reason)
            }
        }
    }
}

impl Error for MganError {}
