use thiserror::Error;

use crate::retry::RetryError;
use crate::value::Value;

/// Re-read state still differs from the tracked snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("mismatch on attribute {attribute}:\nexpected value: {expected}\nactual value:   {actual}")]
pub struct MismatchError {
    pub attribute: String,
    pub expected: Value,
    pub actual: Value,
}

impl From<MismatchError> for RetryError {
    fn from(err: MismatchError) -> Self {
        RetryError::retryable(err)
    }
}
