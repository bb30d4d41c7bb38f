//! Error types for duplexcheck
//!
//! Two families live here:
//!
//! - [`TesterError`] is returned directly to the caller of a tester method
//!   (misconfiguration, or a delivery that arrived after the run stopped).
//! - [`Violation`] describes why a running script failed. It is never
//!   returned from `deliver`; its message is handed to the handler's `fail`
//!   callback and the value itself ends up in the run's `Verdict`.

use serde::Serialize;
use thiserror::Error;

/// Error returned synchronously by [`Tester`](crate::Tester) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TesterError {
    /// `set_handler` was called a second time
    #[error("Configuration error: handler already set")]
    HandlerAlreadySet,

    /// `run` was called without a handler
    #[error("Configuration error: no handler set")]
    HandlerMissing,

    /// The tester has already been run, so it can no longer be configured or run
    #[error("Configuration error: already run, can't {0}")]
    NotPreparing(&'static str),

    /// Output was delivered after the run had already stopped
    #[error("Already stopped testing, late delivery of output: {0}")]
    LateDelivery(String),
}

impl TesterError {
    /// Whether this is one of the configuration errors (as opposed to a late delivery)
    pub fn is_configuration(&self) -> bool {
        !matches!(self, TesterError::LateDelivery(_))
    }
}

/// Result type alias using TesterError
pub type TesterResult<T> = Result<T, TesterError>;

/// A scripted expectation that the stream under test broke
///
/// The `Display` output is the exact message passed to
/// [`StreamHandler::fail`](crate::StreamHandler::fail).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Output arrived while the script was about to write (or had finished)
    #[error("Received unexpected output from stream, was going to input: {expected_input} after delay, but instead received output: {received}")]
    UnexpectedOutput {
        expected_input: String,
        received: String,
    },

    /// Output did not equal the literal the script expected
    #[error("Received incorrect output from stream, was expecting: {expected} but instead received: {received}")]
    IncorrectOutput { expected: String, received: String },

    /// Output was rejected by the script's validator
    #[error("Received incorrect output from stream, check handled by: {validator} but received: {received}")]
    ValidatorRejected { validator: String, received: String },
}

impl Violation {
    /// Output arrived out of order (the stream spoke when it should have listened)
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Violation::UnexpectedOutput { .. })
    }

    /// Output arrived in order but had the wrong value
    pub fn is_assertion_failure(&self) -> bool {
        !self.is_protocol_violation()
    }

    /// The received output, as rendered in the failure message
    pub fn received(&self) -> &str {
        match self {
            Violation::UnexpectedOutput { received, .. }
            | Violation::IncorrectOutput { received, .. }
            | Violation::ValidatorRejected { received, .. } => received,
        }
    }
}
