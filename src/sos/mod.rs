//! SOS emergency alerts over a transactional SMS provider.

pub mod dispatch;
pub mod twilio;

pub use dispatch::*;
pub use twilio::*;

use thiserror::Error;

use crate::flows::BoxError;

/// Failure sending one SMS. Collected per recipient, never propagated out
/// of a dispatch.
#[derive(Error, Debug)]
pub enum SmsError {
    #[error("SMS provider at {endpoint} could not be reached")]
    Transport {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("SMS provider rejected the message (HTTP {status}): {message}")]
    Rejected {
        status: u16,
        /// Provider-specific error code, when the body carried one.
        code: Option<i64>,
        message: String,
    },

    #[error("'{0}' is not an E.164 phone number")]
    InvalidNumber(String),

    #[error("SMS provider response could not be parsed: {0}")]
    ResponseParsing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_names_status() {
        let err = SmsError::Rejected {
            status: 400,
            code: Some(21211),
            message: "Invalid 'To' Phone Number".into(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("Invalid 'To' Phone Number"));
    }
}
