//! The closed BiDi error-code enumeration and the protocol error envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of BiDi error codes. Deserialization of any other string
/// fails rather than silently mapping to a catch-all, so a new upstream
/// error code shows up as a parse failure instead of being swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrCode {
    #[serde(rename = "invalid argument")]
    InvalidArgument,
    #[serde(rename = "invalid selector")]
    InvalidSelector,
    #[serde(rename = "invalid session id")]
    InvalidSessionId,
    #[serde(rename = "move target out of bounds")]
    MoveTargetOutOfBounds,
    #[serde(rename = "no such alert")]
    NoSuchAlert,
    #[serde(rename = "no such element")]
    NoSuchElement,
    #[serde(rename = "no such frame")]
    NoSuchFrame,
    #[serde(rename = "no such handle")]
    NoSuchHandle,
    #[serde(rename = "no such intercept")]
    NoSuchIntercept,
    #[serde(rename = "no such node")]
    NoSuchNode,
    #[serde(rename = "no such request")]
    NoSuchRequest,
    #[serde(rename = "no such script")]
    NoSuchScript,
    #[serde(rename = "no such user context")]
    NoSuchUserContext,
    #[serde(rename = "session not created")]
    SessionNotCreated,
    #[serde(rename = "unable to capture screen")]
    UnableToCaptureScreen,
    #[serde(rename = "unable to close browser")]
    UnableToCloseBrowser,
    #[serde(rename = "unable to set cookie")]
    UnableToSetCookie,
    #[serde(rename = "unable to set file input")]
    UnableToSetFileInput,
    #[serde(rename = "underspecified storage partition")]
    UnderspecifiedStoragePartition,
    #[serde(rename = "unknown command")]
    UnknownCommand,
    #[serde(rename = "unknown error")]
    UnknownError,
    #[serde(rename = "unsupported operation")]
    UnsupportedOperation,
}

impl ErrCode {
    /// The exact wire string for this code, matching the closed enumeration
    /// in the BiDi error-response envelope.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ErrCode::InvalidArgument => "invalid argument",
            ErrCode::InvalidSelector => "invalid selector",
            ErrCode::InvalidSessionId => "invalid session id",
            ErrCode::MoveTargetOutOfBounds => "move target out of bounds",
            ErrCode::NoSuchAlert => "no such alert",
            ErrCode::NoSuchElement => "no such element",
            ErrCode::NoSuchFrame => "no such frame",
            ErrCode::NoSuchHandle => "no such handle",
            ErrCode::NoSuchIntercept => "no such intercept",
            ErrCode::NoSuchNode => "no such node",
            ErrCode::NoSuchRequest => "no such request",
            ErrCode::NoSuchScript => "no such script",
            ErrCode::NoSuchUserContext => "no such user context",
            ErrCode::SessionNotCreated => "session not created",
            ErrCode::UnableToCaptureScreen => "unable to capture screen",
            ErrCode::UnableToCloseBrowser => "unable to close browser",
            ErrCode::UnableToSetCookie => "unable to set cookie",
            ErrCode::UnableToSetFileInput => "unable to set file input",
            ErrCode::UnderspecifiedStoragePartition => "underspecified storage partition",
            ErrCode::UnknownCommand => "unknown command",
            ErrCode::UnknownError => "unknown error",
            ErrCode::UnsupportedOperation => "unsupported operation",
        }
    }
}

impl std::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// A structured protocol-level error as carried by an `ErrorResponse` frame.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    pub code: ErrCode,
    pub message: String,
    pub stacktrace: Option<String>,
}

impl ProtocolError {
    pub fn new(code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stacktrace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_round_trip_through_serde() {
        for code in [
            ErrCode::InvalidArgument,
            ErrCode::NoSuchFrame,
            ErrCode::UnknownCommand,
            ErrCode::UnsupportedOperation,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            let parsed: ErrCode = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, code);
            assert_eq!(json.trim_matches('"'), code.as_wire_str());
        }
    }

    #[test]
    fn unknown_wire_string_fails_to_parse() {
        let result: Result<ErrCode, _> = serde_json::from_str("\"not a real code\"");
        assert!(result.is_err());
    }
}
