//! # Error values returned to clients.
//!
//! Failures are first-class values carried back over the request's reply
//! channel, never panics. Two types:
//!
//! - [`ErrorCode`] classifies the failure for the client.
//! - [`RequestError`] pairs a code with human-readable text.
//!
//! Every failure is recovered at the RPC boundary and answered as
//! `{ returnValue: false, errorCode, errorText }`. No failure propagates
//! across app instances. A kill-timer expiry is **not** an error; it is a
//! scheduled action.

use thiserror::Error;

/// Classification of request failures.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Duplicate registration, missing catalog entry, duplicate instance id.
    General,
    /// Request missing both `appId` and `launchPointId`.
    InvalidParam,
    /// Launcher refused, or a registration-channel send failed.
    Launch,
}

impl ErrorCode {
    /// Returns the numeric code stamped into error replies.
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::General => 1,
            ErrorCode::InvalidParam => 2,
            ErrorCode::Launch => 3,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorCode::General => "err_general",
            ErrorCode::InvalidParam => "err_invalid_param",
            ErrorCode::Launch => "err_launch",
        }
    }
}

/// A failed request: code plus client-facing text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{text} ({})", .code.as_label())]
pub struct RequestError {
    /// Failure classification.
    pub code: ErrorCode,
    /// Human-readable error text returned to the client.
    pub text: String,
}

impl RequestError {
    /// Creates a new request error.
    pub fn new(code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// A `General` error.
    pub fn general(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::General, text)
    }

    /// An `InvalidParam` error.
    pub fn invalid_param(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParam, text)
    }

    /// A `Launch` error.
    pub fn launch(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Launch, text)
    }
}
