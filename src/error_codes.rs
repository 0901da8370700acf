use std::fmt;

use anyhow::Error;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidConstruction,
    InvalidArgument,
    SizeMismatch,
    TypeMismatch,
    EmptyDocument,
    DebugPath,
    /// File system or codec failure with no more specific code.
    Io,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConstruction => "INVALID_CONSTRUCTION",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SizeMismatch => "SIZE_MISMATCH",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::EmptyDocument => "EMPTY_DOCUMENT",
            Self::DebugPath => "DEBUG_PATH",
            Self::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one error kind raised by document operations. The code tells callers
/// which rule was broken; the message is meant for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedError {
    pub code: ErrorCode,
    pub message: String,
}

impl LedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_construction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConstruction, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn size_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SizeMismatch, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, message)
    }

    pub fn empty_document(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmptyDocument, message)
    }

    pub fn debug_path(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DebugPath, message)
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code,
                message: self.message.clone(),
            },
        }
    }
}

impl fmt::Display for LedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: ErrorCode,
    pub message: String,
}

pub fn find_led_error(error: &Error) -> Option<&LedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<LedError>())
}

/// Envelope for any failure. Errors without a [`LedError`] in their chain are
/// reported as [`ErrorCode::Io`] with the full context chain as the message.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    match find_led_error(error) {
        Some(led) => led.envelope(),
        None => LedError::new(ErrorCode::Io, format!("{error:#}")).envelope(),
    }
}
