//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP surface and
//! the gate/artifact/download modules, along with the HTTP status mapper.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Gate { code: String, message: String },
    Encoding { code: String, message: String },
    Environment { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Gate { code, .. }
            | AppError::Encoding { code, .. }
            | AppError::Environment { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Gate { message, .. }
            | AppError::Encoding { message, .. }
            | AppError::Environment { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn gate<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Gate { code: code.into(), message: msg.into() } }
    pub fn encoding<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Encoding { code: code.into(), message: msg.into() } }
    pub fn environment<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Environment { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Gate { .. } => 503,
            AppError::Encoding { .. } => 422,
            AppError::Environment { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<crate::artifact::EncodeError> for AppError {
    fn from(err: crate::artifact::EncodeError) -> Self {
        match err {
            crate::artifact::EncodeError::PayloadTooLong => {
                AppError::encoding("payload_too_long", "payload exceeds the maximum symbol capacity")
            }
            other => AppError::encoding("encode_failed", other.to_string()),
        }
    }
}

impl From<crate::download::SurfaceError> for AppError {
    fn from(err: crate::download::SurfaceError) -> Self {
        match err {
            crate::download::SurfaceError::Unavailable => {
                AppError::environment("no_surface", "no document surface is available")
            }
            other => AppError::environment("activation_failed", other.to_string()),
        }
    }
}
