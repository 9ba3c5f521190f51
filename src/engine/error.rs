// SPDX-License-Identifier: Apache-2.0

//! Error types for connection-string extraction
//!
//! Absent fields are never errors; these variants only cover input that
//! cannot be turned into a configuration at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised while parsing a connection-string URI
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum UriError {
    #[error("Invalid URI: {message}")]
    InvalidUri { message: String },

    #[error("Invalid {component} encoding: {message}")]
    InvalidEncoding { component: String, message: String },

    #[error("Password segment has {separators} ':' separators, expected at most one before the account")]
    AmbiguousAccount { separators: usize },

    #[error("Host '{host}' carries port {port}; ports are not supported")]
    PortNotSupported { host: String, port: u16 },

    #[error("Invalid host '{host}': {message}")]
    InvalidHost { host: String, message: String },
}

/// Stable error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UriErrorCode {
    InvalidUri,
    InvalidEncoding,
    AmbiguousAccount,
    PortNotSupported,
    InvalidHost,
}

impl UriError {
    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Self::InvalidUri { message: msg.into() }
    }

    pub fn invalid_encoding(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            component: component.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_host(host: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidHost {
            host: host.into(),
            message: msg.into(),
        }
    }

    pub fn code(&self) -> UriErrorCode {
        match self {
            Self::InvalidUri { .. } => UriErrorCode::InvalidUri,
            Self::InvalidEncoding { .. } => UriErrorCode::InvalidEncoding,
            Self::AmbiguousAccount { .. } => UriErrorCode::AmbiguousAccount,
            Self::PortNotSupported { .. } => UriErrorCode::PortNotSupported,
            Self::InvalidHost { .. } => UriErrorCode::InvalidHost,
        }
    }
}

impl From<url::ParseError> for UriError {
    fn from(err: url::ParseError) -> Self {
        UriError::invalid_uri(err.to_string())
    }
}

/// Result type alias for extraction operations
pub type UriResult<T> = Result<T, UriError>;
