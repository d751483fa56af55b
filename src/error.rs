// Audible Chapters - chapter metadata client for the Audible API
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Error types shared by every module of the crate
//!
//! # Failure classes
//! - **Configuration** - a required secret is missing or a region code is unknown.
//!   Surfaced immediately, never retried.
//! - **Authentication** - the token exchange was rejected or never reached the vendor.
//! - **Registration** - device registration was rejected or returned a malformed body.
//! - **Validation** - a chapter payload is missing a structural key. Always propagated.
//! - **Crypto** - key generation, key parsing or signing failed.
//!
//! Chapter *fetch* failures are deliberately absent from this enum: they are
//! absorbed by `ChapterClient::fetch_chapters` and reported as diagnostics.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, AudibleError>;

/// Name of the ADP token configuration value
pub const ADP_TOKEN_VAR: &str = "ADP_TOKEN";

/// Name of the device private key configuration value
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum AudibleError {
    /// One or more required configuration values are unset
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    /// Client settings that cannot be used (bad base URL, unbuildable transport)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Region code outside the supported marketplace set
    #[error("Unknown region code '{0}'")]
    UnknownRegion(String),

    /// Token exchange failed
    #[error("Authentication failed{}: {message}", format_status(.status))]
    Authentication {
        status: Option<u16>,
        message: String,
    },

    /// Device registration failed
    #[error("Device registration failed{}: {message}", format_status(.status))]
    Registration {
        status: Option<u16>,
        message: String,
    },

    /// Chapter payload does not have the expected structure
    #[error("Chapter payload for item {item_id} is missing required key '{key}'")]
    Validation {
        key: String,
        item_id: String,
    },

    /// Required key is present but its value cannot be interpreted
    #[error("Chapter payload for item {item_id} is malformed: {message}")]
    MalformedPayload {
        item_id: String,
        message: String,
    },

    /// Key generation, key parsing or signing failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl AudibleError {
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    pub fn authentication(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Authentication {
            status,
            message: message.into(),
        }
    }

    pub fn registration(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Registration {
            status,
            message: message.into(),
        }
    }

    pub fn validation(key: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            item_id: item_id.into(),
        }
    }

    /// Upstream HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Registration { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether this is a configuration problem (missing secret or unknown region)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConfiguration(_) | Self::Configuration(_) | Self::UnknownRegion(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_names_every_value() {
        let err = AudibleError::MissingConfiguration(vec![ADP_TOKEN_VAR, PRIVATE_KEY_VAR]);
        assert_eq!(
            err.to_string(),
            "Missing required configuration: ADP_TOKEN, PRIVATE_KEY"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_authentication_message_includes_status() {
        let err = AudibleError::authentication(Some(401), "invalid credentials");
        assert_eq!(
            err.to_string(),
            "Authentication failed (HTTP 401): invalid credentials"
        );
        assert_eq!(err.status(), Some(401));

        let err = AudibleError::authentication(None, "connection reset");
        assert_eq!(err.to_string(), "Authentication failed: connection reset");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_validation_names_key_and_item() {
        let err = AudibleError::validation("chapters", "B079LRSMNN");
        let message = err.to_string();
        assert!(message.contains("'chapters'"));
        assert!(message.contains("B079LRSMNN"));
        assert!(!err.is_configuration());
    }
}
