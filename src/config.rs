//! Secrets consumed by the chapter client
//!
//! Two values are required for every `ChapterClient`:
//! - `ADP_TOKEN` - issued by device registration
//! - `PRIVATE_KEY` - the device private key, PEM with newlines written as `\n`
//!
//! Loading them (env files, secret stores, CLI flags) belongs to the caller.
//! This module only names them, validates them eagerly, and renders the
//! block a user pastes into their environment after registering.

use crate::error::{AudibleError, Result, ADP_TOKEN_VAR, PRIVATE_KEY_VAR};
use std::fmt;

/// Raw configuration values, possibly unset
#[derive(Clone, Default)]
pub struct ChapterSecrets {
    pub adp_token: Option<String>,
    pub private_key: Option<String>,
}

impl ChapterSecrets {
    pub fn new(adp_token: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            adp_token: Some(adp_token.into()),
            private_key: Some(private_key.into()),
        }
    }

    /// Read `ADP_TOKEN` and `PRIVATE_KEY` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read both values through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            adp_token: lookup(ADP_TOKEN_VAR),
            private_key: lookup(PRIVATE_KEY_VAR),
        }
    }

    /// Check both values are present and non-blank
    ///
    /// # Errors
    /// `MissingConfiguration` listing every missing value, in declaration order
    pub fn validate(&self) -> Result<(&str, &str)> {
        let adp_token = non_blank(&self.adp_token);
        let private_key = non_blank(&self.private_key);

        match (adp_token, private_key) {
            (Some(token), Some(key)) => Ok((token, key)),
            _ => {
                let mut missing = Vec::new();
                if adp_token.is_none() {
                    missing.push(ADP_TOKEN_VAR);
                }
                if private_key.is_none() {
                    missing.push(PRIVATE_KEY_VAR);
                }
                Err(AudibleError::MissingConfiguration(missing))
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ChapterSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChapterSecrets")
            .field("adp_token", &self.adp_token.as_ref().map(|_| "<set>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Long-lived secret pair produced by device registration
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredentials {
    pub adp_token: String,

    /// PEM with real newlines
    pub private_key_pem: String,
}

impl DeviceCredentials {
    /// Render the configuration block
    ///
    /// ```text
    /// ADP_TOKEN=<token>
    /// PRIVATE_KEY=<escaped-pem>
    /// ```
    pub fn to_env_block(&self) -> String {
        format!(
            "{}={}\n{}={}\n",
            ADP_TOKEN_VAR,
            self.adp_token,
            PRIVATE_KEY_VAR,
            escape_pem(&self.private_key_pem)
        )
    }

    pub fn to_secrets(&self) -> ChapterSecrets {
        ChapterSecrets::new(self.adp_token.clone(), escape_pem(&self.private_key_pem))
    }
}

impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("adp_token", &"<redacted>")
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Fold a multi-line PEM into one line using literal `\n`
pub fn escape_pem(pem: &str) -> String {
    pem.trim_end().replace("\r\n", "\n").replace('\n', "\\n")
}

/// Undo [`escape_pem`]; text without escapes is returned unchanged
pub fn unescape_pem(value: &str) -> String {
    value.replace("\\n", "\n")
}
