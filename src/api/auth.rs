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


//! Password-grant token exchange
//!
//! # API Endpoint
//! `POST {auth_base}/auth/token`
//!
//! Form body:
//! ```text
//! auth_country=US
//! client_id=<CLIENT_ID>
//! grant_type=password
//! username=<email>
//! password=<password>
//! scope=all:device
//! ```
//!
//! Response:
//! ```json
//! { "access_token": "Atna|...", "refresh_token": "Atnr|...", "expires_in": 3600 }
//! ```
//!
//! The session is short-lived and only used to register a device. Nothing here
//! is written to disk.

use crate::api::client::{endpoint, ClientConfig, HttpRequest, HttpTransport};
use crate::api::region::Region;
use crate::error::{AudibleError, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;

/// Client identifier sent on token exchange
pub const CLIENT_ID: &str = "amzn1.application-oa2-client.audible.ios";

/// Scope requested for device registration
pub const SCOPE: &str = "all:device";

/// One-time login input
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub region: Region,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>, region: Region) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            region,
        }
    }

    /// Build credentials from a region code
    ///
    /// # Errors
    /// `UnknownRegion` if the code is not in the catalog
    pub fn with_region_code(
        email: impl Into<String>,
        password: impl Into<String>,
        region_code: &str,
    ) -> Result<Self> {
        Ok(Self::new(email, password, Region::from_code(region_code)?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask(&self.email))
            .field("password", &"<redacted>")
            .field("region", &self.region.code)
            .finish()
    }
}

/// Short-lived vendor session
#[derive(Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,

    /// Seconds until the access token expires
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    pub expires_in: u64,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// The token endpoint has been seen returning expires_in both as a number and a string.
fn seconds_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Keep the first four characters, hide the rest
pub(crate) fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}***", visible)
}

/// Exchanges credentials for a session
pub struct DeviceAuthenticator {
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,
}

impl DeviceAuthenticator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Exchange email/password for session tokens
    ///
    /// Single attempt. Success is exactly HTTP 200 with a parseable body.
    ///
    /// # Errors
    /// `Authentication` for any non-200 status (status attached), an
    /// unparseable body, or a network failure (no status)
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<SessionTokens> {
        let region = &credentials.region;
        let url = endpoint(&self.config.auth_base(region)?, "/auth/token");

        let request = HttpRequest::post(url)
            .header("User-Agent", self.config.user_agent.as_str())
            .header("Accept", "application/json")
            .form(&[
                ("auth_country", region.auth_country),
                ("client_id", CLIENT_ID),
                ("grant_type", "password"),
                ("username", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("scope", SCOPE),
            ]);

        tracing::debug!(region = %region, "Requesting session token");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AudibleError::authentication(None, e.to_string()))?;

        if !response.is_ok() {
            tracing::info!(region = %region, status = response.status, "Token exchange rejected");
            return Err(AudibleError::authentication(
                Some(response.status),
                format!("token endpoint returned HTTP {}", response.status),
            ));
        }

        serde_json::from_slice::<SessionTokens>(&response.body).map_err(|e| {
            AudibleError::authentication(
                Some(response.status),
                format!("unreadable token response: {}", e),
            )
        })
    }
}
