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


//! Signed request headers for the content API
//!
//! Content endpoints do not accept bearer tokens. Instead each request carries
//! the device's ADP token plus an RSA signature over the request, proving
//! possession of the private key registered with that token.
//!
//! # ADP signing layout
//! ```text
//! canonical = METHOD \n PATH?QUERY \n TIMESTAMP \n BODY \n ADP_TOKEN
//! signature = base64(RSASSA-PKCS1-v1_5(SHA-256, canonical))
//!
//! x-adp-token:     ADP_TOKEN
//! x-adp-alg:       SHA256withRSA:1.0
//! x-adp-signature: SIGNATURE:TIMESTAMP
//! ```
//! TIMESTAMP is UTC with microsecond precision, e.g. `2024-01-15T12:30:45.123456Z`.
//!
//! The layout is a vendor contract. It lives behind [`SigningScheme`] and is
//! pinned by a fixture produced with an independent RSA implementation
//! (`test_fixtures/signature_b079lrsmnn.txt`).

use crate::api::client::{HttpMethod, HttpRequest};
use crate::error::{AudibleError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const ADP_TOKEN_HEADER: &str = "x-adp-token";
pub const ADP_ALG_HEADER: &str = "x-adp-alg";
pub const ADP_SIGNATURE_HEADER: &str = "x-adp-signature";
pub const ADP_ALGORITHM: &str = "SHA256withRSA:1.0";

/// The parts of a request covered by the signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub method: HttpMethod,

    /// Path including the query string, e.g. `/1.0/content/X/metadata?quality=High`
    pub path: String,

    pub body: Vec<u8>,
}

impl RequestMetadata {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body,
        }
    }
}

/// Headers proving possession of the device key
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub adp_token: String,
    pub algorithm: String,

    /// `{base64 signature}:{timestamp}`
    pub signature: String,
}

impl SignatureHeaders {
    pub fn to_headers(&self) -> Vec<(String, String)> {
        vec![
            (ADP_TOKEN_HEADER.to_string(), self.adp_token.clone()),
            (ADP_ALG_HEADER.to_string(), self.algorithm.clone()),
            (ADP_SIGNATURE_HEADER.to_string(), self.signature.clone()),
        ]
    }

    /// Attach the headers to an outbound request
    pub fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        request.headers.extend(self.to_headers());
        request
    }
}

impl std::fmt::Debug for SignatureHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureHeaders")
            .field("adp_token", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Strategy turning request metadata into signed headers
pub trait SigningScheme: Send + Sync {
    fn sign(
        &self,
        adp_token: &str,
        private_key: &RsaPrivateKey,
        request: &RequestMetadata,
        timestamp: DateTime<Utc>,
    ) -> Result<SignatureHeaders>;
}

/// The scheme used by the Audible mobile apps
#[derive(Debug, Clone, Copy, Default)]
pub struct AdpSigningScheme;

impl AdpSigningScheme {
    pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
        timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }

    /// Exact byte string fed to the signature
    pub fn canonical_string(
        adp_token: &str,
        request: &RequestMetadata,
        timestamp: &str,
    ) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            request.method.as_str(),
            request.path,
            timestamp,
            String::from_utf8_lossy(&request.body),
            adp_token
        )
    }
}

impl SigningScheme for AdpSigningScheme {
    fn sign(
        &self,
        adp_token: &str,
        private_key: &RsaPrivateKey,
        request: &RequestMetadata,
        timestamp: DateTime<Utc>,
    ) -> Result<SignatureHeaders> {
        let timestamp = Self::format_timestamp(timestamp);
        let canonical = Self::canonical_string(adp_token, request, &timestamp);
        let digest = Sha256::digest(canonical.as_bytes());

        let raw = private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| AudibleError::crypto(format!("Request signing failed: {}", e)))?;

        Ok(SignatureHeaders {
            adp_token: adp_token.to_string(),
            algorithm: ADP_ALGORITHM.to_string(),
            signature: format!("{}:{}", general_purpose::STANDARD.encode(raw), timestamp),
        })
    }
}

/// Signs content requests with a pluggable [`SigningScheme`]
#[derive(Clone)]
pub struct RequestSigner {
    scheme: Arc<dyn SigningScheme>,
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self::new(AdpSigningScheme)
    }
}

impl RequestSigner {
    pub fn new(scheme: impl SigningScheme + 'static) -> Self {
        Self {
            scheme: Arc::new(scheme),
        }
    }

    /// Produce signed headers for one request
    ///
    /// Identical inputs always yield identical headers (PKCS#1 v1.5 is
    /// deterministic); any change to the request or timestamp changes them.
    ///
    /// # Errors
    /// `Crypto` if the key cannot produce a signature
    pub fn sign(
        &self,
        adp_token: &str,
        private_key: &RsaPrivateKey,
        request: &RequestMetadata,
        timestamp: DateTime<Utc>,
    ) -> Result<SignatureHeaders> {
        self.scheme.sign(adp_token, private_key, request, timestamp)
    }
}
