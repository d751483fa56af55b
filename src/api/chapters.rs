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


//! Signed chapter fetch and normalization for a single item
//!
//! # Outcomes
//! | Situation | Result |
//! |---|---|
//! | HTTP 200 with JSON | `Ok(Some(..))` |
//! | non-200, timeout, empty or non-JSON body | `Ok(None)` + [`FetchDiagnostic`] |
//! | payload missing `chapters` | `Err(Validation)` |
//! | signing failure | `Err(Crypto)` |
//!
//! Missing chapter data is common upstream, so fetch failures are absorbed
//! and a batch over many items keeps going. A payload that no longer has the
//! expected keys means the schema moved, and that is never swallowed.

use crate::api::client::{endpoint, ClientConfig, HttpRequest, HttpTransport};
use crate::api::content::{normalize, ChapterSet, RawChapterPayload};
use crate::api::region::Region;
use crate::config::ChapterSecrets;
use crate::crypto::device::parse_private_key;
use crate::crypto::signing::{RequestMetadata, RequestSigner};
use crate::diagnostics::{DiagnosticSink, FetchDiagnostic, FetchFailure, TracingSink};
use crate::error::{AudibleError, Result};
use chrono::Utc;
use rsa::RsaPrivateKey;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Chapter metadata client bound to one item and region
pub struct ChapterClient {
    item_id: String,
    region: Region,
    adp_token: String,
    private_key: RsaPrivateKey,
    api_base: Url,
    user_agent: String,
    signer: RequestSigner,
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ChapterClient {
    /// Create a client using the region's default hosts
    ///
    /// # Errors
    /// - `MissingConfiguration` naming `ADP_TOKEN` and/or `PRIVATE_KEY`
    /// - `Configuration` for an empty item ID
    /// - `Crypto` if the private key cannot be parsed
    pub fn new(
        item_id: impl Into<String>,
        region: Region,
        secrets: &ChapterSecrets,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        Self::with_config(item_id, region, secrets, transport, &ClientConfig::default())
    }

    pub fn with_config(
        item_id: impl Into<String>,
        region: Region,
        secrets: &ChapterSecrets,
        transport: Arc<dyn HttpTransport>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let (adp_token, private_key) = secrets.validate()?;

        let item_id = item_id.into().trim().to_string();
        if item_id.is_empty() {
            return Err(AudibleError::Configuration("item ID must not be empty".to_string()));
        }

        Ok(Self {
            item_id,
            region,
            adp_token: adp_token.to_string(),
            private_key: parse_private_key(private_key)?,
            api_base: config.api_base(&region)?,
            user_agent: config.user_agent.clone(),
            signer: RequestSigner::default(),
            transport,
            sink: Arc::new(TracingSink),
        })
    }

    /// Send fetch diagnostics somewhere other than `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = signer;
        self
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Path and query of the chapter metadata request
    pub fn metadata_path(&self) -> String {
        format!(
            "/1.0/content/{}/metadata?response_groups=chapter_info&quality=High",
            urlencoding::encode(&self.item_id)
        )
    }

    /// Fetch the raw chapter payload
    ///
    /// Non-200 responses, transport failures and empty bodies resolve to
    /// `Ok(None)` after a diagnostic is recorded.
    ///
    /// # Errors
    /// `Crypto` if the request cannot be signed
    pub async fn fetch_chapters(&self) -> Result<Option<RawChapterPayload>> {
        let path = self.metadata_path();
        let signed = self.signer.sign(
            &self.adp_token,
            &self.private_key,
            &RequestMetadata::get(path.as_str()),
            Utc::now(),
        )?;

        let request = signed.apply(
            HttpRequest::get(endpoint(&self.api_base, &path))
                .header("User-Agent", self.user_agent.as_str())
                .header("Accept", "application/json"),
        );

        tracing::debug!(item_id = %self.item_id, region = %self.region, "Fetching chapter metadata");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                return Ok(self.absent(FetchFailure::Transport {
                    message: e.to_string(),
                }))
            }
        };

        if !response.is_ok() {
            return Ok(self.absent(FetchFailure::Status {
                status: response.status,
            }));
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(self.absent(FetchFailure::EmptyBody));
        }

        match RawChapterPayload::from_slice(&response.body) {
            Ok(payload) if payload.as_value().is_null() => Ok(self.absent(FetchFailure::EmptyBody)),
            Ok(payload) => Ok(Some(payload)),
            Err(e) => Ok(self.absent(FetchFailure::UnreadableBody {
                message: e.to_string(),
            })),
        }
    }

    /// Validate and normalize a fetched payload
    ///
    /// `None` passes through untouched.
    ///
    /// # Errors
    /// `Validation` if a required key is missing, `MalformedPayload` if the
    /// chapter list cannot be read
    pub fn parse_chapters(&self, payload: Option<RawChapterPayload>) -> Result<Option<ChapterSet>> {
        match payload {
            None => Ok(None),
            Some(payload) => normalize(&payload, &self.item_id, &self.region).map(Some),
        }
    }

    /// Fetch and parse in one step
    pub async fn process(&self) -> Result<Option<ChapterSet>> {
        let payload = match self.fetch_chapters().await? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        let chapters = self.parse_chapters(Some(payload))?;
        if let Some(set) = &chapters {
            tracing::info!(
                item_id = %self.item_id,
                region = %self.region,
                chapters = set.len(),
                "Chapter metadata normalized"
            );
        }
        Ok(chapters)
    }

    fn absent<T>(&self, failure: FetchFailure) -> Option<T> {
        self.sink.record(&FetchDiagnostic {
            item_id: self.item_id.clone(),
            region: self.region.code.to_string(),
            failure,
        });
        None
    }
}

impl fmt::Debug for ChapterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChapterClient")
            .field("item_id", &self.item_id)
            .field("region", &self.region.code)
            .field("api_base", &self.api_base.as_str())
            .field("adp_token", &"<redacted>")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::mock::MockTransport;
    use crate::api::client::TransportError;
    use crate::config::escape_pem;
    use crate::diagnostics::RecordingSink;

    const FIXTURE_KEY: &str = include_str!("../../test_fixtures/device_key.pem");
    const FIXTURE_PAYLOAD: &str = include_str!("../../test_fixtures/chapter_metadata_b079lrsmnn.json");

    fn secrets() -> ChapterSecrets {
        ChapterSecrets::new("{enc:token}", escape_pem(FIXTURE_KEY))
    }

    fn build_client(transport: MockTransport) -> (ChapterClient, Arc<MockTransport>, Arc<RecordingSink>) {
        let transport = Arc::new(transport);
        let sink = Arc::new(RecordingSink::new());
        let client = ChapterClient::new("B079LRSMNN", Region::us(), &secrets(), transport.clone())
            .unwrap()
            .with_sink(sink.clone());
        (client, transport, sink)
    }

    #[test]
    fn test_both_secrets_missing() {
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let err = ChapterClient::new("B079LRSMNN", Region::us(), &ChapterSecrets::default(), transport)
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("ADP_TOKEN"));
        assert!(message.contains("PRIVATE_KEY"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_key_fails_at_construction() {
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let secrets = ChapterSecrets::new("{enc:token}", "not a key");
        let err = ChapterClient::new("B079LRSMNN", Region::us(), &secrets, transport).unwrap_err();
        assert!(matches!(err, AudibleError::Crypto(_)));
    }

    #[test]
    fn test_empty_item_id() {
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let err = ChapterClient::new("  ", Region::us(), &secrets(), transport).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_fetch_sends_signed_request() {
        let (client, transport, sink) = build_client(MockTransport::respond(200, FIXTURE_PAYLOAD));

        let payload = client.fetch_chapters().await.unwrap();
        assert!(payload.is_some());
        assert!(sink.is_empty());

        let request = transport.last_request();
        assert_eq!(
            request.url,
            "https://api.audible.com/1.0/content/B079LRSMNN/metadata?response_groups=chapter_info&quality=High"
        );
        assert_eq!(request.header_value("x-adp-token"), Some("{enc:token}"));
        assert_eq!(request.header_value("x-adp-alg"), Some("SHA256withRSA:1.0"));
        let signature = request.header_value("x-adp-signature").unwrap();
        let (sig, timestamp) = signature.split_once(':').unwrap();
        assert!(!sig.is_empty());
        assert!(timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_non_200_is_absent_with_diagnostic() {
        let (client, _, sink) = build_client(MockTransport::respond(404, r#"{"message":"not found"}"#));

        let payload = client.fetch_chapters().await.unwrap();
        assert!(payload.is_none());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_id, "B079LRSMNN");
        assert_eq!(events[0].status(), Some(404));
        let line = events[0].to_string();
        assert!(line.contains("404") && line.contains("B079LRSMNN"));
    }

    #[tokio::test]
    async fn test_transport_error_is_absent() {
        let (client, _, sink) = build_client(MockTransport::fail(TransportError::Timeout));

        assert!(client.fetch_chapters().await.unwrap().is_none());
        assert!(matches!(sink.events()[0].failure, FetchFailure::Transport { .. }));
    }

    #[tokio::test]
    async fn test_empty_and_unreadable_bodies_are_absent() {
        let (client, _, sink) = build_client(MockTransport::respond(200, "  "));
        assert!(client.fetch_chapters().await.unwrap().is_none());
        assert_eq!(sink.events()[0].failure, FetchFailure::EmptyBody);

        let (client, _, sink) = build_client(MockTransport::respond(200, "<html>"));
        assert!(client.fetch_chapters().await.unwrap().is_none());
        assert!(matches!(sink.events()[0].failure, FetchFailure::UnreadableBody { .. }));
    }

    #[test]
    fn test_parse_none_passes_through() {
        let (client, _, _) = build_client(MockTransport::new(Vec::new()));
        assert_eq!(client.parse_chapters(None).unwrap(), None);
    }

    #[tokio::test]
    async fn test_process_absent_skips_validation() {
        let (client, _, sink) = build_client(MockTransport::respond(500, ""));
        assert_eq!(client.process().await.unwrap(), None);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_process_propagates_validation_error() {
        let (client, _, sink) = build_client(MockTransport::respond(
            200,
            r#"{"content_metadata":{"chapter_info":{"runtime_length_ms":1}}}"#,
        ));

        let err = client.process().await.unwrap_err();
        assert!(matches!(err, AudibleError::Validation { ref key, ref item_id }
            if key == "chapters" && item_id == "B079LRSMNN"));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_process_matches_fetch_then_parse() {
        let (first, _, _) = build_client(MockTransport::respond(200, FIXTURE_PAYLOAD));
        let (second, _, _) = build_client(MockTransport::respond(200, FIXTURE_PAYLOAD));

        let composed = second.parse_chapters(second.fetch_chapters().await.unwrap()).unwrap();
        assert_eq!(first.process().await.unwrap(), composed);
        assert!(composed.is_some());
    }

    #[test]
    fn test_item_id_is_path_encoded() {
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let client = ChapterClient::new("B0 7/9", Region::us(), &secrets(), transport).unwrap();
        assert!(client.metadata_path().starts_with("/1.0/content/B0%207%2F9/metadata?"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let (client, _, _) = build_client(MockTransport::new(Vec::new()));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("{enc:token}"));
        assert!(debug.contains("B079LRSMNN"));
    }
}
