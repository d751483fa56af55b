//! Test helpers for offline integration tests
//!
//! Provides a scripted transport that replays canned responses keyed by
//! request path, plus fixture-backed secrets for the chapter client.

#![allow(dead_code)]

use async_trait::async_trait;
use audible_chapters::api::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use audible_chapters::config::ChapterSecrets;
use audible_chapters::diagnostics::FetchDiagnostic;
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEVICE_KEY_PEM: &str = include_str!("../../test_fixtures/device_key.pem");
pub const CHAPTER_FIXTURE: &str = include_str!("../../test_fixtures/chapter_metadata_b079lrsmnn.json");
pub const FIXTURE_ADP_TOKEN: &str = "{enc:fixture-token}";

/// Secrets as a user would paste them: PEM newlines escaped
pub fn fixture_secrets() -> ChapterSecrets {
    ChapterSecrets::new(FIXTURE_ADP_TOKEN, DEVICE_KEY_PEM.trim_end().replace('\n', "\\n"))
}

/// Replays responses by URL path; unknown paths get a 404
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Vec<HttpResponse>>>,
    failures: Mutex<HashMap<String, TransportError>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for requests whose path starts with `prefix`
    pub fn route(self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(prefix.to_string())
            .or_default()
            .push(HttpResponse::new(status, body.as_bytes().to_vec()));
        self
    }

    pub fn fail(self, prefix: &str, error: TransportError) -> Self {
        self.failures.lock().unwrap().insert(prefix.to_string(), error);
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.sent()
            .into_iter()
            .filter(|r| path_of(&r.url).starts_with(prefix))
            .collect()
    }
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = path_of(&request.url);
        self.sent.lock().unwrap().push(request);

        if let Some((_, error)) = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return Err(error.clone());
        }

        let mut routes = self.routes.lock().unwrap();
        let queued = routes
            .iter_mut()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, queue)| queue);

        match queued {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) if queue.len() == 1 => Ok(queue[0].clone()),
            _ => Ok(HttpResponse::new(404, b"{\"message\":\"not found\"}".to_vec())),
        }
    }
}

pub fn describe(events: &[FetchDiagnostic]) -> Vec<String> {
    events.iter().map(|e| e.to_string()).collect()
}
