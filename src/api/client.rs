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


//! HTTP plumbing shared by the authenticator, registrar and chapter client
//!
//! Every outbound call goes through [`HttpTransport`], a minimal
//! "send a request, get status and body back" seam. [`ReqwestTransport`] is the
//! production implementation; tests plug in in-memory transports.
//!
//! A transport never interprets status codes. Deciding whether a 404 is fatal
//! (registration) or expected (chapter fetch) is up to the caller.

use crate::api::region::Region;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use url::Url;

/// User agent of the mobile client being mimicked
pub const USER_AGENT: &str = "Audible/3.56.2 iOS/15.0.0";

/// Upper bound for every vendor call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully built outbound request
#[derive(Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body and matching content type
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = serde_json::to_vec(body)?;
        Ok(self.header("Content-Type", "application/json"))
    }

    /// Set a form-urlencoded body and matching content type
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = fields
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&")
            .into_bytes();
        self.header("Content-Type", "application/x-www-form-urlencoded")
    }

    /// Value of the first header matching `name` (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// Bodies and headers carry passwords, bearer tokens and signatures.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network-level failure: the request never produced a status code
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Single-attempt request primitive
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> std::result::Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Endpoint and client settings
///
/// Base URLs default to the region's hosts; overrides exist for proxies and
/// recorded-fixture servers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auth_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_base_url: None,
            api_base_url: None,
            user_agent: USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Base URL used for `/auth/token` and `/device/registerDevice`
    pub fn auth_base(&self, region: &Region) -> Result<Url> {
        parse_base(self.auth_base_url.clone().unwrap_or_else(|| region.auth_url()))
    }

    /// Base URL used for `/1.0/content/...`
    pub fn api_base(&self, region: &Region) -> Result<Url> {
        parse_base(self.api_base_url.clone().unwrap_or_else(|| region.api_url()))
    }

    /// Build the default transport honoring this config's timeout
    pub fn transport(&self) -> Result<ReqwestTransport> {
        ReqwestTransport::new(self.timeout)
            .map_err(|e| crate::error::AudibleError::Configuration(e.to_string()))
    }
}

fn parse_base(base: String) -> Result<Url> {
    Ok(Url::parse(base.trim_end_matches('/'))?)
}

/// Join an absolute path (with optional query) onto a base URL
pub fn endpoint(base: &Url, path_and_query: &str) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query)
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport used across unit tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub enum Reply {
        Response(HttpResponse),
        Error(TransportError),
    }

    /// Replays queued replies and records every request it receives
    pub struct MockTransport {
        replies: Mutex<VecDeque<Reply>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn respond(status: u16, body: &str) -> Self {
            Self::new(vec![Reply::Response(HttpResponse::new(status, body.as_bytes().to_vec()))])
        }

        pub fn fail(error: TransportError) -> Self {
            Self::new(vec![Reply::Error(error)])
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().expect("no request sent")
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Response(response)) => Ok(response),
                Some(Reply::Error(error)) => Err(error),
                None => Err(TransportError::Other("no reply queued".to_string())),
            }
        }
    }
}
