//! Structured diagnostics for absorbed fetch failures
//!
//! A chapter fetch that does not return data is not an error: the client
//! resolves to `None` and reports a [`FetchDiagnostic`] instead. The event is a
//! typed value so callers can count, persist or alert on it without parsing
//! log text. [`TracingSink`] is the default and forwards events to `tracing`.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Why a fetch produced no payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Upstream answered with something other than 200
    Status { status: u16 },

    /// Request never produced a status (timeout, DNS, reset)
    Transport { message: String },

    /// 200 with nothing in it
    EmptyBody,

    /// 200 with a body that is not JSON
    UnreadableBody { message: String },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status { status } => write!(f, "HTTP {}", status),
            FetchFailure::Transport { message } => write!(f, "transport error: {}", message),
            FetchFailure::EmptyBody => f.write_str("empty response body"),
            FetchFailure::UnreadableBody { message } => write!(f, "unreadable body: {}", message),
        }
    }
}

/// One absorbed fetch failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchDiagnostic {
    pub item_id: String,
    pub region: String,
    pub failure: FetchFailure,
}

impl FetchDiagnostic {
    /// HTTP status involved, when the vendor answered at all
    pub fn status(&self) -> Option<u16> {
        match self.failure {
            FetchFailure::Status { status } => Some(status),
            FetchFailure::EmptyBody | FetchFailure::UnreadableBody { .. } => Some(200),
            _ => None,
        }
    }
}

impl fmt::Display for FetchDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No chapter data for item {} ({}): {}",
            self.item_id, self.region, self.failure
        )
    }
}

/// Receiver of fetch diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: &FetchDiagnostic);
}

/// Forwards diagnostics to `tracing` at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: &FetchDiagnostic) {
        match diagnostic.status() {
            Some(status) => tracing::warn!(
                item_id = %diagnostic.item_id,
                region = %diagnostic.region,
                status,
                "{}",
                diagnostic
            ),
            None => tracing::warn!(
                item_id = %diagnostic.item_id,
                region = %diagnostic.region,
                "{}",
                diagnostic
            ),
        }
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FetchDiagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FetchDiagnostic> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, diagnostic: &FetchDiagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(diagnostic.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn traced(event: &FetchDiagnostic) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();

        tracing::subscriber::with_default(subscriber, || TracingSink.record(event));
        log.text()
    }

    fn diagnostic(failure: FetchFailure) -> FetchDiagnostic {
        FetchDiagnostic {
            item_id: "B079LRSMNN".to_string(),
            region: "us".to_string(),
            failure,
        }
    }

    #[test]
    fn test_display_contains_status_and_item() {
        let line = diagnostic(FetchFailure::Status { status: 404 }).to_string();
        assert!(line.contains("404"));
        assert!(line.contains("B079LRSMNN"));
    }

    #[test]
    fn test_status_lookup() {
        assert_eq!(diagnostic(FetchFailure::Status { status: 503 }).status(), Some(503));
        assert_eq!(diagnostic(FetchFailure::EmptyBody).status(), Some(200));
        assert_eq!(
            diagnostic(FetchFailure::Transport {
                message: "timed out".to_string()
            })
            .status(),
            None
        );
    }

    #[test]
    fn test_serializes_as_structured_event() {
        let json = serde_json::to_value(diagnostic(FetchFailure::Status { status: 404 })).unwrap();
        assert_eq!(json["item_id"], "B079LRSMNN");
        assert_eq!(json["failure"]["kind"], "status");
        assert_eq!(json["failure"]["status"], 404);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());
        sink.record(&diagnostic(FetchFailure::EmptyBody));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].failure, FetchFailure::EmptyBody);
    }

    #[test]
    fn test_tracing_sink_logs_item_and_status() {
        let line = traced(&diagnostic(FetchFailure::Status { status: 404 }));

        assert!(line.contains("WARN"), "{}", line);
        assert!(line.contains("item_id=B079LRSMNN"), "{}", line);
        assert!(line.contains("region=us"), "{}", line);
        assert!(line.contains("status=404"), "{}", line);
        assert!(line.contains("No chapter data for item B079LRSMNN (us): HTTP 404"), "{}", line);
    }

    #[test]
    fn test_tracing_sink_omits_status_without_response() {
        let line = traced(&diagnostic(FetchFailure::Transport {
            message: "request timed out".to_string(),
        }));

        assert!(line.contains("item_id=B079LRSMNN"), "{}", line);
        assert!(!line.contains("status="), "{}", line);
    }
}
