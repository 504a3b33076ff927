//! Call event ingestion
//!
//! Classifies frames received from the streaming server and decides whether
//! they update the [`CallRegistry`]. Ingestion is total: every input, however
//! malformed, ends in an [`IngestOutcome`] and a log line.

pub mod webhook;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use crate::registry::CallRegistry;

pub use webhook::{CallStatus, CallStatusAck, CallStatusWebhook};

/// Discriminator value that announces a new active call
pub const CALL_STARTED: &str = "call_started";

/// Field carrying the discriminator of call-state frames
pub const TYPE_FIELD: &str = "type";

/// Field carrying the provider call identifier
pub const CALL_SID_FIELD: &str = "callSid";

/// Field carrying the discriminator of raw-audio relay frames
pub const MEDIA_EVENT_FIELD: &str = "event";

/// Raw-audio relay frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEventKind {
    Start,
    Media,
    Stop,
}

impl MediaEventKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(MediaEventKind::Start),
            "media" => Some(MediaEventKind::Media),
            "stop" => Some(MediaEventKind::Stop),
            _ => None,
        }
    }
}

/// What the ingestor did with one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Registry updated with a new call identifier
    CallStarted {
        call_sid: String,
        previous: Option<String>,
    },
    /// `call_started` without a usable call identifier
    MissingCallSid,
    /// Frame belongs to the raw-audio relay protocol
    MediaFrame(MediaEventKind),
    /// Discriminator present but not one we act on
    Unrecognized(String),
    /// No discriminator
    Untyped,
    /// Not UTF-8 or not JSON
    Malformed(String),
}

impl IngestOutcome {
    /// Whether the registry was written
    pub fn updated_registry(&self) -> bool {
        matches!(self, IngestOutcome::CallStarted { .. })
    }
}

/// Routes decoded frames into the registry
#[derive(Debug, Clone)]
pub struct EventIngestor {
    registry: Arc<CallRegistry>,
}

impl EventIngestor {
    /// Create an ingestor writing to `registry`
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self { registry }
    }

    /// Registry this ingestor writes to
    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Ingest one raw frame payload
    ///
    /// The frame is counted and any call identifier it carries is written in
    /// one registry update.
    pub fn ingest_frame(&self, payload: &[u8]) -> IngestOutcome {
        self.apply(Self::classify_frame(payload))
    }

    /// Ingest one text frame
    pub fn ingest_text(&self, text: &str) -> IngestOutcome {
        self.apply(Self::classify_text(text))
    }

    /// Ingest one already parsed frame
    pub fn ingest_value(&self, value: &Value) -> IngestOutcome {
        self.apply(Self::classify_value(value))
    }

    /// Decide what a raw frame means without touching the registry
    ///
    /// A `CallStarted` outcome carries no `previous` value yet.
    pub fn classify_frame(payload: &[u8]) -> IngestOutcome {
        match std::str::from_utf8(payload) {
            Ok(text) => Self::classify_text(text),
            Err(e) => {
                warn!("Discarding frame that is not valid UTF-8 ({} bytes): {}", payload.len(), e);
                IngestOutcome::Malformed(format!("invalid UTF-8: {}", e))
            }
        }
    }

    /// Decide what a text frame means without touching the registry
    pub fn classify_text(text: &str) -> IngestOutcome {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::classify_value(&value),
            Err(e) => {
                warn!("Discarding frame that is not JSON: {} (payload: {})", e, preview(text));
                IngestOutcome::Malformed(format!("invalid JSON: {}", e))
            }
        }
    }

    /// Decide what a parsed frame means without touching the registry
    pub fn classify_value(value: &Value) -> IngestOutcome {
        let Some(event) = value.as_object() else {
            info!("Ignoring non-object frame: {}", value);
            return IngestOutcome::Untyped;
        };

        match event.get(TYPE_FIELD) {
            Some(Value::String(kind)) if kind == CALL_STARTED => Self::classify_call_started(event),
            Some(Value::String(kind)) => {
                info!("Ignoring frame with unrecognized type: {}", kind);
                IngestOutcome::Unrecognized(kind.clone())
            }
            Some(other) => {
                info!("Ignoring frame with non-string type: {}", other);
                IngestOutcome::Unrecognized(other.to_string())
            }
            None => Self::classify_untyped(event),
        }
    }

    fn apply(&self, mut outcome: IngestOutcome) -> IngestOutcome {
        let call_sid = match &outcome {
            IngestOutcome::CallStarted { call_sid, .. } => Some(call_sid.as_str()),
            _ => None,
        };
        let (count, replaced) = self.registry.record_frame(call_sid);

        if let IngestOutcome::CallStarted { previous, .. } = &mut outcome {
            *previous = replaced;
        }
        trace!("Frame #{} handled: {:?}", count, outcome);
        outcome
    }

    fn classify_call_started(event: &Map<String, Value>) -> IngestOutcome {
        match event.get(CALL_SID_FIELD).and_then(Value::as_str) {
            Some(call_sid) if !call_sid.is_empty() => IngestOutcome::CallStarted {
                call_sid: call_sid.to_string(),
                previous: None,
            },
            _ => {
                warn!("call_started frame without a usable callSid: {:?}", event.get(CALL_SID_FIELD));
                IngestOutcome::MissingCallSid
            }
        }
    }

    fn classify_untyped(event: &Map<String, Value>) -> IngestOutcome {
        if let Some(kind) = event
            .get(MEDIA_EVENT_FIELD)
            .and_then(Value::as_str)
            .and_then(MediaEventKind::parse)
        {
            debug!("Ignoring raw-audio relay frame: {:?}", kind);
            return IngestOutcome::MediaFrame(kind);
        }

        let keys: Vec<&str> = event.keys().map(String::as_str).collect();
        info!("Ignoring frame without a type field (keys: {:?})", keys);
        IngestOutcome::Untyped
    }
}

fn preview(text: &str) -> &str {
    const MAX: usize = 120;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> EventIngestor {
        EventIngestor::new(CallRegistry::shared())
    }

    #[test]
    fn test_call_started_sets_registry() {
        let ingestor = ingestor();
        let outcome = ingestor.ingest_text(r#"{"type":"call_started","callSid":"CA123"}"#);
        assert_eq!(
            outcome,
            IngestOutcome::CallStarted {
                call_sid: "CA123".to_string(),
                previous: None
            }
        );
        assert_eq!(ingestor.registry().call_sid().as_deref(), Some("CA123"));
    }

    #[test]
    fn test_call_started_supersedes_previous_call() {
        let ingestor = ingestor();
        ingestor.ingest_text(r#"{"type":"call_started","callSid":"CA123"}"#);
        let outcome = ingestor.ingest_text(r#"{"type":"call_started","callSid":"CA456","extra":1}"#);
        assert_eq!(
            outcome,
            IngestOutcome::CallStarted {
                call_sid: "CA456".to_string(),
                previous: Some("CA123".to_string())
            }
        );
        assert!(outcome.updated_registry());
        assert_eq!(ingestor.registry().call_sid().as_deref(), Some("CA456"));
    }

    #[test]
    fn test_every_frame_is_counted() {
        let ingestor = ingestor();
        let outcomes = [
            ingestor.ingest_text(r#"{"type":"call_started","callSid":"CA1"}"#),
            ingestor.ingest_text("garbage"),
            ingestor.ingest_frame(br#"{"type":"ping"}"#),
            ingestor.ingest_value(&serde_json::json!({"event": "stop"})),
        ];

        let updates: Vec<bool> = outcomes.iter().map(IngestOutcome::updated_registry).collect();
        assert_eq!(updates, vec![true, false, false, false]);
        assert_eq!(ingestor.registry().read().diagnostics.message_count, 4);
    }

    #[test]
    fn test_classify_does_not_touch_registry() {
        let outcome = EventIngestor::classify_text(r#"{"type":"call_started","callSid":"CA7"}"#);
        assert_eq!(
            outcome,
            IngestOutcome::CallStarted {
                call_sid: "CA7".to_string(),
                previous: None
            }
        );

        let ingestor = ingestor();
        EventIngestor::classify_frame(br#"{"type":"call_started","callSid":"CA8"}"#);
        let snapshot = ingestor.registry().read();
        assert_eq!(snapshot.call_sid, None);
        assert_eq!(snapshot.diagnostics.message_count, 0);
    }

    #[test]
    fn test_malformed_frames_leave_registry_alone() {
        let ingestor = ingestor();
        ingestor.registry().write_call_sid("CA1");

        assert!(matches!(ingestor.ingest_text("not json at all"), IngestOutcome::Malformed(_)));
        assert!(matches!(ingestor.ingest_text(r#"{"type":"call_started""#), IngestOutcome::Malformed(_)));
        assert!(matches!(ingestor.ingest_frame(&[0xff, 0xfe, 0x00]), IngestOutcome::Malformed(_)));
        assert_eq!(ingestor.registry().call_sid().as_deref(), Some("CA1"));
    }

    #[test]
    fn test_unknown_type_is_noop() {
        let ingestor = ingestor();
        let outcome = ingestor.ingest_text(r#"{"type":"ping"}"#);
        assert_eq!(outcome, IngestOutcome::Unrecognized("ping".to_string()));
        assert_eq!(ingestor.registry().call_sid(), None);

        let outcome = ingestor.ingest_text(r#"{"type":42,"callSid":"CA9"}"#);
        assert!(matches!(outcome, IngestOutcome::Unrecognized(_)));
        assert_eq!(ingestor.registry().call_sid(), None);
    }

    #[test]
    fn test_missing_discriminator_is_noop() {
        let ingestor = ingestor();
        assert_eq!(ingestor.ingest_text(r#"{"callSid":"CA9"}"#), IngestOutcome::Untyped);
        assert_eq!(ingestor.ingest_text("[1,2,3]"), IngestOutcome::Untyped);
        assert_eq!(ingestor.ingest_text("null"), IngestOutcome::Untyped);
        assert_eq!(ingestor.registry().call_sid(), None);
    }

    #[test]
    fn test_call_started_without_call_sid() {
        let ingestor = ingestor();
        assert_eq!(ingestor.ingest_text(r#"{"type":"call_started"}"#), IngestOutcome::MissingCallSid);
        assert_eq!(ingestor.ingest_text(r#"{"type":"call_started","callSid":""}"#), IngestOutcome::MissingCallSid);
        assert_eq!(ingestor.ingest_text(r#"{"type":"call_started","callSid":7}"#), IngestOutcome::MissingCallSid);
        assert_eq!(ingestor.registry().call_sid(), None);
    }

    #[test]
    fn test_media_relay_frames_are_classified() {
        let ingestor = ingestor();
        assert_eq!(
            ingestor.ingest_text(r#"{"event":"start","start":{"callSid":"CA1"}}"#),
            IngestOutcome::MediaFrame(MediaEventKind::Start)
        );
        assert_eq!(
            ingestor.ingest_text(r#"{"event":"media","media":{"payload":"AAAA"}}"#),
            IngestOutcome::MediaFrame(MediaEventKind::Media)
        );
        assert_eq!(ingestor.ingest_text(r#"{"event":"mark"}"#), IngestOutcome::Untyped);
        assert_eq!(ingestor.registry().call_sid(), None);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let long = "é".repeat(100);
        let cut = preview(&long);
        assert!(cut.len() <= 120);
        assert!(long.starts_with(cut));
    }
}
