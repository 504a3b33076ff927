//! Wire types of the status API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::RegistrySnapshot;

/// Body of `GET /api/call-sid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSidResponse {
    pub call_sid: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub debug: DebugInfo,
}

/// Connection diagnostics attached to every status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub ws_status: String,
    pub connection_attempts: u64,
    pub message_count: u64,
    pub last_message_time: Option<DateTime<Utc>>,
}

impl From<RegistrySnapshot> for CallSidResponse {
    fn from(snapshot: RegistrySnapshot) -> Self {
        Self {
            call_sid: snapshot.call_sid,
            timestamp: snapshot.read_at,
            debug: DebugInfo {
                ws_status: snapshot.diagnostics.state.label().to_string(),
                connection_attempts: snapshot.diagnostics.attempt_count,
                message_count: snapshot.diagnostics.message_count,
                last_message_time: snapshot.diagnostics.last_message_at,
            },
        }
    }
}

/// Data of one `call_sid` server-sent event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSidEvent {
    pub call_sid: Option<String>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub ws_status: String,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CallRegistry;

    #[test]
    fn test_response_uses_camel_case_and_nulls() {
        let registry = CallRegistry::new();
        let body = serde_json::to_value(CallSidResponse::from(registry.read())).unwrap();

        assert!(body["callSid"].is_null());
        assert!(body["timestamp"].is_string());
        assert_eq!(body["debug"]["wsStatus"], "NULL");
        assert_eq!(body["debug"]["connectionAttempts"], 0);
        assert_eq!(body["debug"]["messageCount"], 0);
        assert!(body["debug"]["lastMessageTime"].is_null());
    }

    #[test]
    fn test_response_round_trips_through_json() {
        let registry = CallRegistry::new();
        registry.write_call_sid("CA123");
        registry.record_message();
        let response = CallSidResponse::from(registry.read());

        let text = serde_json::to_string(&response).unwrap();
        let decoded: CallSidResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, response);
    }
}
