//! Call status webhook
//!
//! The telephony provider posts form-encoded status callbacks. They are
//! logged for diagnostics only and never write the registry; only
//! `call_started` frames from the stream do that.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Form body of a status callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallStatusWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
}

/// Provider call lifecycle status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    Other(String),
}

impl CallStatus {
    /// Parse the provider's status string
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => CallStatus::Queued,
            "initiated" => CallStatus::Initiated,
            "ringing" => CallStatus::Ringing,
            "in-progress" | "in_progress" | "answered" => CallStatus::InProgress,
            "completed" => CallStatus::Completed,
            "busy" => CallStatus::Busy,
            "failed" => CallStatus::Failed,
            "no-answer" | "no_answer" => CallStatus::NoAnswer,
            "canceled" | "cancelled" => CallStatus::Canceled,
            _ => CallStatus::Other(value.to_string()),
        }
    }

    /// The call will produce no further status transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Busy
                | CallStatus::Failed
                | CallStatus::NoAnswer
                | CallStatus::Canceled
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallStatus::Queued => "queued",
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Busy => "busy",
            CallStatus::Failed => "failed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Canceled => "canceled",
            CallStatus::Other(other) => other.as_str(),
        };
        f.write_str(s)
    }
}

/// Response body of the status webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStatusAck {
    pub success: bool,
}

impl CallStatusWebhook {
    /// Parsed status, if the provider sent one
    pub fn status(&self) -> Option<CallStatus> {
        self.call_status.as_deref().map(CallStatus::parse)
    }

    /// Log the callback
    pub fn observe(&self) -> CallStatusAck {
        let call_sid = self.call_sid.as_deref().unwrap_or("<none>");
        let to = self.to.as_deref().unwrap_or("-");
        let from = self.from.as_deref().unwrap_or("-");

        match self.status() {
            Some(status) if status.is_terminal() => {
                info!("☎️ Call {} ended with status {} ({} -> {})", call_sid, status, from, to);
            }
            Some(status) => {
                info!("☎️ Call {} status {} ({} -> {})", call_sid, status, from, to);
            }
            None => {
                info!("☎️ Status callback for {} without CallStatus", call_sid);
            }
        }

        CallStatusAck { success: true }
    }
}
