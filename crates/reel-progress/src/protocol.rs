//! Wire protocol of the render backend's progress socket.
//!
//! The backend tags every message with the job id it concerns; messages for
//! jobs nobody subscribed to, and frames that do not parse, are dropped
//! rather than surfaced as errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reel_models::ProgressEvent;

/// First frame sent after connecting, identifying this client.
#[derive(Debug, Clone, Serialize)]
pub struct HelloFrame {
    pub client_id: String,
}

/// Request to receive events for one job.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeFrame {
    pub op: &'static str,
    pub data: SubscribeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeData {
    pub prompt_id: String,
}

impl SubscribeFrame {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            op: "subscribe_to_prompt",
            data: SubscribeData {
                prompt_id: job_id.into(),
            },
        }
    }
}

/// Envelope of every server-sent frame.
#[derive(Debug, Deserialize)]
struct ServerFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Parse one text frame into a progress event.
///
/// Returns `None` for malformed frames and for message types this client
/// does not track.
pub fn parse_event(text: &str) -> Option<ProgressEvent> {
    let frame: ServerFrame = serde_json::from_str(text).ok()?;
    let job_id = frame.data.get("prompt_id")?.as_str()?.to_string();

    match frame.kind.as_str() {
        "progress" => {
            let value = frame.data.get("value")?.as_f64()?;
            let max = frame.data.get("max")?.as_f64()?;
            if max <= 0.0 {
                return None;
            }
            Some(ProgressEvent {
                progress: Some((value / max).clamp(0.0, 1.0)),
                status: Some("generating".into()),
                job_id,
            })
        }
        "executing" => {
            let node = frame.data.get("node")?;
            Some(ProgressEvent::status(
                job_id,
                format!("processing node {}", node),
            ))
        }
        "executed" => {
            let node = frame.data.get("node")?;
            Some(ProgressEvent::status(
                job_id,
                format!("completed node {}", node),
            ))
        }
        "execution_error" => {
            let message = frame
                .data
                .get("exception_message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Some(ProgressEvent::status(job_id, format!("error: {}", message)))
        }
        "execution_complete" => Some(ProgressEvent::complete(job_id)),
        _ => None,
    }
}
