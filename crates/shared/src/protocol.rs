use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FrameError;

/// Substring the backend puts in the final status message of a run.
pub const RUN_FINISHED_MARKER: &str = "Agent run finished";

const KNOWN_EVENT_TYPES: [&str; 5] = ["status", "log", "error", "result", "summary"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub message: String,
}

/// Outcome of one processed post, nested under `log` in a `result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLog {
    pub post_author: String,
    pub generated_comment: String,
    pub posted_to_linkedin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { message: String },
    Log { message: String },
    Error { message: String },
    Result { log: ResultLog },
    Summary { message: String },
}

impl StreamEvent {
    pub fn signals_run_finished(&self) -> bool {
        matches!(self, StreamEvent::Status { message } if message.contains(RUN_FINISHED_MARKER))
    }
}

/// Decodes one text frame pushed over the run stream.
pub fn decode_frame(text: &str) -> Result<StreamEvent, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?
        .to_string();
    if !KNOWN_EVENT_TYPES.contains(&kind.as_str()) {
        return Err(FrameError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|source| FrameError::Malformed { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_result_frame_and_ignores_extra_fields() {
        let event = decode_frame(
            r#"{"type":"result","log":{"post_author":"Ada","generated_comment":"Nice","posted_to_linkedin":false,"post_url":"x"}}"#,
        )
        .expect("decode");
        assert_eq!(
            event,
            StreamEvent::Result {
                log: ResultLog {
                    post_author: "Ada".into(),
                    generated_comment: "Nice".into(),
                    posted_to_linkedin: false,
                }
            }
        );
    }

    #[test]
    fn classifies_bad_frames() {
        assert!(matches!(decode_frame("{not json"), Err(FrameError::Json(_))));
        assert!(matches!(
            decode_frame(r#"{"message":"hi"}"#),
            Err(FrameError::MissingType)
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"heartbeat"}"#),
            Err(FrameError::UnknownType(kind)) if kind == "heartbeat"
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"result"}"#),
            Err(FrameError::Malformed { kind, .. }) if kind == "result"
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"result","log":{"post_author":"Ada","generated_comment":"x"}}"#),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn detects_run_finished_by_substring() {
        let finished = StreamEvent::Status {
            message: "Agent run finished. Processed 3 posts.".into(),
        };
        let other = StreamEvent::Log {
            message: "Agent run finished".into(),
        };
        assert!(finished.signals_run_finished());
        assert!(!other.signals_run_finished());
    }
}
