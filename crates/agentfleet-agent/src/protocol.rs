//! Newline-delimited JSON framing for the CLI agent's stdin/stdout wire.
//!
//! One JSON object per line, `{"type": "prompt"|"response"|"error", ...}` —
//! the same discipline the underlying `CliSession` uses for every frame,
//! applied here to the specific prompt/response contract the agent speaks.

use serde_json::{json, Value};

use crate::error::{AgentError, Result};

pub fn build_prompt_frame(content: &str) -> Value {
    json!({ "type": "prompt", "content": content })
}

pub fn parse_response_frame(value: Value) -> Result<String> {
    match value.get("type").and_then(Value::as_str) {
        Some("response") => value
            .get("content")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AgentError::Protocol("response frame missing content".to_string())),
        Some("error") => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown agent error")
                .to_string();
            Err(AgentError::AgentReported(message))
        }
        other => Err(AgentError::Protocol(format!(
            "unexpected frame type: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_response_frame() {
        let frame = json!({ "type": "response", "content": "hi there" });
        assert_eq!(parse_response_frame(frame).unwrap(), "hi there");
    }

    #[test]
    fn surfaces_an_error_frame() {
        let frame = json!({ "type": "error", "message": "out of tokens" });
        let err = parse_response_frame(frame).unwrap_err();
        assert!(matches!(err, AgentError::AgentReported(m) if m == "out of tokens"));
    }

    #[test]
    fn rejects_an_unrecognized_frame_type() {
        let frame = json!({ "type": "ping" });
        assert!(parse_response_frame(frame).is_err());
    }
}
