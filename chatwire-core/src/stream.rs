//! Streaming primitives exposed by chatwire.
//!
//! Contract:
//! - The backend emits 0..n `Content` deltas, interleaved with tool lifecycle events.
//! - A decoded stream **always** terminates with exactly one `End`.
//! - `Error` does not end the stream on its own, but it is terminal for the turn.

use serde::Deserialize;

/// Classification of an in-stream error, following the error taxonomy of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Connection dropped mid-body.
    Transport,
    /// A delimited unit could not be parsed.
    Framing,
    /// The backend itself reported an error event.
    Server,
    /// No fragment arrived within the idle timeout.
    Timeout,
}

impl StreamErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Framing => "framing",
            Self::Server => "server",
            Self::Timeout => "timeout",
        }
    }
}

/// One discrete unit of the assistant's streamed response.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Partial assistant text.
    Content(String),
    ToolStart {
        name: String,
        input: serde_json::Value,
    },
    /// The wire format does not always carry the tool name on completion.
    ToolEnd {
        name: Option<String>,
        output: String,
    },
    End,
    Error {
        kind: StreamErrorKind,
        message: String,
    },
}

impl StreamEvent {
    pub fn error(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self::Error { kind, message: message.into() }
    }

    /// Returns true if this event ends the current turn (`End` or `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. })
    }

    /// Convenience accessor for `Content` deltas.
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::Content(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// JSON payload carried by a `data:` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireEvent {
    Content {
        #[serde(default)]
        data: String,
    },
    ToolStart {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolEnd {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        data: serde_json::Value,
    },
    End,
    Error {
        #[serde(default)]
        data: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl From<WireEvent> for StreamEvent {
    fn from(ev: WireEvent) -> Self {
        match ev {
            WireEvent::Content { data } => Self::Content(data),
            WireEvent::ToolStart { name, input } => Self::ToolStart { name, input },
            WireEvent::ToolEnd { name, data } => Self::ToolEnd { name, output: value_text(data) },
            WireEvent::End => Self::End,
            WireEvent::Error { data, message } => Self::error(
                StreamErrorKind::Server,
                message.or(data).unwrap_or_else(|| "backend reported an error".into()),
            ),
        }
    }
}

/// Strings pass through unquoted; anything else is rendered as compact JSON.
pub(crate) fn value_text(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn helpers_work() {
        let d = StreamEvent::Content("hi".into());
        assert!(!d.is_terminal());
        assert_eq!(d.as_text_delta(), Some("hi"));

        let e = StreamEvent::End;
        assert!(e.is_terminal());
        assert_eq!(e.as_text_delta(), None);

        assert!(StreamEvent::error(StreamErrorKind::Framing, "bad").is_terminal());
    }

    #[test]
    fn tool_end_output_keeps_strings_unquoted() {
        let ev: WireEvent = serde_json::from_value(json!({"type":"tool_end","data":"42 rows"})).unwrap();
        assert_eq!(
            StreamEvent::from(ev),
            StreamEvent::ToolEnd { name: None, output: "42 rows".into() }
        );

        let ev: WireEvent =
            serde_json::from_value(json!({"type":"tool_end","name":"calc","data":{"sum":3}})).unwrap();
        assert_eq!(
            StreamEvent::from(ev),
            StreamEvent::ToolEnd { name: Some("calc".into()), output: r#"{"sum":3}"#.into() }
        );
    }

    #[test]
    fn server_error_prefers_message_field() {
        let ev: WireEvent =
            serde_json::from_value(json!({"type":"error","message":"quota","data":"x"})).unwrap();
        assert_eq!(StreamEvent::from(ev), StreamEvent::error(StreamErrorKind::Server, "quota"));
    }
}
