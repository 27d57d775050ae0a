use serde::{Deserialize, Serialize};

/// Per-turn telemetry payload, emitted once the turn reaches a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TurnTrace {
    pub turn_id: Option<String>,

    /// Transport name, e.g. "http", "scripted".
    pub transport: Option<String>,

    /// "committed" or "failed".
    pub outcome: Option<String>,

    /// Events the reducer applied before reaching a terminal phase.
    pub events: Option<u32>,

    /// Length of the committed assistant text in bytes.
    pub chars: Option<u32>,

    pub tool_notices: Option<u32>,

    pub latency_ms: Option<u64>,

    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn turn_id(mut self, v: &str) -> Self {
        self.turn_id = Some(v.to_string());
        self
    }
    pub fn transport(mut self, v: &str) -> Self {
        self.transport = Some(v.to_string());
        self
    }
    pub fn outcome(mut self, v: &str) -> Self {
        self.outcome = Some(v.to_string());
        self
    }
    pub fn counts(mut self, events: usize, chars: usize, tool_notices: usize) -> Self {
        self.events = Some(events as u32);
        self.chars = Some(chars as u32);
        self.tool_notices = Some(tool_notices as u32);
        self
    }
    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
    pub fn error_kind_opt(mut self, v: Option<&str>) -> Self {
        self.error_kind = v.map(|s| s.to_string());
        self
    }
    pub fn error_message_opt(mut self, v: Option<&str>) -> Self {
        self.error_message = v.map(|s| s.to_string());
        self
    }
}
