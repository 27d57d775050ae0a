/// Span/Log attribute keys for chat turns.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_TURN_ID: &str = "turn.id";
pub const KEY_TRANSPORT: &str = "turn.transport";
pub const KEY_OUTCOME: &str = "turn.outcome";
pub const KEY_EVENTS: &str = "turn.events";
pub const KEY_CHARS: &str = "turn.chars";
pub const KEY_TOOL_NOTICES: &str = "turn.tool_notices";

pub const KEY_LATENCY_MS: &str = "latency.ms";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
