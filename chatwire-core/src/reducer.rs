//! Turn reducer: folds one assistant turn's events into UI effects and, on
//! `end`, a single committed transcript entry.

use tracing::{debug, warn};

use crate::model::Turn;
use crate::stream::StreamEvent;
use crate::transcript::TranscriptStore;

pub const DEFAULT_FALLBACK: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerConfig {
    /// Whether tool lifecycle notices reach the observer. They are recorded either way.
    pub show_tool_notices: bool,
    /// Text rendered in place of the reply when the turn fails.
    pub fallback_message: String,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            show_tool_notices: true,
            fallback_message: DEFAULT_FALLBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Streaming,
    Committed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the visible assistant text.
    Render(String),
    Notify(String),
    Committed(Turn),
}

impl Effect {
    pub fn dispatch(self, observer: &mut dyn TurnObserver) {
        match self {
            Self::Render(text) => observer.render(&text),
            Self::Notify(notice) => observer.notify(&notice),
            Self::Committed(turn) => observer.committed(&turn),
        }
    }
}

/// The UI side of a streaming turn.
pub trait TurnObserver {
    /// Called with the whole text so far, not just the latest delta.
    fn render(&mut self, text: &str);
    fn notify(&mut self, notice: &str);
    fn committed(&mut self, _turn: &Turn) {}
}

/// Observer that drops everything.
pub struct NullObserver;

impl TurnObserver for NullObserver {
    fn render(&mut self, _text: &str) {}
    fn notify(&mut self, _notice: &str) {}
}

/// State machine for one assistant turn.
///
/// Not reentrant: drive a reducer to a terminal phase before starting the next
/// turn against the same store. Terminal phases are final; later events are
/// ignored, so a repeated `end` can never commit twice.
#[derive(Debug)]
pub struct TurnReducer {
    config: ReducerConfig,
    buffer: String,
    tool_notices: Vec<String>,
    phase: Phase,
    events_seen: usize,
}

impl TurnReducer {
    pub fn new(config: ReducerConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            tool_notices: Vec::new(),
            phase: Phase::Streaming,
            events_seen: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn tool_notices(&self) -> &[String] {
        &self.tool_notices
    }

    /// Events applied while streaming (ignored post-terminal events not counted).
    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn apply(&mut self, event: StreamEvent, store: &mut TranscriptStore) -> Option<Effect> {
        if self.phase.is_terminal() {
            debug!(phase = self.phase.as_str(), ?event, "ignoring event after terminal phase");
            return None;
        }
        self.events_seen += 1;

        match event {
            StreamEvent::Content(delta) => {
                self.buffer.push_str(&delta);
                Some(Effect::Render(self.buffer.clone()))
            }
            StreamEvent::ToolStart { name, input } => {
                self.notice(format!("Using tool '{name}' with input: {input}"))
            }
            StreamEvent::ToolEnd { name, output } => self.notice(match name {
                Some(name) => format!("Tool '{name}' finished: {output}"),
                None => format!("Tool finished: {output}"),
            }),
            StreamEvent::Error { kind, message } => {
                warn!(kind = kind.as_str(), %message, "turn failed");
                Some(self.fail())
            }
            StreamEvent::End => {
                let turn = Turn::assistant(std::mem::take(&mut self.buffer));
                store.append(turn.clone());
                self.phase = Phase::Committed;
                debug!(chars = turn.content.len(), "assistant turn committed");
                Some(Effect::Committed(turn))
            }
        }
    }

    /// Force the failed phase (cancellation, timeout). No-op once terminal.
    pub fn abort(&mut self) -> Option<Effect> {
        if self.phase.is_terminal() {
            return None;
        }
        Some(self.fail())
    }

    fn fail(&mut self) -> Effect {
        self.phase = Phase::Failed;
        self.buffer.clear();
        Effect::Render(self.config.fallback_message.clone())
    }

    fn notice(&mut self, notice: String) -> Option<Effect> {
        self.tool_notices.push(notice.clone());
        if self.config.show_tool_notices {
            Some(Effect::Notify(notice))
        } else {
            debug!(%notice, "tool notice hidden");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::stream::StreamErrorKind;
    use serde_json::json;

    fn run(reducer: &mut TurnReducer, store: &mut TranscriptStore, events: Vec<StreamEvent>) -> Vec<Effect> {
        events.into_iter().filter_map(|e| reducer.apply(e, store)).collect()
    }

    #[test]
    fn commits_concatenation_of_deltas() {
        let mut store = TranscriptStore::new();
        store.push_human("book me in");
        let mut r = TurnReducer::new(ReducerConfig::default());
        let effects = run(
            &mut r,
            &mut store,
            vec![
                StreamEvent::Content("Booked ".into()),
                StreamEvent::Content("".into()),
                StreamEvent::Content("for 9am.".into()),
                StreamEvent::End,
            ],
        );

        assert_eq!(effects[0], Effect::Render("Booked ".into()));
        assert_eq!(effects[2], Effect::Render("Booked for 9am.".into()));
        assert_eq!(effects[3], Effect::Committed(Turn::assistant("Booked for 9am.")));
        assert_eq!(r.phase(), Phase::Committed);
        assert_eq!(store.len(), 2);
        assert_eq!(store.last().map(|t| t.role), Some(Role::Assistant));
    }

    #[test]
    fn double_end_commits_once() {
        let mut store = TranscriptStore::new();
        let mut r = TurnReducer::new(ReducerConfig::default());
        let effects = run(
            &mut r,
            &mut store,
            vec![StreamEvent::Content("x".into()), StreamEvent::End, StreamEvent::End],
        );
        assert_eq!(effects.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(r.events_seen(), 2);
    }

    #[test]
    fn tool_events_notify_without_touching_buffer() {
        let mut store = TranscriptStore::new();
        let mut r = TurnReducer::new(ReducerConfig::default());
        let effects = run(
            &mut r,
            &mut store,
            vec![
                StreamEvent::Content("Let me check.".into()),
                StreamEvent::ToolStart { name: "calendar".into(), input: json!({"day": "mon"}) },
                StreamEvent::ToolEnd { name: None, output: "9am free".into() },
            ],
        );
        assert_eq!(
            effects[1],
            Effect::Notify(r#"Using tool 'calendar' with input: {"day":"mon"}"#.into())
        );
        assert_eq!(effects[2], Effect::Notify("Tool finished: 9am free".into()));
        assert_eq!(r.buffer(), "Let me check.");
        assert_eq!(r.tool_notices().len(), 2);
        assert_eq!(r.phase(), Phase::Streaming);
    }

    #[test]
    fn hidden_tool_notices_are_still_recorded() {
        let mut store = TranscriptStore::new();
        let mut r = TurnReducer::new(ReducerConfig { show_tool_notices: false, ..Default::default() });
        let effects = run(
            &mut r,
            &mut store,
            vec![StreamEvent::ToolEnd { name: Some("calc".into()), output: "4".into() }],
        );
        assert!(effects.is_empty());
        assert_eq!(r.tool_notices(), ["Tool 'calc' finished: 4".to_string()]);
    }

    #[test]
    fn error_renders_fallback_and_never_commits() {
        let mut store = TranscriptStore::new();
        store.push_human("hi");
        let before = store.len();
        let mut r = TurnReducer::new(ReducerConfig { fallback_message: "oops".into(), ..Default::default() });
        let effects = run(
            &mut r,
            &mut store,
            vec![
                StreamEvent::Content("partial".into()),
                StreamEvent::error(StreamErrorKind::Transport, "reset"),
                StreamEvent::Content("more".into()),
                StreamEvent::End,
            ],
        );
        assert_eq!(effects.last(), Some(&Effect::Render("oops".into())));
        assert_eq!(r.phase(), Phase::Failed);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn abort_is_noop_after_commit() {
        let mut store = TranscriptStore::new();
        let mut r = TurnReducer::new(ReducerConfig::default());
        r.apply(StreamEvent::End, &mut store);
        assert_eq!(r.abort(), None);
        assert_eq!(r.phase(), Phase::Committed);

        let mut r = TurnReducer::new(ReducerConfig::default());
        assert_eq!(r.abort(), Some(Effect::Render(DEFAULT_FALLBACK.into())));
        assert_eq!(r.phase(), Phase::Failed);
    }

    #[derive(Default)]
    struct Recorder {
        renders: Vec<String>,
        notices: Vec<String>,
        commits: usize,
    }

    impl TurnObserver for Recorder {
        fn render(&mut self, text: &str) {
            self.renders.push(text.to_string());
        }
        fn notify(&mut self, notice: &str) {
            self.notices.push(notice.to_string());
        }
        fn committed(&mut self, _turn: &Turn) {
            self.commits += 1;
        }
    }

    #[test]
    fn effects_dispatch_to_observer() {
        let mut rec = Recorder::default();
        Effect::Render("a".into()).dispatch(&mut rec);
        Effect::Notify("n".into()).dispatch(&mut rec);
        Effect::Committed(Turn::assistant("a")).dispatch(&mut rec);
        assert_eq!(rec.renders, vec!["a"]);
        assert_eq!(rec.notices, vec!["n"]);
        assert_eq!(rec.commits, 1);
    }
}
