//! One conversation: owns the transcript and drives each turn from user
//! input through the transport, decoder and reducer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tracing::{debug, field, info_span, warn};
use tracing_futures::Instrument;

use crate::config::Config;
use crate::decoder::EventStream;
use crate::error::{ChatWireError, CoreResult};
use crate::http_client::HttpClient;
use crate::model::{ChatRequest, Turn};
use crate::normalizer::normalize_input;
use crate::reducer::{Phase, ReducerConfig, TurnObserver, TurnReducer};
use crate::stream::{StreamErrorKind, StreamEvent};
use crate::telemetry::{self, TurnTrace};
use crate::transcript::TranscriptStore;
use crate::transport::{ChatTransport, HttpTransport};

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Committed(Turn),
    /// Nothing was committed for the assistant; the fallback text was rendered.
    Failed { kind: String, reason: String },
}

impl TurnOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    transcript: TranscriptStore,
    reducer_cfg: ReducerConfig,
    idle_timeout: Duration,
    user_id: Option<String>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, reducer_cfg: ReducerConfig) -> Self {
        Self {
            transport,
            transcript: TranscriptStore::new(),
            reducer_cfg,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            user_id: None,
        }
    }

    /// Session talking HTTP to the configured endpoint.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        cfg.validate()?;
        let http = HttpClient::from_cfg(&cfg.http)?;
        let transport = Arc::new(HttpTransport::new(http, cfg.endpoint.url.clone()));
        Ok(Self::new(transport, ReducerConfig::from(&cfg.display))
            .with_idle_timeout(Duration::from_millis(cfg.http.idle_timeout_ms))
            .with_user_id(cfg.endpoint.user_id.clone()))
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    /// Seed the conversation, e.g. with a system prompt.
    pub fn append(&mut self, turn: Turn) {
        self.transcript.append(turn);
    }

    pub fn reset(&mut self) {
        self.transcript.reset();
    }

    /// Run one full turn. Only blank input is an `Err`; transport and stream
    /// failures are reported as `TurnOutcome::Failed` after the observer has
    /// been shown the fallback text.
    ///
    /// Taking `&mut self` keeps turns strictly sequential. Dropping the
    /// returned future cancels the turn and leaves no assistant entry behind.
    pub async fn send(&mut self, input: &str, observer: &mut dyn TurnObserver) -> CoreResult<TurnOutcome> {
        let text = normalize_input(input)?;
        self.transcript.push_human(text);

        let turn_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!(
            "chat_turn",
            turn.id = %turn_id,
            turn.transport = self.transport.name(),
            turn.outcome = field::Empty,
            turn.events = field::Empty,
            turn.chars = field::Empty,
            turn.tool_notices = field::Empty,
            latency.ms = field::Empty,
            error.kind = field::Empty,
        );
        let outcome = self.run_turn(&turn_id, observer).instrument(span).await;
        Ok(outcome)
    }

    async fn run_turn(&mut self, turn_id: &str, observer: &mut dyn TurnObserver) -> TurnOutcome {
        let start = Instant::now();
        let req = ChatRequest::new(self.transcript.snapshot()).with_user_id(self.user_id.clone());
        let mut reducer = TurnReducer::new(self.reducer_cfg.clone());

        let body = match self.transport.open(&req, turn_id).await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "could not open response stream");
                if let Some(effect) = reducer.abort() {
                    effect.dispatch(observer);
                }
                return self.finish(turn_id, &reducer, start, Some((err.kind().to_string(), err.to_string())));
            }
        };

        let mut events = EventStream::new(body);
        let mut failure: Option<(String, String)> = None;
        while !reducer.phase().is_terminal() {
            let event = match tokio::time::timeout(self.idle_timeout, events.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    let err = ChatWireError::Timeout { after_ms: self.idle_timeout.as_millis() as u64 };
                    StreamEvent::error(StreamErrorKind::Timeout, err.to_string())
                }
            };
            if let StreamEvent::Error { kind, message } = &event {
                failure = Some((kind.as_str().to_string(), message.clone()));
            }
            if let Some(effect) = reducer.apply(event, &mut self.transcript) {
                effect.dispatch(observer);
            }
        }

        if !reducer.phase().is_terminal() {
            // EventStream always ends with `End`; this only guards against a bare stream.
            debug!("event stream ended while still streaming");
            if let Some(effect) = reducer.abort() {
                effect.dispatch(observer);
            }
            failure.get_or_insert(("transport".into(), "stream ended unexpectedly".into()));
        }
        // Dropping `events` here closes the connection if it is still open.
        self.finish(turn_id, &reducer, start, failure)
    }

    fn finish(
        &self,
        turn_id: &str,
        reducer: &TurnReducer,
        start: Instant,
        failure: Option<(String, String)>,
    ) -> TurnOutcome {
        let latency_ms = start.elapsed().as_millis() as u64;
        let outcome = match (reducer.phase(), self.transcript.last()) {
            (Phase::Committed, Some(turn)) => TurnOutcome::Committed(turn.clone()),
            _ => {
                let (kind, reason) = failure.unwrap_or_else(|| ("unknown".into(), "turn failed".into()));
                TurnOutcome::Failed { kind, reason }
            }
        };

        let chars = match &outcome {
            TurnOutcome::Committed(turn) => turn.content.len(),
            TurnOutcome::Failed { .. } => 0,
        };
        let error = match &outcome {
            TurnOutcome::Failed { kind, reason } => Some((kind.as_str(), reason.as_str())),
            TurnOutcome::Committed(_) => None,
        };

        let span = tracing::Span::current();
        span.record(telemetry::KEY_OUTCOME, reducer.phase().as_str());
        span.record(telemetry::KEY_EVENTS, reducer.events_seen() as u64);
        span.record(telemetry::KEY_CHARS, chars as u64);
        span.record(telemetry::KEY_TOOL_NOTICES, reducer.tool_notices().len() as u64);
        span.record(telemetry::KEY_LATENCY_MS, latency_ms);
        if let Some((kind, _)) = error {
            span.record(telemetry::KEY_ERROR_KIND, kind);
        }

        telemetry::emit(
            TurnTrace::new()
                .turn_id(turn_id)
                .transport(self.transport.name())
                .outcome(reducer.phase().as_str())
                .counts(reducer.events_seen(), chars, reducer.tool_notices().len())
                .latency_ms(latency_ms)
                .error_kind_opt(error.map(|(k, _)| k))
                .error_message_opt(error.map(|(_, m)| m)),
        );
        outcome
    }
}
