use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::HttpCfg;
use crate::error::{ChatWireError, CoreResult};
use crate::transport::ByteStream;

/// Request context carries tracing IDs.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
    pub turn_id: Option<&'a str>,
}

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| ChatWireError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: concat!("chatwire/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// POST JSON and return the raw response body as it arrives.
    /// Non-2xx statuses are mapped to errors before any body is read as a stream.
    pub async fn post_event_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<ByteStream> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");

        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }
        if let Some(tid) = ctx.turn_id {
            req = req.header("X-Turn-Id", tid);
        }

        let resp = req.send().await.map_err(|e| ChatWireError::Transport {
            status: None,
            message: format!("request failed: {e}"),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let ra = parse_retry_after(&headers);
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, ra, &body));
        }

        let byte_stream = resp.bytes_stream().map(|chunk| {
            chunk.map_err(|e| ChatWireError::Transport {
                status: None,
                message: e.to_string(),
            })
        });
        Ok(Box::pin(byte_stream))
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Some(secs);
    }
    // HTTP-date forms are ignored.
    None
}

fn map_http_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> ChatWireError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ChatWireError::RateLimited { retry_after },
        s if s.is_server_error() => ChatWireError::Unavailable,
        s => ChatWireError::Transport {
            status: Some(s.as_u16()),
            message: truncate(body, 300),
        },
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut t = s[..idx].to_string();
            t.push_str("...");
            t
        }
        None => s.to_string(),
    }
}
