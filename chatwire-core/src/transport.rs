use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};

use crate::error::{ChatWireError, CoreResult};
use crate::http_client::{HttpClient, RequestCtx};
use crate::model::ChatRequest;

/// Raw response body, fragment by fragment, in network delivery order.
pub type ByteStream = Pin<Box<dyn Stream<Item = CoreResult<Bytes>> + Send>>;

/// Something that can carry a chat request to the backend and hand back the
/// response body. The decoder sits on top of any implementation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;
    async fn open(&self, req: &ChatRequest, turn_id: &str) -> CoreResult<ByteStream>;
}

/// Streaming HTTP POST to a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    url: String,
}

impl HttpTransport {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, req: &ChatRequest, turn_id: &str) -> CoreResult<ByteStream> {
        let ctx = RequestCtx { request_id: None, turn_id: Some(turn_id) };
        self.http.post_event_stream(&self.url, req, &ctx).await
    }
}

/// Replays a fixed body, optionally cut into fragments, for every request.
/// An `Err` fragment simulates the connection dropping at that point.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    fragments: Vec<Result<Vec<u8>, String>>,
}

impl ScriptedTransport {
    pub fn new<I, F>(fragments: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Vec<u8>>,
    {
        Self { fragments: fragments.into_iter().map(|f| Ok(f.into())).collect() }
    }

    /// Append a transport failure after the fragments so far.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.fragments.push(Err(message.into()));
        self
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, _req: &ChatRequest, _turn_id: &str) -> CoreResult<ByteStream> {
        let items: Vec<CoreResult<Bytes>> = self
            .fragments
            .iter()
            .map(|f| match f {
                Ok(bytes) => Ok(Bytes::from(bytes.clone())),
                Err(message) => Err(ChatWireError::Transport { status: None, message: message.clone() }),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Turn;
    use futures::StreamExt;

    #[tokio::test]
    async fn scripted_transport_replays_fragments_then_failure() {
        let t = ScriptedTransport::new(["ab", "c"]).then_fail("gone");
        let req = ChatRequest::new(&[Turn::human("hi")]);
        let items: Vec<_> = t.open(&req, "turn-1").await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &Bytes::from_static(b"ab"));
        assert_eq!(items[1].as_ref().unwrap(), &Bytes::from_static(b"c"));
        assert!(matches!(items[2], Err(ChatWireError::Transport { .. })));
        assert_eq!(t.name(), "scripted");
    }
}
