//! The push-event capability behind the answer stream.
//!
//! [`StreamLifecycle`](super::lifecycle::StreamLifecycle) only ever sees
//! [`PushEvent`]s. Server-sent events over HTTP are the default transport;
//! [`ChannelConnector`] lets a host feed events from any other transport
//! (a websocket it already owns, long polling, a recorded session).

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::debug;

/// What a push connection can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The server acknowledged the connection
    Open,
    /// One event payload, verbatim
    Message(String),
    /// Transport failure; the connection is unusable afterwards
    Error(String),
    /// The server ended the stream
    Closed,
}

impl PushEvent {
    /// Whether nothing can follow this event on the same connection
    pub fn ends_connection(&self) -> bool {
        match self {
            PushEvent::Error(_) | PushEvent::Closed => true,
            PushEvent::Message(data) => super::accumulator::is_done_sentinel(data),
            PushEvent::Open => false,
        }
    }
}

/// One live connection. Dropping it releases the underlying resource.
#[async_trait]
pub trait PushEventSource: Send {
    /// `None` once the source has nothing more to report
    async fn next_event(&mut self) -> Option<PushEvent>;
}

/// Opens push connections for a query
pub trait PushConnector: Send + Sync {
    fn connect(&self, query: &str) -> ClientResult<Box<dyn PushEventSource>>;
}

type SseStream = Pin<
    Box<
        dyn Stream<Item = Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>>
            + Send,
    >,
>;

enum SseState {
    Pending,
    Streaming(SseStream),
    Finished,
}

/// Event type of frames without an `event:` field
const MESSAGE_EVENT: &str = "message";

/// Server-sent events from `GET {base}/api/ai-stream?query=...`
pub struct SseConnector {
    api: ApiClient,
    client: reqwest::Client,
}

impl SseConnector {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            client: reqwest::Client::new(),
        }
    }
}

impl PushConnector for SseConnector {
    fn connect(&self, query: &str) -> ClientResult<Box<dyn PushEventSource>> {
        let url = self.api.ai_stream_url(query);
        reqwest::Url::parse(&url)
            .map_err(|e| ClientError::Config(format!("{}: {}", url, e)))?;
        Ok(Box::new(SseEventSource {
            client: self.client.clone(),
            url,
            state: SseState::Pending,
        }))
    }
}

/// The request is sent lazily on the first `next_event` call so that
/// connecting never blocks the caller
pub struct SseEventSource {
    client: reqwest::Client,
    url: String,
    state: SseState,
}

impl SseEventSource {
    async fn open(&mut self) -> PushEvent {
        debug!(target: "stream", "GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                self.state = SseState::Streaming(Box::pin(response.bytes_stream().eventsource()));
                PushEvent::Open
            }
            Ok(response) => {
                self.state = SseState::Finished;
                PushEvent::Error(format!("HTTP status {}", response.status()))
            }
            Err(e) => {
                self.state = SseState::Finished;
                PushEvent::Error(e.to_string())
            }
        }
    }
}

#[async_trait]
impl PushEventSource for SseEventSource {
    async fn next_event(&mut self) -> Option<PushEvent> {
        if matches!(self.state, SseState::Pending) {
            return Some(self.open().await);
        }

        let next = loop {
            let next = match &mut self.state {
                SseState::Streaming(stream) => stream.next().await,
                _ => return None,
            };
            // Answer text arrives as `message` events; pings and other
            // named events are skipped
            match next {
                Some(Ok(event)) if event.event != MESSAGE_EVENT => {
                    debug!(target: "stream", "skipping '{}' event", event.event);
                }
                other => break other,
            }
        };

        match next {
            Some(Ok(event)) => Some(PushEvent::Message(event.data)),
            Some(Err(e)) => {
                self.state = SseState::Finished;
                Some(PushEvent::Error(e.to_string()))
            }
            None => {
                self.state = SseState::Finished;
                Some(PushEvent::Closed)
            }
        }
    }
}

/// Handed to the host for every connection opened through a
/// [`ChannelConnector`]
#[derive(Debug)]
pub struct ChannelSession {
    pub query: String,
    pub events: mpsc::UnboundedSender<PushEvent>,
}

/// Connector whose events are pushed by the host application
pub struct ChannelConnector {
    sessions: mpsc::UnboundedSender<ChannelSession>,
}

impl ChannelConnector {
    /// The receiver yields one [`ChannelSession`] per `connect` call
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelSession>) {
        let (sessions, handoff) = mpsc::unbounded_channel();
        (Self { sessions }, handoff)
    }
}

impl PushConnector for ChannelConnector {
    fn connect(&self, query: &str) -> ClientResult<Box<dyn PushEventSource>> {
        let (events, receiver) = mpsc::unbounded_channel();
        self.sessions
            .send(ChannelSession {
                query: query.to_string(),
                events,
            })
            .map_err(|_| ClientError::Transport("push host has gone away".into()))?;
        Ok(Box::new(ChannelEventSource { receiver }))
    }
}

pub struct ChannelEventSource {
    receiver: mpsc::UnboundedReceiver<PushEvent>,
}

#[async_trait]
impl PushEventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }
}
