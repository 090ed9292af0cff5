//! Lifecycle of the streamed answer.
//!
//! At most one session is live at a time. Each session gets a fresh
//! [`SessionId`]; its reader task forwards events tagged with that id, and
//! events whose id is no longer current are dropped. A superseded session
//! can therefore never write into the buffer of a newer one.

use super::accumulator::{is_done_sentinel, StreamTextAccumulator};
use super::event_source::{PushConnector, PushEvent, PushEventSource};
use super::markdown::RenderChain;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_APOLOGY: &str =
    "Sorry, something went wrong while generating the answer. Please try again later.";
pub const DEFAULT_CONNECT_FAILURE: &str = "Unable to connect to the AI service.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl StreamState {
    /// Pure transition function.
    ///
    /// `buffer_empty` matters only when the server hangs up without the
    /// sentinel: with nothing received that is a failure, otherwise the
    /// answer is simply complete.
    pub fn on_event(self, event: &PushEvent, buffer_empty: bool) -> StreamState {
        use StreamState::*;
        match (self, event) {
            (Connecting, PushEvent::Open) => Open,
            (Connecting | Open, PushEvent::Message(data)) if is_done_sentinel(data) => Closed,
            (Connecting | Open, PushEvent::Message(_)) => Open,
            (Connecting | Open, PushEvent::Error(_)) => Errored,
            (Connecting | Open, PushEvent::Closed) if buffer_empty => Errored,
            (Connecting | Open, PushEvent::Closed) => Closed,
            (state, _) => state,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, StreamState::Connecting | StreamState::Open)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Errored)
    }
}

/// User-visible replacement texts
#[derive(Debug, Clone)]
pub struct StreamMessages {
    pub apology: String,
    pub connect_failure: String,
}

impl Default for StreamMessages {
    fn default() -> Self {
        Self {
            apology: DEFAULT_APOLOGY.to_string(),
            connect_failure: DEFAULT_CONNECT_FAILURE.to_string(),
        }
    }
}

struct ActiveSession {
    id: SessionId,
    query: String,
    reader: JoinHandle<()>,
}

type TaggedEvent = (SessionId, PushEvent);

pub struct StreamLifecycle {
    connector: Arc<dyn PushConnector>,
    accumulator: StreamTextAccumulator,
    renderer: RenderChain,
    messages: StreamMessages,
    state: StreamState,
    loading: bool,
    session: Option<ActiveSession>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    rendered_tx: watch::Sender<String>,
}

impl StreamLifecycle {
    pub fn new(connector: Arc<dyn PushConnector>) -> Self {
        Self::with_messages(connector, StreamMessages::default())
    }

    pub fn with_messages(connector: Arc<dyn PushConnector>, messages: StreamMessages) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (rendered_tx, _) = watch::channel(String::new());
        Self {
            connector,
            accumulator: StreamTextAccumulator::new(),
            renderer: RenderChain::default(),
            messages,
            state: StreamState::Idle,
            loading: false,
            session: None,
            next_id: 0,
            events_tx,
            events_rx,
            rendered_tx,
        }
    }

    pub fn with_renderer(mut self, renderer: RenderChain) -> Self {
        self.renderer = renderer;
        self
    }

    /// Open a session for `query`, closing any live one first.
    ///
    /// Must be called from within a tokio runtime: the reader runs as a
    /// spawned task.
    pub fn start(&mut self, query: &str) -> SessionId {
        self.stop();

        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.accumulator.clear();
        self.loading = true;
        self.state = StreamState::Connecting;

        match self.connector.connect(query) {
            Ok(source) => {
                info!(target: "stream", "session {} started for '{}'", id, query);
                let reader = tokio::spawn(forward_events(id, source, self.events_tx.clone()));
                self.session = Some(ActiveSession {
                    id,
                    query: query.to_string(),
                    reader,
                });
            }
            Err(e) => {
                warn!(target: "stream", "session {} could not connect: {}", id, e);
                self.loading = false;
                self.state = StreamState::Errored;
                self.accumulator.replace(&self.messages.connect_failure);
            }
        }

        self.publish();
        id
    }

    /// Close the live session, if any. No-op otherwise.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.reader.abort();
        self.accumulator.finish();
        self.loading = false;
        if self.state.is_live() {
            self.state = StreamState::Closed;
        }
        info!(target: "stream", "session {} stopped", session.id);
        self.publish();
    }

    /// Apply one tagged event. Returns false when it was dropped.
    pub fn apply(&mut self, id: SessionId, event: PushEvent) -> bool {
        match &self.session {
            Some(session) if session.id == id => {}
            _ => {
                debug!(target: "stream", "dropping event from stale session {}", id);
                return false;
            }
        }

        let next = self
            .state
            .on_event(&event, self.accumulator.is_empty());

        match event {
            PushEvent::Open => {
                debug!(target: "stream", "session {} open", id);
            }
            PushEvent::Message(data) => {
                self.loading = false;
                if is_done_sentinel(&data) {
                    info!(target: "stream", "session {} finished", id);
                    self.accumulator.finish();
                } else {
                    self.accumulator.append(&data);
                }
            }
            PushEvent::Error(reason) => {
                warn!(target: "stream", "session {} failed: {}", id, reason);
                self.fail_or_finish();
            }
            PushEvent::Closed => {
                debug!(target: "stream", "session {} closed by server", id);
                self.fail_or_finish();
            }
        }

        self.state = next;
        if next.is_terminal() {
            self.release();
        }
        self.publish();
        true
    }

    /// Apply everything already queued without waiting
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((id, event)) = self.events_rx.try_recv() {
            if self.apply(id, event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next event of the live session and apply it.
    /// `None` once no session is live.
    pub async fn next_update(&mut self) -> Option<StreamState> {
        loop {
            if self.session.is_none() {
                // Discard anything a superseded reader left behind
                while self.events_rx.try_recv().is_ok() {}
                return None;
            }
            let (id, event) = self.events_rx.recv().await?;
            if self.apply(id, event) {
                return Some(self.state);
            }
        }
    }

    /// Drive the live session until it closes or fails
    pub async fn run_to_end(&mut self) -> StreamState {
        while self.next_update().await.is_some() {}
        self.state
    }

    /// Wait for the next tagged event without applying it
    pub async fn recv(&mut self) -> Option<(SessionId, PushEvent)> {
        self.events_rx.recv().await
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn current_query(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.query.as_str())
    }

    /// The repaired markdown received so far
    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    /// The answer as markup
    pub fn rendered(&self) -> String {
        self.renderer.render(self.accumulator.text())
    }

    /// Receives the rendered answer after every change
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.rendered_tx.subscribe()
    }

    /// Forget the answer entirely; stops a live session first
    pub fn reset(&mut self) {
        self.stop();
        self.accumulator.clear();
        self.state = StreamState::Idle;
        self.loading = false;
        self.publish();
    }

    fn fail_or_finish(&mut self) {
        self.loading = false;
        if self.accumulator.is_empty() {
            self.accumulator.replace(&self.messages.apology);
        } else {
            self.accumulator.finish();
        }
    }

    fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
        }
    }

    fn publish(&self) {
        self.rendered_tx.send_replace(self.rendered());
    }
}

impl Drop for StreamLifecycle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reader task: pull from the source until it ends, tagging every event
async fn forward_events(
    id: SessionId,
    mut source: Box<dyn PushEventSource>,
    tx: mpsc::UnboundedSender<TaggedEvent>,
) {
    while let Some(event) = source.next_event().await {
        let last = event.ends_connection();
        if tx.send((id, event)).is_err() || last {
            return;
        }
    }
    // Source dried up without saying so
    let _ = tx.send((id, PushEvent::Closed));
}
