//! The streamed AI answer: transport, lifecycle, accumulation and rendering

pub mod accumulator;
pub mod event_source;
pub mod lifecycle;
pub mod markdown;

pub use accumulator::{repair_markdown, StreamTextAccumulator, DONE_SENTINEL};
pub use event_source::{
    ChannelConnector, ChannelSession, PushConnector, PushEvent, PushEventSource, SseConnector,
};
pub use lifecycle::{SessionId, StreamLifecycle, StreamMessages, StreamState};
pub use markdown::{LineRenderer, MarkdownRenderer, PulldownRenderer, RenderChain};
