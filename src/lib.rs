//! Client side of a keyword search service with a streamed AI answer.
//!
//! [`SearchOrchestrator`] is the entry point: it submits searches, pages
//! through the results, fetches query suggestions and keeps at most one
//! answer stream open at a time.

pub mod api_client;
pub mod app_state_container;
pub mod config;
pub mod data;
pub mod debouncer;
pub mod error;
pub mod highlight;
pub mod services;
pub mod streaming;
pub mod utils;

pub use api_client::{ApiClient, Query, SearchBackend, SearchMode, SearchResponse, SearchResult};
pub use app_state_container::AppStateContainer;
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use services::{SearchOrchestrator, SubmitOutcome};
pub use streaming::{StreamLifecycle, StreamState, StreamTextAccumulator};
