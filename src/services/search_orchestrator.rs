use crate::api_client::{ApiClient, Query, SearchBackend, SearchMode, SearchResponse};
use crate::app_state_container::AppStateContainer;
use crate::config::{Config, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use crate::debouncer::Debouncer;
use crate::error::{ClientError, ClientResult};
use crate::streaming::{PushConnector, SseConnector, StreamLifecycle, StreamState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a submitted search ended
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank query, nothing happened
    Ignored,
    /// Results applied; `total` is the backend's declared count
    Completed { received: usize, total: u64 },
    /// The request failed and an empty result set is shown
    Failed(ClientError),
    /// A newer search was started before this one finished
    Superseded,
}

/// Handed out by [`SearchOrchestrator::begin_search`] and redeemed by
/// [`SearchOrchestrator::complete_search`]
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    query: Query,
}

impl SearchTicket {
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Clears the loading flag however the request ends, cancellation included
struct LoadingGuard<'a>(&'a mut AppStateContainer);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_loading(false);
    }
}

/// Drives a search from submission to rendered results, alongside the
/// streamed AI answer and query suggestions
pub struct SearchOrchestrator {
    backend: Arc<dyn SearchBackend>,
    stream: StreamLifecycle,
    state: AppStateContainer,
    preferences: Box<dyn PreferenceStore>,
    suggestion_debouncer: Debouncer<String>,
}

impl SearchOrchestrator {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        connector: Arc<dyn PushConnector>,
        preferences: Box<dyn PreferenceStore>,
        config: &Config,
    ) -> Self {
        let saved = match preferences.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(target: "search", "could not load preferences, using defaults: {}", e);
                None
            }
        };
        let prefs = saved.unwrap_or_else(|| crate::config::Preferences {
            ai_search_enabled: config.stream.enabled_by_default,
            ..Default::default()
        });

        Self {
            backend,
            stream: StreamLifecycle::with_messages(connector, config.stream.messages()),
            state: AppStateContainer::new(
                config.paging.page_size,
                config.paging.result_count_cap,
                prefs,
            ),
            preferences,
            suggestion_debouncer: Debouncer::new(config.suggestions.debounce_ms),
        }
    }

    /// Wire the HTTP backend, the event-stream transport and the preference
    /// file from a loaded config
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let api = ApiClient::with_timeout(&config.api.base_url, config.api.request_timeout())?;
        let connector = Arc::new(SseConnector::new(api.clone()));
        let preferences: Box<dyn PreferenceStore> = match FilePreferenceStore::default_location() {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!(target: "search", "no preference location, keeping them in memory: {}", e);
                Box::new(MemoryPreferenceStore::new())
            }
        };
        Ok(Self::new(Arc::new(api), connector, preferences, config))
    }

    // --- search ---

    /// Run a search end to end. While the request is in flight, answer
    /// events keep being applied.
    pub async fn submit(&mut self, text: &str, mode: SearchMode) -> SubmitOutcome {
        let Some(ticket) = self.begin_search(text, mode) else {
            return SubmitOutcome::Ignored;
        };

        let backend = Arc::clone(&self.backend);
        let result = {
            let _loading = LoadingGuard(&mut self.state);
            let stream = &mut self.stream;
            let fetch = backend.search(&ticket.query);
            tokio::pin!(fetch);

            loop {
                tokio::select! {
                    result = &mut fetch => break result,
                    Some((id, event)) = stream.recv(), if stream.is_live() => {
                        stream.apply(id, event);
                    }
                }
            }
        };

        self.complete_search(ticket, result)
    }

    /// First half of a search: reset the view, start the answer stream and
    /// return a ticket for the request. `None` for a blank query.
    pub fn begin_search(&mut self, text: &str, mode: SearchMode) -> Option<SearchTicket> {
        let Some(query) = Query::new(text, mode) else {
            debug!(target: "search", "ignoring blank query");
            return None;
        };

        let generation = self.state.begin_search(&query);
        self.suggestion_debouncer.reset();
        info!(target: "search", "search #{} for '{}' ({})", generation, query.trimmed(), mode);

        if self.state.preferences().ai_search_enabled {
            self.state.set_show_ai_response(true);
            self.stream.start(query.trimmed());
        } else {
            self.close_ai_response();
        }

        Some(SearchTicket { generation, query })
    }

    /// Second half of a search. Results for anything but the latest search
    /// are dropped.
    pub fn complete_search(
        &mut self,
        ticket: SearchTicket,
        result: ClientResult<SearchResponse>,
    ) -> SubmitOutcome {
        if ticket.generation != self.state.search_generation() {
            debug!(
                target: "search",
                "dropping response of search #{} (current #{})",
                ticket.generation,
                self.state.search_generation()
            );
            return SubmitOutcome::Superseded;
        }

        self.state.set_loading(false);
        match result {
            Ok(response) => {
                let received = response.results.len();
                let total = response.count;
                info!(
                    target: "search",
                    "search #{} returned {} results ({} declared)",
                    ticket.generation, received, total
                );
                self.state.apply_results(response);
                SubmitOutcome::Completed { received, total }
            }
            Err(e) => {
                warn!(target: "search", kind = e.kind(), "search #{} failed: {}", ticket.generation, e);
                self.state.apply_failure();
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Show page `page`. Out-of-range pages are ignored.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        let moved = self.state.set_page(page);
        if moved {
            debug!(target: "search", "page {}/{}", page, self.state.total_pages());
        }
        moved
    }

    pub fn clear_search(&mut self) {
        self.state.clear_search();
    }

    // --- suggestions ---

    /// Fetch suggestions for the last submitted query. No-op before the
    /// first search; failures leave an empty list.
    pub async fn show_query_suggestions(&mut self) -> &[String] {
        let last = self.state.query().last_submitted.clone();
        if last.is_empty() {
            return &self.state.suggestions().items;
        }

        self.state.begin_suggestions();
        let items = match self.backend.query_suggestions(&last).await {
            Ok(items) => {
                debug!(target: "suggest", "{} suggestions for '{}'", items.len(), last);
                items
            }
            Err(e) => {
                warn!(target: "suggest", kind = e.kind(), "suggestions for '{}' failed: {}", last, e);
                Vec::new()
            }
        };
        self.state.finish_suggestions(items);
        &self.state.suggestions().items
    }

    /// Ask for suggestions once the debounce delay has passed without
    /// another request
    pub fn request_suggestions(&mut self) {
        let last = self.state.query().last_submitted.clone();
        if !last.is_empty() {
            self.suggestion_debouncer.trigger(last);
        }
    }

    /// Wait out a pending [`request_suggestions`](Self::request_suggestions)
    /// and fetch. Returns false when nothing was pending or a newer search
    /// made the request stale.
    pub async fn flush_suggestions(&mut self) -> bool {
        let Some(query) = self.suggestion_debouncer.settle().await else {
            return false;
        };
        if query != self.state.query().last_submitted {
            return false;
        }
        self.show_query_suggestions().await;
        true
    }

    /// Search for a suggestion with the current mode
    pub async fn select_suggestion(&mut self, suggestion: &str) -> SubmitOutcome {
        self.state.hide_suggestions();
        self.state.set_query_text(suggestion);
        let mode = self.state.query().mode;
        self.submit(suggestion, mode).await
    }

    pub fn hide_suggestions(&mut self) {
        self.state.hide_suggestions();
    }

    // --- answer panel and preferences ---

    /// Turn the AI answer on or off and remember the choice. Turning it on
    /// after a search streams an answer for that search.
    pub fn toggle_ai_search(&mut self) -> bool {
        let enabled = !self.state.preferences().ai_search_enabled;
        self.state.preferences_mut().ai_search_enabled = enabled;
        self.persist_preferences();
        info!(target: "search", "AI answer {}", if enabled { "enabled" } else { "disabled" });

        if !enabled {
            self.close_ai_response();
        } else if self.state.has_searched() {
            let text = self.state.query().last_submitted.trim().to_string();
            if !text.is_empty() {
                self.state.set_show_ai_response(true);
                self.stream.start(&text);
            }
        }
        enabled
    }

    pub fn toggle_dark_mode(&mut self) -> bool {
        let dark = !self.state.preferences().dark_mode;
        self.state.preferences_mut().dark_mode = dark;
        self.persist_preferences();
        dark
    }

    /// Hide the answer panel and close its stream
    pub fn close_ai_response(&mut self) {
        self.state.set_show_ai_response(false);
        self.stream.stop();
    }

    fn persist_preferences(&self) {
        if let Err(e) = self.preferences.save(&self.state.preferences()) {
            warn!(target: "search", "could not save preferences: {}", e);
        }
    }

    // --- answer stream ---

    /// Apply answer events that already arrived
    pub fn pump_stream(&mut self) -> usize {
        self.stream.pump()
    }

    /// Wait for the next answer event. `None` once the stream has ended.
    pub async fn next_stream_update(&mut self) -> Option<StreamState> {
        self.stream.next_update().await
    }

    /// Drive the answer stream until it ends
    pub async fn finish_stream(&mut self) -> StreamState {
        self.stream.run_to_end().await
    }

    /// Rendered answer after every change
    pub fn answer_updates(&self) -> watch::Receiver<String> {
        self.stream.subscribe()
    }

    pub fn answer_markdown(&self) -> &str {
        self.stream.text()
    }

    pub fn answer_html(&self) -> String {
        self.stream.rendered()
    }

    pub fn answer_state(&self) -> StreamState {
        self.stream.state()
    }

    pub fn is_answer_loading(&self) -> bool {
        self.stream.is_loading()
    }

    pub fn state(&self) -> &AppStateContainer {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::SearchResult;
    use crate::config::Preferences;
    use crate::streaming::{ChannelConnector, PushEvent};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedBackend {
        results: usize,
        fail: bool,
        suggestions: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    impl FixedBackend {
        fn with_results(results: usize) -> Self {
            Self {
                results,
                fail: false,
                suggestions: vec!["rust async".to_string(), "rust traits".to_string()],
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::with_results(0)
            }
        }
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn search(&self, query: &Query) -> ClientResult<SearchResponse> {
            self.seen.lock().unwrap().push(query.text().to_string());
            if self.fail {
                return Err(ClientError::Status(500));
            }
            Ok(SearchResponse {
                results: (0..self.results)
                    .map(|i| SearchResult::titled(&format!("doc {}", i)))
                    .collect(),
                count: self.results as u64,
                elapsed_time: Some(0.01),
                keywords: vec![],
            })
        }

        async fn query_suggestions(&self, _query: &str) -> ClientResult<Vec<String>> {
            if self.fail {
                return Err(ClientError::Transport("refused".to_string()));
            }
            Ok(self.suggestions.clone())
        }
    }

    fn orchestrator(
        backend: FixedBackend,
        ai_enabled: bool,
    ) -> (
        SearchOrchestrator,
        tokio::sync::mpsc::UnboundedReceiver<crate::streaming::ChannelSession>,
    ) {
        let (connector, sessions) = ChannelConnector::new();
        let prefs = MemoryPreferenceStore::with(Preferences {
            dark_mode: false,
            ai_search_enabled: ai_enabled,
        });
        let orchestrator = SearchOrchestrator::new(
            Arc::new(backend),
            Arc::new(connector),
            Box::new(prefs),
            &Config::default(),
        );
        (orchestrator, sessions)
    }

    #[tokio::test]
    async fn test_blank_query_ignored() {
        let (mut orch, mut sessions) = orchestrator(FixedBackend::with_results(3), true);
        assert!(matches!(
            orch.submit("   ", SearchMode::Or).await,
            SubmitOutcome::Ignored
        ));
        assert!(!orch.state().has_searched());
        assert!(sessions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_paginates() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(26), true);
        let outcome = orch.submit("rust", SearchMode::And).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Completed {
                received: 26,
                total: 26
            }
        ));
        assert!(!orch.state().is_loading());
        assert_eq!(orch.state().current_results().len(), 15);
        assert_eq!(orch.state().total_pages(), 2);

        assert!(orch.go_to_page(2));
        assert_eq!(orch.state().current_results().len(), 11);
        assert!(!orch.go_to_page(3));
        assert!(!orch.go_to_page(0));
        assert_eq!(orch.state().current_page(), 2);
    }

    #[tokio::test]
    async fn test_failed_search_shows_empty_results() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::failing(), false);
        let outcome = orch.submit("rust", SearchMode::Or).await;
        assert!(matches!(outcome, SubmitOutcome::Failed(ClientError::Status(500))));
        assert!(orch.state().has_searched());
        assert!(!orch.state().is_loading());
        assert!(orch.state().current_results().is_empty());
    }

    #[tokio::test]
    async fn test_stale_response_dropped() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(2), false);
        let first = orch.begin_search("first", SearchMode::Or).unwrap();
        let second = orch.begin_search("second", SearchMode::Or).unwrap();

        let stale = SearchResponse {
            results: vec![SearchResult::titled("old")],
            count: 1,
            ..Default::default()
        };
        assert!(matches!(
            orch.complete_search(first, Ok(stale)),
            SubmitOutcome::Superseded
        ));
        assert!(orch.state().is_loading());

        let fresh = SearchResponse {
            results: vec![SearchResult::titled("new"), SearchResult::titled("new 2")],
            count: 2,
            ..Default::default()
        };
        orch.complete_search(second, Ok(fresh));
        assert!(!orch.state().is_loading());
        assert_eq!(orch.state().current_results()[0].title.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_answer_streams_during_search() {
        let (mut orch, mut sessions) = orchestrator(FixedBackend::with_results(1), true);
        orch.submit("  rust  ", SearchMode::Or).await;
        assert!(orch.state().show_ai_response());

        let session = sessions.recv().await.unwrap();
        assert_eq!(session.query, "rust");
        session
            .events
            .send(PushEvent::Message("Rust is ###Fast".to_string()))
            .unwrap();
        session
            .events
            .send(PushEvent::Message("[DONE]".to_string()))
            .unwrap();

        assert_eq!(orch.finish_stream().await, StreamState::Closed);
        assert_eq!(orch.answer_markdown(), "Rust is \n\n###Fast");
        assert!(orch.answer_html().contains("Fast"));
    }

    #[tokio::test]
    async fn test_ai_disabled_opens_no_stream() {
        let (mut orch, mut sessions) = orchestrator(FixedBackend::with_results(4), false);
        orch.submit("rust", SearchMode::Or).await;
        assert!(!orch.state().show_ai_response());
        assert!(sessions.try_recv().is_err());
        assert_eq!(orch.answer_state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn test_enabling_ai_after_search_streams_only() {
        let (mut orch, mut sessions) = orchestrator(FixedBackend::with_results(4), false);
        orch.submit("rust", SearchMode::Or).await;

        assert!(orch.toggle_ai_search());
        let session = sessions.recv().await.unwrap();
        assert_eq!(session.query, "rust");
        assert!(orch.state().show_ai_response());
        assert_eq!(orch.answer_state(), StreamState::Connecting);

        assert!(!orch.toggle_ai_search());
        assert!(!orch.state().show_ai_response());
        assert_eq!(orch.answer_state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_suggestions_require_a_search() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(1), false);
        assert!(orch.show_query_suggestions().await.is_empty());
        assert!(!orch.state().suggestions().visible);

        orch.submit("rust", SearchMode::Or).await;
        let items = orch.show_query_suggestions().await.to_vec();
        assert_eq!(items, vec!["rust async", "rust traits"]);
        assert!(orch.state().suggestions().visible);
        assert!(!orch.state().suggestions().loading);

        orch.hide_suggestions();
        assert!(!orch.state().suggestions().visible);
    }

    #[tokio::test]
    async fn test_suggestion_failure_leaves_empty_list() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::failing(), false);
        orch.submit("rust", SearchMode::Or).await;
        assert!(orch.show_query_suggestions().await.is_empty());
        assert!(!orch.state().suggestions().loading);
    }

    #[tokio::test]
    async fn test_select_suggestion_searches_it() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(3), false);
        orch.submit("rust", SearchMode::Phrase).await;
        orch.show_query_suggestions().await;

        orch.select_suggestion("rust async").await;
        assert_eq!(orch.state().query().text, "rust async");
        assert_eq!(orch.state().query().mode, SearchMode::Phrase);
        assert!(!orch.state().suggestions().visible);
    }

    #[tokio::test]
    async fn test_debounced_suggestions() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(1), false);
        assert!(!orch.flush_suggestions().await);

        orch.submit("rust", SearchMode::Or).await;
        orch.request_suggestions();
        orch.request_suggestions();
        assert!(orch.flush_suggestions().await);
        assert_eq!(orch.state().suggestions().items.len(), 2);
        assert!(!orch.flush_suggestions().await);
    }

    #[tokio::test]
    async fn test_toggles_are_written_to_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let open = |path: &std::path::Path| {
            let (connector, _sessions) = ChannelConnector::new();
            SearchOrchestrator::new(
                Arc::new(FixedBackend::with_results(0)),
                Arc::new(connector),
                Box::new(FilePreferenceStore::new(path)),
                &Config::default(),
            )
        };

        let mut orch = open(path.as_path());
        assert!(orch.state().preferences().ai_search_enabled);
        assert!(orch.toggle_dark_mode());
        let saved = FilePreferenceStore::new(&path).load().unwrap().unwrap();
        assert!(saved.dark_mode);
        assert!(saved.ai_search_enabled);

        assert!(!orch.toggle_ai_search());
        let saved = FilePreferenceStore::new(&path).load().unwrap().unwrap();
        assert!(saved.dark_mode);
        assert!(!saved.ai_search_enabled);
        drop(orch);

        let reopened = open(path.as_path());
        assert_eq!(
            reopened.state().preferences(),
            Preferences {
                dark_mode: true,
                ai_search_enabled: false,
            }
        );
    }

    #[tokio::test]
    async fn test_unsaved_preferences_follow_config_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.stream.enabled_by_default = false;
        let (connector, _sessions) = ChannelConnector::new();
        let orch = SearchOrchestrator::new(
            Arc::new(FixedBackend::with_results(0)),
            Arc::new(connector),
            Box::new(FilePreferenceStore::new(dir.path().join("preferences.toml"))),
            &config,
        );
        assert!(!orch.state().preferences().ai_search_enabled);
        assert!(!orch.state().preferences().dark_mode);
    }

    #[tokio::test]
    async fn test_clear_search() {
        let (mut orch, _sessions) = orchestrator(FixedBackend::with_results(5), false);
        orch.submit("rust", SearchMode::Or).await;
        orch.clear_search();
        assert_eq!(orch.state().query().text, "");
        assert!(!orch.state().has_searched());
        assert!(orch.state().current_results().is_empty());
    }
}
