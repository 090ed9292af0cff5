//! Single owner of the client's view state.
//!
//! Everything the page shows (query box, result list, pagination, answer
//! panel, suggestions and preferences) lives here. The visible page is
//! always derived from the full result list and the current page, so it
//! cannot drift out of sync with either.

use crate::api_client::{Query, SearchMode, SearchResponse, SearchResult};
use crate::config::Preferences;
use crate::data::pagination::{self, PageItem, DEFAULT_PAGE_SIZE, RESULT_COUNT_CAP};
use crate::highlight::highlight_keywords;
use std::fmt;

/// The query box
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub text: String,
    pub mode: SearchMode,
    /// Text of the last submitted query, used for suggestions
    pub last_submitted: String,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// The full result set of the last search and where the user is in it
#[derive(Debug, Clone)]
pub struct ResultsState {
    pub all_results: Vec<SearchResult>,
    pub total_count: u64,
    pub keywords: Vec<String>,
    pub search_time: Option<f64>,
    pub current_page: usize,
    pub page_size: usize,
    pub searched: bool,
    pub loading: bool,
}

impl ResultsState {
    pub fn new(page_size: usize) -> Self {
        Self {
            all_results: Vec::new(),
            total_count: 0,
            keywords: Vec::new(),
            search_time: None,
            current_page: 1,
            page_size: page_size.max(1),
            searched: false,
            loading: false,
        }
    }

    pub fn clear(&mut self) {
        self.all_results.clear();
        self.total_count = 0;
        self.keywords.clear();
        self.search_time = None;
        self.current_page = 1;
        self.searched = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionState {
    pub items: Vec<String>,
    pub visible: bool,
    pub loading: bool,
}

impl SuggestionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.visible = false;
        self.loading = false;
    }
}

pub struct AppStateContainer {
    query: QueryState,
    results: ResultsState,
    suggestions: SuggestionState,
    preferences: Preferences,
    show_ai_response: bool,
    result_count_cap: u64,
    search_generation: u64,
}

impl Default for AppStateContainer {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, RESULT_COUNT_CAP, Preferences::default())
    }
}

impl AppStateContainer {
    pub fn new(page_size: usize, result_count_cap: u64, preferences: Preferences) -> Self {
        Self {
            query: QueryState::new(),
            results: ResultsState::new(page_size),
            suggestions: SuggestionState::new(),
            preferences,
            show_ai_response: false,
            result_count_cap,
            search_generation: 0,
        }
    }

    // --- read access ---

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn results(&self) -> &ResultsState {
        &self.results
    }

    pub fn suggestions(&self) -> &SuggestionState {
        &self.suggestions
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
    }

    pub fn show_ai_response(&self) -> bool {
        self.show_ai_response
    }

    pub fn is_loading(&self) -> bool {
        self.results.loading
    }

    pub fn has_searched(&self) -> bool {
        self.results.searched
    }

    pub fn current_page(&self) -> usize {
        self.results.current_page
    }

    pub fn search_generation(&self) -> u64 {
        self.search_generation
    }

    /// The results on the current page
    pub fn current_results(&self) -> &[SearchResult] {
        pagination::slice(
            &self.results.all_results,
            self.results.current_page,
            self.results.page_size,
        )
    }

    pub fn total_pages(&self) -> usize {
        pagination::total_pages(self.results.all_results.len(), self.results.page_size)
    }

    /// Page buttons around the current page
    pub fn page_navigation(&self) -> Vec<PageItem> {
        pagination::page_window(self.results.current_page, self.total_pages())
    }

    /// A result's content with its keywords highlighted. Falls back to the
    /// keywords of the whole response when the result carries none.
    pub fn highlighted_content(&self, result: &SearchResult) -> String {
        let keywords = result
            .keywords
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(self.results.keywords.as_slice());
        highlight_keywords(result.content.as_deref().unwrap_or_default(), keywords)
    }

    pub fn formatted_result_count(&self) -> String {
        pagination::format_result_count_with_cap(self.results.total_count, self.result_count_cap)
    }

    // --- mutations, driven by the orchestrator ---

    pub(crate) fn set_query_text(&mut self, text: &str) {
        self.query.text = text.to_string();
    }

    /// Reset for a new search and hand out its generation number
    pub(crate) fn begin_search(&mut self, query: &Query) -> u64 {
        self.search_generation += 1;
        self.query.text = query.text().to_string();
        self.query.mode = query.mode();
        self.query.last_submitted = query.text().to_string();
        self.results.clear();
        self.results.loading = true;
        self.suggestions.clear();
        self.search_generation
    }

    pub(crate) fn apply_results(&mut self, response: SearchResponse) {
        self.results.all_results = response.results;
        self.results.total_count = response.count;
        self.results.keywords = response.keywords;
        self.results.search_time = response.elapsed_time;
        self.results.current_page = 1;
        self.results.searched = true;
    }

    /// A failed search shows as an empty result set
    pub(crate) fn apply_failure(&mut self) {
        self.results.all_results.clear();
        self.results.total_count = 0;
        self.results.keywords.clear();
        self.results.search_time = None;
        self.results.current_page = 1;
        self.results.searched = true;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.results.loading = loading;
    }

    /// Move to `page` when it is within `1..=total_pages`
    pub(crate) fn set_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.results.current_page = page;
        true
    }

    pub(crate) fn clear_search(&mut self) {
        self.query.clear();
        self.results.clear();
    }

    pub(crate) fn begin_suggestions(&mut self) {
        self.suggestions.visible = true;
        self.suggestions.loading = true;
    }

    pub(crate) fn finish_suggestions(&mut self, items: Vec<String>) {
        self.suggestions.items = items;
        self.suggestions.loading = false;
    }

    pub(crate) fn hide_suggestions(&mut self) {
        self.suggestions.visible = false;
    }

    pub(crate) fn set_show_ai_response(&mut self, show: bool) {
        self.show_ai_response = show;
    }

    pub(crate) fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }
}

impl fmt::Debug for AppStateContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppStateContainer")
            .field("query", &self.query.text)
            .field("mode", &self.query.mode)
            .field("results", &self.results.all_results.len())
            .field("total_count", &self.results.total_count)
            .field("page", &self.results.current_page)
            .field("loading", &self.results.loading)
            .field("show_ai_response", &self.show_ai_response)
            .field("generation", &self.search_generation)
            .finish()
    }
}
