//! Incremental repository search
//!
//! A [`SearchSession`] accumulates pages of results for one query at a time:
//! - `search` starts over with page 1, retrying once with a corrected query
//!   when page 1 is empty
//! - `fetch_next_page` appends the next page, dropping items already seen
//!
//! Pages come from any [`SearchPageSource`]: the GitHub API directly or a
//! running `gitzip` server.

pub mod autocorrect;
pub mod sort;

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::github::{DEFAULT_PER_PAGE, GithubClient, GithubSearchParams, MAX_PER_PAGE, RepositoryItem};
pub use autocorrect::correct_query;
pub use sort::{SortKey, SortOrder, sorted};

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<RepositoryItem>,
    pub total_count: Option<u64>,
    pub page_number: u32,
}

/// Anything that can serve pages of repository search results
pub trait SearchPageSource {
    fn fetch_page(
        &self,
        query: &str,
        page: u32,
        per_page: u8,
    ) -> impl Future<Output = Result<SearchPage>> + Send;
}

impl SearchPageSource for GithubClient {
    async fn fetch_page(&self, query: &str, page: u32, per_page: u8) -> Result<SearchPage> {
        let params = GithubSearchParams::by_stars(query, page, per_page);
        let results = self.search_repositories(&params).await?;
        Ok(SearchPage {
            items: results.items,
            total_count: results.total_count,
            page_number: params.effective_page(),
        })
    }
}

/// Result of [`SearchSession::search`]
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Blank query, nothing was requested
    Ignored,
    Completed {
        items: Vec<RepositoryItem>,
        total_count: Option<u64>,
        /// Set when the results belong to an auto-corrected query
        corrected_query: Option<String>,
    },
}

/// Result of [`SearchSession::fetch_next_page`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { page: u32, added: usize },
    /// Another fetch was in flight, or there is nothing more to load
    Skipped,
}

/// Whether another page should be requested
///
/// The last page must have been full and fewer items than the reported total
/// fetched so far. Without a total there is never more.
pub fn compute_has_more(page_len: usize, per_page: u8, fetched: usize, total: Option<u64>) -> bool {
    let fetched = fetched as u64;
    page_len == per_page as usize && fetched < total.unwrap_or(fetched)
}

#[derive(Debug, Default)]
struct SessionState {
    active_query: Option<String>,
    items: Vec<RepositoryItem>,
    seen: HashSet<u64>,
    total_count: Option<u64>,
    next_page: u32,
    has_more: bool,
}

impl SessionState {
    fn append(&mut self, page: SearchPage, per_page: u8) -> usize {
        if page.page_number <= 1 || page.total_count.is_some() {
            self.total_count = page.total_count;
        }

        let page_len = page.items.len();
        let before = self.items.len();
        for item in page.items {
            if self.seen.insert(item.id) {
                self.items.push(item);
            }
        }

        self.next_page = page.page_number + 1;
        self.has_more = compute_has_more(page_len, per_page, self.items.len(), self.total_count);
        self.items.len() - before
    }
}

/// Clears the in-flight flag when the fetch ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SearchSession<S> {
    source: S,
    per_page: u8,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
}

impl<S: SearchPageSource> SearchSession<S> {
    pub fn new(source: S) -> Self {
        Self::with_per_page(source, DEFAULT_PER_PAGE)
    }

    pub fn with_per_page(source: S, per_page: u8) -> Self {
        Self {
            source,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
            state: Mutex::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new search, discarding all previous results
    ///
    /// Errors from page 1 propagate. If page 1 is empty and a corrected
    /// query exists, it is tried exactly once; a failing retry is logged and
    /// the empty original result stands.
    pub async fn search(&mut self, query: &str) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Ignored);
        }

        *self.state() = SessionState::default();
        let first = self.source.fetch_page(query, 1, self.per_page).await?;

        let mut active = query.to_string();
        let mut corrected_query = None;
        let mut page = first;

        if page.items.is_empty() {
            if let Some(corrected) = correct_query(query) {
                tracing::info!("No results for {:?}, retrying as {:?}", query, corrected);
                match self.source.fetch_page(&corrected, 1, self.per_page).await {
                    Ok(retry) if !retry.items.is_empty() => {
                        page = retry;
                        active = corrected.clone();
                        corrected_query = Some(corrected);
                    }
                    Ok(_) => tracing::debug!("Corrected query {:?} found nothing either", corrected),
                    Err(e) => tracing::warn!("Corrected search {:?} failed: {}", corrected, e),
                }
            }
        }

        let per_page = self.per_page;
        let mut state = self.state();
        state.active_query = Some(active);
        state.append(page, per_page);

        Ok(SearchOutcome::Completed {
            items: state.items.clone(),
            total_count: state.total_count,
            corrected_query,
        })
    }

    /// Appends the next page of the active query
    ///
    /// A no-op while another fetch is in flight or when nothing more is
    /// available. On error the accumulated items are kept and pagination
    /// stops.
    pub async fn fetch_next_page(&self) -> Result<LoadOutcome> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Page fetch already in flight");
            return Ok(LoadOutcome::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        let (query, page) = {
            let state = self.state();
            match &state.active_query {
                Some(query) if state.has_more => (query.clone(), state.next_page),
                _ => return Ok(LoadOutcome::Skipped),
            }
        };

        match self.source.fetch_page(&query, page, self.per_page).await {
            Ok(results) => {
                let added = self.state().append(results, self.per_page);
                tracing::debug!("Loaded page {} of {:?}: {} new items", page, query, added);
                Ok(LoadOutcome::Loaded { page, added })
            }
            Err(e) => {
                self.state().has_more = false;
                Err(e)
            }
        }
    }

    pub fn items(&self) -> Vec<RepositoryItem> {
        self.state().items.clone()
    }

    /// Accumulated items in display order
    pub fn sorted_items(&self, key: SortKey, order: SortOrder) -> Vec<RepositoryItem> {
        sorted(&self.state().items, key, order)
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn total_count(&self) -> Option<u64> {
        self.state().total_count
    }

    pub fn active_query(&self) -> Option<String> {
        self.state().active_query.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
