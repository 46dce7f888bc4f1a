//! Cursor-driven pagination with quota gating.
//!
//! All listing endpoints of the provider paginate via opaque cursors. The
//! paginator owns the loop mechanics: reserve quota before each fetch, hand
//! the last cursor to the fetch closure, detect termination, and guard
//! against cursor loops with an iteration ceiling.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::ProviderError;
use crate::quota::QuotaLedger;

/// Hard ceiling on pages fetched from a single listing.
/// A provider that keeps returning cursors past this is looping.
pub const MAX_PAGE_ITERATIONS: usize = 10_000;

/// Opaque pagination cursor as issued by the provider.
///
/// Never inspected or synthesized locally; only stored, compared and
/// echoed back. Serializable so checkpoints can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

impl Cursor {
    /// The raw token string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a listing: the items plus the cursor for the next page,
/// absent on the final page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page, in provider order
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page
    pub next_cursor: Option<Cursor>,
}

/// Optional caps on how much of a listing to walk
#[derive(Debug, Clone, Copy, Default)]
pub struct PageLimit {
    /// Maximum number of pages to fetch
    pub pages: Option<usize>,
    /// Maximum number of items to yield in total
    pub items: Option<usize>,
}

/// Outcome of asking the paginator for the next page
#[derive(Debug)]
pub enum PageStep<T> {
    /// A page of items was fetched
    Items(Vec<T>),
    /// Quota ran out before the fetch; the listing is resumable at `cursor()`
    QuotaExhausted,
    /// The listing (or the configured limit) is finished
    End,
}

/// Walks a paginated listing one page at a time.
///
/// The fetch closure receives the cursor to request (None for the first
/// page) and returns a [`Page`]. Quota for each page is reserved on the
/// supplied ledger before the fetch runs, so a refused reservation leaves
/// the cursor pointing at the unfetched page.
pub struct Paginator<T, F, Fut>
where
    F: FnMut(Option<Cursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    fetch: F,
    cursor: Option<Cursor>,
    limit: PageLimit,
    pages_fetched: usize,
    items_yielded: usize,
    finished: bool,
}

impl<T, F, Fut> Paginator<T, F, Fut>
where
    F: FnMut(Option<Cursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    /// Start a listing from the beginning
    pub fn new(fetch: F, limit: PageLimit) -> Self {
        Self::resume(fetch, None, limit)
    }

    /// Resume a listing from a previously saved cursor
    pub fn resume(fetch: F, cursor: Option<Cursor>, limit: PageLimit) -> Self {
        Self {
            fetch,
            cursor,
            limit,
            pages_fetched: 0,
            items_yielded: 0,
            finished: false,
        }
    }

    /// The cursor of the next unfetched page, for checkpointing
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Fetch the next page, charging `cost` units against the ledger first.
    ///
    /// Returns `QuotaExhausted` without fetching when the reservation is
    /// refused, and `End` once the provider stops issuing cursors or a
    /// configured limit is reached.
    pub async fn next_page(
        &mut self,
        ledger: &mut QuotaLedger,
        cost: u64,
    ) -> Result<PageStep<T>, ProviderError> {
        if self.finished {
            return Ok(PageStep::End);
        }
        if let Some(max_pages) = self.limit.pages {
            if self.pages_fetched >= max_pages {
                self.finished = true;
                return Ok(PageStep::End);
            }
        }
        if let Some(max_items) = self.limit.items {
            if self.items_yielded >= max_items {
                self.finished = true;
                return Ok(PageStep::End);
            }
        }
        if self.pages_fetched >= MAX_PAGE_ITERATIONS {
            warn!(pages = self.pages_fetched, "Pagination iteration ceiling reached, stopping listing");
            self.finished = true;
            return Ok(PageStep::End);
        }

        if ledger.reserve(cost).is_err() {
            return Ok(PageStep::QuotaExhausted);
        }

        let page = (self.fetch)(self.cursor.clone()).await?;
        self.pages_fetched += 1;

        let mut items = page.items;
        if let Some(max_items) = self.limit.items {
            let budget = max_items.saturating_sub(self.items_yielded);
            if items.len() > budget {
                items.truncate(budget);
            }
        }
        self.items_yielded += items.len();

        match page.next_cursor {
            Some(next) => {
                // A provider echoing the same cursor back would loop forever
                if self.cursor.as_ref() == Some(&next) {
                    warn!(cursor = %next.as_str(), "Provider repeated pagination cursor, stopping listing");
                    self.finished = true;
                } else {
                    self.cursor = Some(next);
                }
            }
            None => {
                self.finished = true;
            }
        }
        if let Some(max_items) = self.limit.items {
            if self.items_yielded >= max_items {
                self.finished = true;
            }
        }

        debug!(
            page = self.pages_fetched,
            items = items.len(),
            total_items = self.items_yielded,
            finished = self.finished,
            "Fetched listing page"
        );
        Ok(PageStep::Items(items))
    }
}
