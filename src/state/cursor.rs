//! Page cursor tracking for a crawl run
//!
//! The cursor holds the page number to fetch next, the total page count once
//! it is known, and the optional explicit page limit. Until a page reports
//! the total, the configured fallback count bounds the run.

/// Position of a crawl run within the paginated listing
#[derive(Debug, Clone)]
pub struct CrawlCursor {
    /// Page number driving the next fetch
    current_page: u32,

    /// Total page count, set at most once
    total_pages: Option<u32>,

    /// Explicit page cap from configuration
    page_limit: Option<u32>,

    /// Page the run started at
    start_page: u32,

    /// Stand-in total while no page has reported one
    fallback_total_pages: u32,
}

impl CrawlCursor {
    /// Creates a cursor positioned at `start_page`
    pub fn new(start_page: u32, page_limit: Option<u32>, fallback_total_pages: u32) -> Self {
        Self {
            current_page: start_page,
            total_pages: None,
            page_limit,
            start_page,
            fallback_total_pages,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn page_limit(&self) -> Option<u32> {
        self.page_limit
    }

    /// Records the total page count
    ///
    /// Only the first call has any effect; later values are ignored so the
    /// bound stays fixed for the rest of the run.
    ///
    /// # Returns
    ///
    /// `true` if this call set the total
    pub fn adopt_total_pages(&mut self, total: u32) -> bool {
        if self.total_pages.is_some() {
            return false;
        }
        self.total_pages = Some(total);
        true
    }

    /// The last page the crawl may request
    ///
    /// The smaller of the page limit and the total page count. While the total
    /// is unknown the fallback count stands in for it, raised to the start
    /// page so a resumed run always gets to try its first page.
    pub fn upper_bound(&self) -> u32 {
        let total = self
            .total_pages
            .unwrap_or_else(|| self.fallback_total_pages.max(self.start_page));

        match self.page_limit {
            Some(limit) => limit.min(total),
            None => total,
        }
    }

    /// Returns the upper bound if the current page lies beyond it
    pub fn past_upper_bound(&self) -> Option<u32> {
        let bound = self.upper_bound();
        (self.current_page > bound).then_some(bound)
    }

    /// Moves to the next page and returns its number
    pub fn advance(&mut self) -> u32 {
        self.current_page = self.current_page.saturating_add(1);
        self.current_page
    }
}
