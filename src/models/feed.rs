//! Pagination state for the portfolio grid.
//!
//! `PortfolioFeed` owns everything the infinite-scroll grid needs to decide
//! whether another page may be requested: the accumulated items, the page
//! cursor, the terminal `has_more` flag and the single-flight `loading`
//! guard. Network work happens elsewhere; the feed hands out a
//! [`FetchTicket`] describing the request and later consumes the outcome.
//!
//! Every reset bumps a generation counter. A response carrying a stale
//! generation is discarded wholesale, so a slow fetch for a previous
//! category can never leak items into the current one.

use crate::models::GalleryImage;

/// Description of a page request the feed has authorized.
///
/// The ticket must be handed back to [`PortfolioFeed::apply`] together with
/// the outcome; its generation is how stale responses are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub page: u32,
    pub category: Option<String>,
}

/// Result of a page fetch, already classified by the API layer.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// Successful response: the page's items plus whether the server
    /// signalled a further page.
    Page {
        items: Vec<GalleryImage>,
        has_next: bool,
    },
    /// The server reported the page does not exist. Normal termination,
    /// not an error.
    EndOfData,
    /// Network/server-unavailable class failure. Retryable by scrolling.
    Transient(String),
    /// Anything else. Pagination halts.
    Failed(String),
}

#[derive(Debug)]
pub struct PortfolioFeed {
    items: Vec<GalleryImage>,
    page: u32,
    has_more: bool,
    loading: bool,
    last_error: Option<String>,
    generation: u64,
    category: Option<String>,
}

impl PortfolioFeed {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: true,
            loading: false,
            last_error: None,
            generation: 0,
            category: None,
        }
    }

    pub fn items(&self) -> &[GalleryImage] {
        &self.items
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Begin a fresh session for `category`, discarding all prior state.
    ///
    /// Returns the ticket for the first page. Any in-flight fetch from the
    /// previous session is implicitly invalidated by the generation bump.
    pub fn begin_refresh(&mut self, category: Option<String>) -> FetchTicket {
        self.generation += 1;
        self.items.clear();
        self.page = 1;
        self.has_more = true;
        self.loading = true;
        self.last_error = None;
        self.category = category;
        FetchTicket {
            generation: self.generation,
            page: 1,
            category: self.category.clone(),
        }
    }

    /// Authorize a fetch of the next page, if one may be started.
    ///
    /// The `loading` flag is the sole concurrency control: while a ticket is
    /// outstanding, further calls return `None`, so any number of
    /// scroll-triggered calls collapse into one request.
    pub fn try_begin_fetch(&mut self) -> Option<FetchTicket> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        self.last_error = None;
        Some(FetchTicket {
            generation: self.generation,
            page: self.page + 1,
            category: self.category.clone(),
        })
    }

    /// Consume the outcome of the fetch described by `ticket`.
    ///
    /// Returns `true` when the feed changed (the caller should re-render).
    /// Stale-generation outcomes are dropped without touching any state.
    pub fn apply(&mut self, ticket: &FetchTicket, outcome: PageOutcome) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.loading = false;
        match outcome {
            PageOutcome::Page { items, has_next } => {
                // Appending preserves arrival order; pages are strictly
                // sequential so this is also request order.
                let got_items = !items.is_empty();
                self.items.extend(items);
                self.page = ticket.page;
                self.has_more = got_items && has_next;
                self.last_error = None;
            }
            PageOutcome::EndOfData => {
                self.has_more = false;
                self.last_error = None;
            }
            PageOutcome::Transient(message) => {
                // Recoverable: keep has_more so the next scroll past the
                // sentinel retries. No timer-driven retry exists anywhere.
                self.last_error = Some(message);
            }
            PageOutcome::Failed(message) => {
                self.has_more = false;
                self.last_error = Some(message);
            }
        }
        true
    }
}

impl Default for PortfolioFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(id: &str) -> GalleryImage {
        GalleryImage::new(id.into(), format!("http://img/{id}.jpg"))
    }

    fn ids(feed: &PortfolioFeed) -> Vec<&str> {
        feed.items().iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_two_pages_then_end() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        assert!(feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a"), img("b")],
                has_next: true,
            },
        ));
        assert_eq!(feed.page(), 1);
        assert!(feed.has_more());

        let t2 = feed.try_begin_fetch().expect("fetch allowed");
        assert_eq!(t2.page, 2);
        feed.apply(
            &t2,
            PageOutcome::Page {
                items: vec![img("c")],
                has_next: false,
            },
        );

        assert_eq!(ids(&feed), ["a", "b", "c"]);
        assert!(!feed.has_more());
        assert!(feed.try_begin_fetch().is_none());
    }

    #[test]
    fn test_empty_page_terminates() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![],
                has_next: true,
            },
        );
        assert!(!feed.has_more());
        assert!(feed.last_error().is_none());
    }

    #[test]
    fn test_end_of_data_is_silent() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a")],
                has_next: true,
            },
        );
        let t2 = feed.try_begin_fetch().unwrap();
        feed.apply(&t2, PageOutcome::EndOfData);
        assert!(!feed.has_more());
        assert!(feed.last_error().is_none());
        assert_eq!(ids(&feed), ["a"]);
    }

    #[test]
    fn test_transient_error_keeps_retrying() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a")],
                has_next: true,
            },
        );

        let t2 = feed.try_begin_fetch().unwrap();
        feed.apply(&t2, PageOutcome::Transient("connection refused".into()));
        assert!(feed.has_more());
        assert_eq!(feed.last_error(), Some("connection refused"));
        // Page cursor did not advance, so the retry asks for the same page
        // and a success appends without duplication.
        let t3 = feed.try_begin_fetch().unwrap();
        assert_eq!(t3.page, t2.page);
        feed.apply(
            &t3,
            PageOutcome::Page {
                items: vec![img("b")],
                has_next: true,
            },
        );
        assert_eq!(ids(&feed), ["a", "b"]);
        assert!(feed.last_error().is_none());
    }

    #[test]
    fn test_permanent_error_halts() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a")],
                has_next: true,
            },
        );
        let t2 = feed.try_begin_fetch().unwrap();
        feed.apply(&t2, PageOutcome::Failed("bad request".into()));
        assert!(!feed.has_more());
        assert_eq!(feed.last_error(), Some("bad request"));
        assert!(feed.try_begin_fetch().is_none());
    }

    #[test]
    fn test_loading_guard_is_single_flight() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a")],
                has_next: true,
            },
        );
        let ticket = feed.try_begin_fetch();
        assert!(ticket.is_some());
        // A second scroll signal while the fetch is in flight.
        assert!(feed.try_begin_fetch().is_none());
        assert!(feed.try_begin_fetch().is_none());
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(Some("weddings".into()));
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("w1")],
                has_next: true,
            },
        );
        let stale = feed.try_begin_fetch().unwrap();

        // Category switch while the fetch for "weddings" page 2 is in flight.
        let fresh = feed.begin_refresh(Some("portraits".into()));
        assert_ne!(stale.generation, fresh.generation);

        // The stale response resolves late; nothing of it may stick.
        let changed = feed.apply(
            &stale,
            PageOutcome::Page {
                items: vec![img("w2")],
                has_next: true,
            },
        );
        assert!(!changed);
        assert!(feed.items().is_empty());
        assert!(feed.is_loading());

        feed.apply(
            &fresh,
            PageOutcome::Page {
                items: vec![img("p1")],
                has_next: false,
            },
        );
        assert_eq!(ids(&feed), ["p1"]);
    }

    #[test]
    fn test_refresh_replaces_state() {
        let mut feed = PortfolioFeed::new();
        let t1 = feed.begin_refresh(None);
        feed.apply(
            &t1,
            PageOutcome::Page {
                items: vec![img("a"), img("b")],
                has_next: false,
            },
        );
        assert!(!feed.has_more());

        let t2 = feed.begin_refresh(Some("studio".into()));
        assert!(feed.items().is_empty());
        assert!(feed.has_more());
        assert_eq!(feed.category(), Some("studio"));
        assert_eq!(t2.page, 1);
    }
}
