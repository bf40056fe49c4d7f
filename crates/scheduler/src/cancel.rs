//! Cancellation tokens for background renders
//!
//! Provides cancellation tokens that allow an in-flight render to be
//! abandoned cooperatively, and a per-page registry that supersedes stale
//! renders when a newer one is requested for the same page.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative cancellation
///
/// Renderers check `is_cancelled()` before and after expensive steps and bail
/// out early. Clones share the same underlying state.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let render_token = token.clone();
///
/// token.cancel();
/// assert!(render_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token
    ///
    /// The token starts in a non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token
    ///
    /// All clones of this token will also observe the cancellation.
    /// Calling it more than once has no further effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if this token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one requested background render of one page.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    page: u32,
    generation: u64,
    token: CancellationToken,
}

impl RenderTicket {
    /// 1-based page number the render belongs to
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Per-page registry of outstanding render tickets
///
/// At most one ticket per page is current. Issuing a ticket cancels the
/// page's previous ticket before the new one is handed out.
#[derive(Debug, Default)]
pub struct RenderTokens {
    next_generation: u64,
    live: HashMap<u32, RenderTicket>,
}

impl RenderTokens {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for `page`, superseding any outstanding one
    pub fn issue(&mut self, page: u32) -> RenderTicket {
        if let Some(previous) = self.live.remove(&page) {
            previous.token.cancel();
            tracing::debug!(page, generation = previous.generation, "superseded render");
        }

        self.next_generation += 1;
        let ticket = RenderTicket {
            page,
            generation: self.next_generation,
            token: CancellationToken::new(),
        };
        self.live.insert(page, ticket.clone());
        ticket
    }

    /// Whether `ticket` is still the newest render for its page
    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        !ticket.token.is_cancelled()
            && self
                .live
                .get(&ticket.page)
                .is_some_and(|live| live.generation == ticket.generation)
    }

    /// Retire a finished ticket
    ///
    /// Returns `true` if it was the current ticket for its page. A stale
    /// ticket leaves the newer one in place.
    pub fn complete(&mut self, ticket: &RenderTicket) -> bool {
        if self.is_current(ticket) {
            self.live.remove(&ticket.page);
            true
        } else {
            false
        }
    }

    /// Cancel every outstanding render
    ///
    /// Returns the number of tickets cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.live.len();
        for (_, ticket) in self.live.drain() {
            ticket.token.cancel();
        }
        count
    }

    /// Number of pages with a render in flight
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
