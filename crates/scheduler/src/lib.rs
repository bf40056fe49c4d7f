//! Render cancellation for the PDF annotator.
//!
//! Background renders are the only cancellable operation. Each page has at
//! most one live render ticket; issuing a new ticket for a page cancels the
//! previous one so its result is discarded instead of displayed.
//!
//! # Example
//!
//! ```
//! use pdf_annotator_scheduler::RenderTokens;
//!
//! let mut tokens = RenderTokens::new();
//!
//! let first = tokens.issue(1);
//! let second = tokens.issue(1);
//!
//! // The older render for page 1 was superseded.
//! assert!(first.token().is_cancelled());
//! assert!(tokens.is_current(&second));
//!
//! tokens.complete(&second);
//! assert!(tokens.is_empty());
//! ```

mod cancel;

pub use cancel::{CancellationToken, RenderTicket, RenderTokens};
