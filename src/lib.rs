//! One-shot promises with `then` chaining for threaded code.
//!
//! A [`Promise`] is a cloneable handle to the eventual value or error of an
//! asynchronous operation. The producer settles it exactly once with
//! [`Promise::fulfill`] or [`Promise::reject`]; consumers register callbacks
//! with [`Promise::then`] and receive a new promise driven by the callback's
//! result, so dependent steps compose without nested completion handlers.
//!
//! ```
//! use promise_chain::{ClosureResult, Promise};
//!
//! let raw: Promise<String> = Promise::new();
//! let trimmed = raw.then(|value| ClosureResult::Value(value.map(|v| v.trim().to_string())));
//! raw.fulfill(Some("  hello  ".to_string()));
//! assert_eq!(trimmed.value(), Some("hello".to_string()));
//! ```
//!
//! Settlement is idempotent: the first `fulfill` or `reject` wins and any
//! later attempt is a no-op. That makes external timeouts safe to bolt on by
//! racing a timer's `reject` against the real producer.

pub mod promise;
pub mod sync;
pub mod waiter;

mod combine;

pub use promise::{ClosureResult, Promise};
pub use sync::Synchronizer;
pub use waiter::Waiter;

use thiserror::Error;

/// Why a promise was rejected.
///
/// Kept cheap to clone and comparable so a single rejection can fan out to
/// every registered callback and still be asserted on in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// Failure reported by the code that owns the promise.
    #[error("{0}")]
    Failed(String),
    /// A fulfilled value could not be narrowed to the target promise's value
    /// type during [`Promise::adapt`].
    #[error("mismatched promise value types: {0}")]
    MismatchedValueTypes(String),
    /// `Promise::any` was given no promises, so nothing can ever win.
    #[error("no promises to await")]
    NothingToAwait,
}

impl PromiseError {
    /// Producer-side failure with a human-readable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        PromiseError::Failed(reason.into())
    }
}
