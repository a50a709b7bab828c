//! The promise state machine and its `then` chaining protocol.

use std::any::type_name;
use std::fmt;
use std::mem;

use log::warn;

use crate::sync::Synchronizer;
use crate::PromiseError;

/// The outcome a `then` callback hands back, steering every promise that
/// depends on it.
pub enum ClosureResult<T> {
    /// Fulfill dependent promises with this value (which may be absent).
    Value(Option<T>),
    /// Reject dependent promises with this error.
    Error(PromiseError),
    /// Defer dependent promises until this inner promise settles, then
    /// forward whatever it produced.
    Pending(Promise<T>),
}

type FulfillClosure<T> = Box<dyn FnOnce(Option<T>) -> ClosureResult<T> + Send>;
type RejectClosure<T> = Box<dyn FnOnce(PromiseError) -> ClosureResult<T> + Send>;

enum State<T> {
    Pending(Vec<PendingAction<T>>),
    Fulfilled(Option<T>),
    Rejected(PromiseError),
}

/// A callback pair registered through `then`, waiting for the source promise
/// to settle. Consumed exactly once: either its fulfill path or its reject
/// path runs, never both, never twice.
struct PendingAction<T> {
    dependent: Promise<T>,
    on_fulfilled: FulfillClosure<T>,
    on_rejected: Option<RejectClosure<T>>,
}

impl<T: Clone + Send + 'static> PendingAction<T> {
    fn fulfill(self, value: Option<T>) {
        let result = (self.on_fulfilled)(value);
        Self::settle_dependent(self.dependent, result);
    }

    fn reject(self, error: PromiseError) {
        let result = match self.on_rejected {
            Some(on_rejected) => on_rejected(error),
            // No reject callback: pass the error down the chain unchanged.
            None => ClosureResult::Error(error),
        };
        Self::settle_dependent(self.dependent, result);
    }

    fn settle_dependent(dependent: Promise<T>, result: ClosureResult<T>) {
        match result {
            ClosureResult::Value(value) => dependent.fulfill(value),
            ClosureResult::Error(error) => dependent.reject(error),
            ClosureResult::Pending(inner) => {
                let forward = dependent.clone();
                inner.then_catch(
                    move |value| {
                        forward.fulfill(value.clone());
                        ClosureResult::Value(value)
                    },
                    move |error| {
                        dependent.reject(error.clone());
                        ClosureResult::Error(error)
                    },
                );
            }
        }
    }
}

/// What `register` found when the source promise was already settled, handed
/// back out of the lock so the callback runs without holding it.
enum Immediate<T> {
    Fulfill(PendingAction<T>, Option<T>),
    Reject(PendingAction<T>, PromiseError),
}

/// A cloneable handle to the eventual value or error of an asynchronous
/// operation.
///
/// A promise starts pending and is settled exactly once by [`fulfill`] or
/// [`reject`]; the transition is terminal and later attempts are ignored.
/// Callbacks registered while pending are delivered in registration order at
/// settlement; callbacks registered afterwards run immediately on the
/// registering thread.
///
/// All state is behind a [`Synchronizer`], so every handle, on any thread,
/// observes a consistent state. Callbacks always run outside that lock,
/// which keeps re-entrant calls back into this or other promises safe.
///
/// [`fulfill`]: Promise::fulfill
/// [`reject`]: Promise::reject
pub struct Promise<T> {
    state: Synchronizer<State<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// A new pending promise with no registered callbacks.
    pub fn new() -> Self {
        Self {
            state: Synchronizer::new(State::Pending(Vec::new())),
        }
    }

    /// A promise fulfilled from creation, immutable for its lifetime.
    ///
    /// Useful when code that must return a promise already has the result
    /// in hand (a cached response, a completed lookup).
    pub fn fulfilled(value: Option<T>) -> Self {
        Self {
            state: Synchronizer::new(State::Fulfilled(value)),
        }
    }

    /// A promise rejected from creation, immutable for its lifetime.
    pub fn rejected(error: PromiseError) -> Self {
        Self {
            state: Synchronizer::new(State::Rejected(error)),
        }
    }

    /// Observes a promise of a different value type, narrowing its fulfilled
    /// value into `T` via [`TryFrom`].
    ///
    /// Rejections pass through unchanged, as does an absent value. A value
    /// that cannot be narrowed rejects the returned promise with
    /// [`PromiseError::MismatchedValueTypes`] rather than dropping the
    /// mismatch.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{Promise, PromiseError};
    ///
    /// let source: Promise<u32> = Promise::fulfilled(Some(7));
    /// let widened: Promise<u64> = Promise::adapt(&source);
    /// assert_eq!(widened.value(), Some(7));
    ///
    /// let big: Promise<i64> = Promise::fulfilled(Some(4096));
    /// let narrowed: Promise<u8> = Promise::adapt(&big);
    /// assert!(matches!(
    ///     narrowed.error(),
    ///     Some(PromiseError::MismatchedValueTypes(_))
    /// ));
    /// ```
    pub fn adapt<R>(source: &Promise<R>) -> Promise<T>
    where
        R: Clone + Send + 'static,
        T: TryFrom<R>,
    {
        let result = Promise::new();
        let fulfill_side = result.clone();
        let reject_side = result.clone();
        source.then_catch(
            move |value| {
                match &value {
                    None => fulfill_side.fulfill(None),
                    Some(original) => match T::try_from(original.clone()) {
                        Ok(narrowed) => fulfill_side.fulfill(Some(narrowed)),
                        Err(_) => fulfill_side.reject(PromiseError::MismatchedValueTypes(format!(
                            "a fulfilled {} cannot be narrowed to {}",
                            type_name::<R>(),
                            type_name::<T>()
                        ))),
                    },
                }
                ClosureResult::Value(value)
            },
            move |error| {
                reject_side.reject(error.clone());
                ClosureResult::Error(error)
            },
        );
        result
    }

    /// True while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.state
            .synchronize(|state| matches!(state, State::Pending(_)))
    }

    /// True once the promise has been fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.state
            .synchronize(|state| matches!(state, State::Fulfilled(_)))
    }

    /// True once the promise has been rejected.
    pub fn is_rejected(&self) -> bool {
        self.state
            .synchronize(|state| matches!(state, State::Rejected(_)))
    }

    /// The fulfilled value, or `None` when pending, rejected, or fulfilled
    /// without a value.
    pub fn value(&self) -> Option<T> {
        self.state.synchronize(|state| match state {
            State::Fulfilled(value) => value.clone(),
            _ => None,
        })
    }

    /// The rejection error, or `None` in any other state.
    pub fn error(&self) -> Option<PromiseError> {
        self.state.synchronize(|state| match state {
            State::Rejected(error) => Some(error.clone()),
            _ => None,
        })
    }

    /// Settles the promise successfully and delivers every pending callback,
    /// in registration order, with `value`.
    ///
    /// On an already settled promise this is a no-op, reported through
    /// `log::warn!`. Callbacks run after the state lock is released, so they
    /// may freely call back into this or any other promise.
    pub fn fulfill(&self, value: Option<T>) {
        let actions = self.state.synchronize(|state| match state {
            State::Pending(actions) => {
                let captured = mem::take(actions);
                *state = State::Fulfilled(value.clone());
                Some(captured)
            }
            _ => {
                warn!("cannot fulfill promise, already settled");
                None
            }
        });
        for action in actions.into_iter().flatten() {
            action.fulfill(value.clone());
        }
    }

    /// Settles the promise with an error and delivers every pending
    /// callback's rejection path, in registration order.
    ///
    /// On an already settled promise this is a no-op, reported through
    /// `log::warn!`.
    pub fn reject(&self, error: PromiseError) {
        let actions = self.state.synchronize(|state| match state {
            State::Pending(actions) => {
                let captured = mem::take(actions);
                *state = State::Rejected(error.clone());
                Some(captured)
            }
            _ => {
                warn!("cannot reject promise, already settled");
                None
            }
        });
        for action in actions.into_iter().flatten() {
            action.reject(error.clone());
        }
    }

    /// Registers a fulfillment callback and returns the promise it drives.
    ///
    /// Errors skip the callback and propagate to the returned promise
    /// unchanged; use [`then_catch`](Promise::then_catch) to intercept them.
    ///
    /// The callback's [`ClosureResult`] decides the returned promise's fate:
    /// a value fulfills it, an error rejects it, and a pending promise defers
    /// it until that inner promise settles.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{ClosureResult, Promise};
    ///
    /// let count: Promise<u32> = Promise::new();
    /// let doubled = count.then(|value| ClosureResult::Value(value.map(|n| n * 2)));
    /// count.fulfill(Some(4));
    /// assert_eq!(doubled.value(), Some(8));
    /// ```
    pub fn then<F>(&self, on_fulfilled: F) -> Promise<T>
    where
        F: FnOnce(Option<T>) -> ClosureResult<T> + Send + 'static,
    {
        self.register(Box::new(on_fulfilled), None)
    }

    /// Registers a fulfillment callback and a rejection callback.
    ///
    /// Either callback may redirect the chain: a rejection callback that
    /// returns a value recovers, putting every dependent promise back on the
    /// fulfillment path.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{ClosureResult, Promise, PromiseError};
    ///
    /// let lookup: Promise<String> = Promise::rejected(PromiseError::failed("cache miss"));
    /// let answer = lookup.then_catch(
    ///     |value| ClosureResult::Value(value),
    ///     |_error| ClosureResult::Value(Some("default".to_string())),
    /// );
    /// assert_eq!(answer.value(), Some("default".to_string()));
    /// ```
    pub fn then_catch<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<T>
    where
        F: FnOnce(Option<T>) -> ClosureResult<T> + Send + 'static,
        R: FnOnce(PromiseError) -> ClosureResult<T> + Send + 'static,
    {
        self.register(Box::new(on_fulfilled), Some(Box::new(on_rejected)))
    }

    /// Appends the action while pending; on a settled promise, hands the
    /// action back out of the lock and delivers it immediately.
    fn register(
        &self,
        on_fulfilled: FulfillClosure<T>,
        on_rejected: Option<RejectClosure<T>>,
    ) -> Promise<T> {
        let dependent = Promise::new();
        let action = PendingAction {
            dependent: dependent.clone(),
            on_fulfilled,
            on_rejected,
        };
        let immediate = self.state.synchronize(|state| match state {
            State::Pending(actions) => {
                actions.push(action);
                None
            }
            State::Fulfilled(value) => Some(Immediate::Fulfill(action, value.clone())),
            State::Rejected(error) => Some(Immediate::Reject(action, error.clone())),
        });
        match immediate {
            None => {}
            Some(Immediate::Fulfill(action, value)) => action.fulfill(value),
            Some(Immediate::Reject(action, error)) => action.reject(error),
        }
        dependent
    }
}

/// The same-typed `valueAsPromise` adaptation: a value becomes a fulfilled
/// promise, an error a rejected one, and an existing promise is returned
/// unchanged rather than wrapped.
impl<T: Clone + Send + 'static> From<ClosureResult<T>> for Promise<T> {
    fn from(result: ClosureResult<T>) -> Self {
        match result {
            ClosureResult::Value(value) => Promise::fulfilled(value),
            ClosureResult::Error(error) => Promise::rejected(error),
            ClosureResult::Pending(promise) => promise,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state.synchronize(|state| match state {
            State::Pending(actions) => write!(f, "Promise::Pending({} actions)", actions.len()),
            State::Fulfilled(value) => write!(f, "Promise::Fulfilled({value:?})"),
            State::Rejected(error) => write!(f, "Promise::Rejected({error})"),
        })
    }
}
