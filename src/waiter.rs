//! Awaiting a promise from async code.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::promise::{ClosureResult, Promise};
use crate::sync::Synchronizer;
use crate::PromiseError;

/// A future over a promise's settlement. Obtained from
/// [`Promise::waiter`]; may be cloned so several tasks await the same
/// outcome.
pub struct Waiter<T> {
    shared: Synchronizer<Inner<T>>,
}

impl<T> Clone for Waiter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Inner<T> {
    outcome: Option<Result<Option<T>, PromiseError>>,
    // Every stored waker is woken at settlement; clones of one waiter may
    // sit on different executors.
    wakers: Vec<Waker>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// A [`Waiter`] future resolving to this promise's settlement.
    ///
    /// Polling never blocks; a pending promise parks the task's waker and
    /// wakes it on settlement.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::executor::block_on;
    /// use promise_chain::Promise;
    /// use std::thread;
    ///
    /// let promise: Promise<String> = Promise::new();
    /// let waiter = promise.waiter();
    /// let consumer = thread::spawn(move || block_on(waiter));
    /// promise.fulfill(Some("done".to_string()));
    /// assert_eq!(
    ///     consumer.join().expect("consumer thread panicked"),
    ///     Ok(Some("done".to_string()))
    /// );
    /// ```
    pub fn waiter(&self) -> Waiter<T> {
        let shared = Synchronizer::new(Inner {
            outcome: None,
            wakers: Vec::new(),
        });
        let fulfill_side = shared.clone();
        let reject_side = shared.clone();
        self.then_catch(
            move |value| {
                let wakers = fulfill_side.synchronize(|inner| {
                    inner.outcome = Some(Ok(value.clone()));
                    mem::take(&mut inner.wakers)
                });
                for waker in wakers {
                    waker.wake();
                }
                ClosureResult::Value(value)
            },
            move |error| {
                let wakers = reject_side.synchronize(|inner| {
                    inner.outcome = Some(Err(error.clone()));
                    mem::take(&mut inner.wakers)
                });
                for waker in wakers {
                    waker.wake();
                }
                ClosureResult::Error(error)
            },
        );
        Waiter { shared }
    }
}

impl<T: Clone + Send + 'static> Future for Waiter<T> {
    type Output = Result<Option<T>, PromiseError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.shared.synchronize(|inner| match &inner.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Promise, PromiseError};
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn waiter_resolves_when_the_promise_fulfills() {
        let promise: Promise<String> = Promise::new();
        let waiter = promise.waiter();
        let consumer = thread::spawn(move || block_on(waiter));
        promise.fulfill(Some("🍓".to_string()));
        assert_eq!(
            consumer.join().expect("consumer thread panicked"),
            Ok(Some("🍓".to_string()))
        );
    }

    #[test]
    fn cloned_waiters_all_observe_the_outcome() {
        let promise: Promise<u32> = Promise::new();
        let waiter = promise.waiter();
        let second = waiter.clone();
        let task1 = thread::spawn(move || block_on(waiter));
        let task2 = thread::spawn(move || block_on(second));
        promise.fulfill(Some(9));
        assert_eq!(task1.join().expect("task1 panicked"), Ok(Some(9)));
        assert_eq!(task2.join().expect("task2 panicked"), Ok(Some(9)));
    }

    #[test]
    fn waiter_surfaces_rejection() {
        let promise: Promise<u32> = Promise::rejected(PromiseError::failed("unreachable host"));
        assert_eq!(
            block_on(promise.waiter()),
            Err(PromiseError::failed("unreachable host"))
        );
    }
}
