//! Aggregation combinators over independently settled promises.

use crate::promise::{ClosureResult, Promise};
use crate::sync::Synchronizer;
use crate::PromiseError;

impl<T: Clone + Send + 'static> Promise<T> {
    /// A promise over the collective outcome of `promises`.
    ///
    /// Fulfills with the original list, each member by then settled, once
    /// every input has fulfilled. Rejects with the first error observed from
    /// any input; later settlements of other inputs no longer affect the
    /// aggregate, though each input stays independently inspectable.
    ///
    /// Completion counting runs under a [`Synchronizer`] shared by this
    /// call's callbacks, so two inputs fulfilling at the same instant cannot
    /// both read a stale count.
    ///
    /// An empty list fulfills immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let first: Promise<String> = Promise::new();
    /// let second: Promise<String> = Promise::new();
    /// let both = Promise::all(vec![first.clone(), second.clone()]);
    ///
    /// second.fulfill(Some("two".to_string()));
    /// assert!(both.is_pending());
    /// first.fulfill(Some("one".to_string()));
    ///
    /// let settled = both.value().expect("every input fulfilled");
    /// assert_eq!(settled[0].value(), Some("one".to_string()));
    /// assert_eq!(settled[1].value(), Some("two".to_string()));
    /// ```
    pub fn all(promises: Vec<Promise<T>>) -> Promise<Vec<Promise<T>>> {
        let result: Promise<Vec<Promise<T>>> = Promise::new();
        let total = promises.len();
        if total == 0 {
            result.fulfill(Some(Vec::new()));
            return result;
        }
        let completed = Synchronizer::new(0usize);
        for promise in &promises {
            let fulfill_side = result.clone();
            let reject_side = result.clone();
            let completed = completed.clone();
            let members = promises.clone();
            promise.then_catch(
                move |value| {
                    let done = completed.synchronize(|count| {
                        *count += 1;
                        *count == total
                    });
                    if done {
                        fulfill_side.fulfill(Some(members));
                    }
                    ClosureResult::Value(value)
                },
                move |error| {
                    reject_side.reject(error.clone());
                    ClosureResult::Error(error)
                },
            );
        }
        result
    }

    /// A promise over the first outcome among `promises`.
    ///
    /// Fulfills with the value of the first input to fulfill; every later
    /// settlement of the other inputs is ignored. If all inputs reject, the
    /// aggregate rejects with the last error observed. An empty list rejects
    /// immediately with [`PromiseError::NothingToAwait`].
    pub fn any(promises: Vec<Promise<T>>) -> Promise<T> {
        let result: Promise<T> = Promise::new();
        let total = promises.len();
        if total == 0 {
            result.reject(PromiseError::NothingToAwait);
            return result;
        }
        let rejected = Synchronizer::new(0usize);
        for promise in &promises {
            let fulfill_side = result.clone();
            let reject_side = result.clone();
            let rejected = rejected.clone();
            promise.then_catch(
                move |value| {
                    fulfill_side.fulfill(value.clone());
                    ClosureResult::Value(value)
                },
                move |error| {
                    let exhausted = rejected.synchronize(|count| {
                        *count += 1;
                        *count == total
                    });
                    if exhausted {
                        reject_side.reject(error.clone());
                    }
                    ClosureResult::Error(error)
                },
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::{Promise, PromiseError};

    fn pending_batch(count: usize) -> Vec<Promise<String>> {
        (0..count).map(|_| Promise::new()).collect()
    }

    #[test]
    fn all_fulfills_only_after_the_last_input() {
        let promises = pending_batch(5);
        let aggregate = Promise::all(promises.clone());
        // arbitrary settlement order
        for index in [3, 0, 4, 1] {
            promises[index].fulfill(Some(format!("test{index}")));
            assert!(aggregate.is_pending());
        }
        promises[2].fulfill(Some("test2".to_string()));
        assert!(aggregate.is_fulfilled());

        let settled = aggregate.value().expect("aggregate carries the input list");
        assert_eq!(settled.len(), 5);
        for (index, member) in settled.iter().enumerate() {
            assert!(member.is_fulfilled());
            assert_eq!(member.value(), Some(format!("test{index}")));
        }
    }

    #[test]
    fn all_fulfills_when_inputs_settled_before_the_call() {
        let promises: Vec<Promise<String>> = (0..5)
            .map(|index| Promise::fulfilled(Some(format!("test{index}"))))
            .collect();
        let aggregate = Promise::all(promises);
        assert!(aggregate.is_fulfilled());
        assert_eq!(aggregate.value().map(|members| members.len()), Some(5));
    }

    #[test]
    fn all_rejects_with_the_first_error() {
        let promises = pending_batch(5);
        let aggregate = Promise::all(promises.clone());
        for (index, promise) in promises.iter().enumerate() {
            if index == 1 {
                promise.reject(PromiseError::failed("error1"));
            } else {
                promise.fulfill(Some(format!("test{index}")));
            }
        }
        assert!(aggregate.is_rejected());
        assert_eq!(aggregate.error(), Some(PromiseError::failed("error1")));
        // the other inputs settled on their own terms
        assert_eq!(promises[4].value(), Some("test4".to_string()));
    }

    #[test]
    fn all_rejects_when_an_input_already_failed() {
        let mut promises: Vec<Promise<String>> = (0..5)
            .map(|index| Promise::fulfilled(Some(format!("test{index}"))))
            .collect();
        promises[1] = Promise::rejected(PromiseError::failed("error1"));
        let aggregate = Promise::all(promises);
        assert_eq!(aggregate.error(), Some(PromiseError::failed("error1")));
    }

    #[test]
    fn any_fulfills_with_the_first_settlement() {
        let promises = pending_batch(5);
        let aggregate = Promise::any(promises.clone());
        promises[1].fulfill(Some("v1".to_string()));
        assert_eq!(aggregate.value(), Some("v1".to_string()));

        // later settlements leave the aggregate untouched
        promises[0].fulfill(Some("v0".to_string()));
        promises[2].reject(PromiseError::failed("late"));
        assert_eq!(aggregate.value(), Some("v1".to_string()));
    }

    #[test]
    fn any_rejects_with_the_last_error_when_all_fail() {
        let promises = pending_batch(3);
        let aggregate = Promise::any(promises.clone());
        for (index, promise) in promises.iter().enumerate() {
            promise.reject(PromiseError::failed(format!("error{index}")));
        }
        assert_eq!(aggregate.error(), Some(PromiseError::failed("error2")));
    }

    #[test]
    fn any_stays_pending_while_some_input_might_fulfill() {
        let promises = pending_batch(2);
        let aggregate = Promise::any(promises.clone());
        promises[0].reject(PromiseError::failed("error0"));
        assert!(aggregate.is_pending());
        promises[1].fulfill(Some("v1".to_string()));
        assert_eq!(aggregate.value(), Some("v1".to_string()));
    }

    #[test]
    fn empty_aggregates_settle_immediately() {
        let all: Promise<Vec<Promise<String>>> = Promise::all(Vec::new());
        assert!(all.is_fulfilled());
        assert_eq!(all.value().map(|members| members.len()), Some(0));

        let any: Promise<String> = Promise::any(Vec::new());
        assert_eq!(any.error(), Some(PromiseError::NothingToAwait));
    }
}
