//! Mutual-exclusion helper protecting shared promise state.

use std::sync::{Arc, Mutex};

/// Runs blocks of code against shared state `S`, one caller at a time.
///
/// Clones share the same lock domain, so several owners can coordinate
/// through one `Synchronizer` the way the callbacks of a single
/// `Promise::all` invocation share a completion counter.
///
/// Not reentrant: calling [`synchronize`](Self::synchronize) from inside a
/// block on the same domain deadlocks. Callers must keep blocks short and
/// free of calls back into the same synchronizer.
///
/// # Examples
///
/// ```
/// use promise_chain::Synchronizer;
/// use std::thread;
///
/// let counter = Synchronizer::new(0u32);
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let counter = counter.clone();
///         thread::spawn(move || counter.synchronize(|count| *count += 1))
///     })
///     .collect();
/// for handle in handles {
///     handle.join().expect("counting thread panicked");
/// }
/// assert_eq!(counter.synchronize(|count| *count), 4);
/// ```
#[derive(Debug)]
pub struct Synchronizer<S> {
    shared: Arc<Mutex<S>>,
}

impl<S> Clone for Synchronizer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: Default> Default for Synchronizer<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> Synchronizer<S> {
    /// A fresh lock domain owning `state`.
    pub fn new(state: S) -> Self {
        Self {
            shared: Arc::new(Mutex::new(state)),
        }
    }

    /// Runs `block` with exclusive access to the shared state, blocking the
    /// calling thread until the block has run to completion.
    pub fn synchronize<R>(&self, block: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.shared.lock().unwrap();
        block(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::Synchronizer;
    use std::thread;

    #[test]
    fn synchronize_returns_the_block_result() {
        let synchronizer = Synchronizer::new(21);
        assert_eq!(synchronizer.synchronize(|n| *n * 2), 42);
    }

    #[test]
    fn clones_share_one_lock_domain() {
        let synchronizer = Synchronizer::new(0u32);
        let other = synchronizer.clone();
        other.synchronize(|count| *count += 1);
        assert_eq!(synchronizer.synchronize(|count| *count), 1);
    }

    #[test]
    fn concurrent_blocks_serialize() {
        // (inside_block, completed_runs)
        let synchronizer = Synchronizer::new((false, 0u32));
        let workers: Vec<_> = (0..10)
            .map(|_| {
                let synchronizer = synchronizer.clone();
                thread::spawn(move || {
                    synchronizer.synchronize(|state| {
                        assert!(!state.0, "blocks must not overlap");
                        state.0 = true;
                        state.1 += 1;
                        state.0 = false;
                    });
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread panicked");
        }
        assert_eq!(synchronizer.synchronize(|state| state.1), 10);
    }
}
