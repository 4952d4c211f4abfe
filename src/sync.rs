use std::convert::Infallible;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::key::{ByValue, KeyPolicy};
use crate::memoize::Stats;

/// Wrap a function so that its results are cached by argument value and the
/// wrapper can be shared between threads.
pub fn memoize_sync<F, A, V>(func: F) -> SyncMemoized<F, A, V>
where
    F: Fn(A) -> V,
    ByValue: KeyPolicy<A>,
{
    memoize_sync_with(func, ByValue)
}

/// Like [`memoize_sync`], but with a custom key policy.
pub fn memoize_sync_with<F, A, V, P>(func: F, policy: P) -> SyncMemoized<F, A, V, P>
where
    F: Fn(A) -> V,
    P: KeyPolicy<A>,
{
    SyncMemoized::new(func, policy)
}

/// Wrap a fallible function for use from several threads. Only successful
/// results are cached.
pub fn try_memoize_sync<F, A, V, E>(func: F) -> SyncMemoized<F, A, V>
where
    F: Fn(A) -> Result<V, E>,
    ByValue: KeyPolicy<A>,
{
    try_memoize_sync_with(func, ByValue)
}

/// Like [`try_memoize_sync`], but with a custom key policy.
pub fn try_memoize_sync_with<F, A, V, E, P>(func: F, policy: P) -> SyncMemoized<F, A, V, P>
where
    F: Fn(A) -> Result<V, E>,
    P: KeyPolicy<A>,
{
    SyncMemoized::new(func, policy)
}

/// A memoized function that can be called from several threads at once.
///
/// Looking up, computing and storing a result is a critical section per key:
/// concurrent calls with equal keys wait for the first one to finish instead
/// of computing the result again. Calls with different keys compute in
/// parallel.
///
/// Calling the wrapper from inside its own function with the same key
/// deadlocks.
pub struct SyncMemoized<F, A, V, P = ByValue>
where
    P: KeyPolicy<A>,
{
    func: F,
    policy: P,
    /// Maps from derived keys to result slots. A slot is empty while its
    /// result is being computed.
    slots: RwLock<FxHashMap<P::Key, Arc<OnceCell<V>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    marker: PhantomData<fn(A) -> V>,
}

impl<F, A, V, P> SyncMemoized<F, A, V, P>
where
    P: KeyPolicy<A>,
{
    /// Wrap `func`, deriving keys with `policy`.
    pub fn new(func: F, policy: P) -> Self {
        Self {
            func,
            policy,
            slots: RwLock::new(FxHashMap::default()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            marker: PhantomData,
        }
    }

    /// The number of cached results.
    pub fn len(&self) -> usize {
        self.slots.read().values().filter(|slot| slot.get().is_some()).count()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a result for these arguments is cached.
    pub fn contains(&self, args: &A) -> bool {
        self.contains_key(&self.policy.key(args))
    }

    /// Whether a result is cached under `key`.
    pub fn contains_key(&self, key: &P::Key) -> bool {
        self.slots.read().get(key).is_some_and(|slot| slot.get().is_some())
    }

    /// The keys of all cached results, in no particular order.
    pub fn keys(&self) -> Vec<P::Key>
    where
        P::Key: Clone,
    {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The hit and miss counters.
    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
        }
    }

    /// The key policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Drop the cache and return the wrapped function.
    pub fn into_inner(self) -> F {
        self.func
    }
}

impl<F, A, V, P> SyncMemoized<F, A, V, P>
where
    P: KeyPolicy<A>,
    P::Key: Clone,
    V: Clone,
{
    /// Call the function or return the cached result for these arguments.
    pub fn call(&self, args: A) -> V
    where
        F: Fn(A) -> V,
    {
        match self.resolve(args, |func, args| Ok::<_, Infallible>(func(args))) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Call a fallible function or return the cached result for these
    /// arguments. Errors are not cached.
    pub fn try_call<E>(&self, args: A) -> Result<V, E>
    where
        F: Fn(A) -> Result<V, E>,
    {
        self.resolve(args, |func, args| func(args))
    }

    fn resolve<E>(&self, args: A, run: impl FnOnce(&F, A) -> Result<V, E>) -> Result<V, E> {
        let key = self.policy.key(&args);
        let slot = self.slot(&key);

        if let Some(output) = slot.get() {
            self.hits.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(?key, "cache hit");
            return Ok(output.clone());
        }

        // Blocks while another thread computes the same key. If that one
        // succeeds, the closure never runs and this call is a hit.
        let mut computed = false;
        let result = slot.get_or_try_init(|| {
            computed = true;
            self.misses.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(?key, "cache miss, computing");
            run(&self.func, args)
        });

        match result {
            Ok(output) => {
                if computed {
                    tracing::debug!(?key, "caching result");
                } else {
                    self.hits.fetch_add(1, Ordering::SeqCst);
                    tracing::trace!(?key, "cache hit after waiting");
                }
                Ok(output.clone())
            }
            Err(err) => {
                tracing::debug!(?key, "computation failed, nothing cached");
                self.discard(&key, &slot);
                Err(err)
            }
        }
    }

    /// Get the slot for a key, creating an empty one if necessary.
    fn slot(&self, key: &P::Key) -> Arc<OnceCell<V>> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }

        Arc::clone(self.slots.write().entry(key.clone()).or_default())
    }

    /// Remove a slot whose computation failed, unless another call filled or
    /// replaced it in the meantime or still holds it.
    ///
    /// Slots are only handed out under the map lock, so while the write lock
    /// is held, a strong count of two (the map and this caller) means no one
    /// else is waiting on or computing into the slot.
    fn discard(&self, key: &P::Key, slot: &Arc<OnceCell<V>>) {
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot)
                && current.get().is_none()
                && Arc::strong_count(current) == 2
        }) {
            slots.remove(key);
        }
    }
}

impl<F, A, V, P> Debug for SyncMemoized<F, A, V, P>
where
    P: KeyPolicy<A> + Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SyncMemoized")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::key::Stringified;

    #[test]
    fn test_once_per_key_under_contention() {
        let runs = AtomicUsize::new(0);
        let slow_double = memoize_sync(|x: u32| {
            runs.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            2 * x
        });

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| assert_eq!(slow_double.call(21), 42));
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(slow_double.stats(), Stats { hits: 7, misses: 1 });
        assert_eq!(slow_double.len(), 1);
    }

    #[test]
    fn test_distinct_keys_each_computed() {
        let runs = AtomicUsize::new(0);
        let inc = memoize_sync_with(
            |x: i64| {
                runs.fetch_add(1, Ordering::SeqCst);
                x + 1
            },
            Stringified,
        );

        thread::scope(|scope| {
            for i in 0..4 {
                let inc = &inc;
                scope.spawn(move || {
                    assert_eq!(inc.call(i), i + 1);
                    assert_eq!(inc.call(i), i + 1);
                });
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 4);
        let mut keys = inc.keys();
        keys.sort();
        assert_eq!(keys, ["0", "1", "2", "3"]);
    }

    #[test]
    fn test_failure_leaves_no_slot() {
        let runs = AtomicUsize::new(0);
        let checked = try_memoize_sync(|x: u8| {
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(format!("first attempt for {x} failed"))
            } else {
                Ok(x)
            }
        });

        assert!(checked.try_call(5).is_err());
        assert!(checked.is_empty());
        assert!(!checked.contains(&5));
        assert_eq!(checked.try_call(5), Ok(5));
        assert_eq!(checked.try_call(5), Ok(5));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_keeps_slot_of_waiting_caller() {
        let attempts = AtomicUsize::new(0);
        let successes = AtomicUsize::new(0);
        let flaky = try_memoize_sync(|x: u32| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(100));
                Err("first attempt failed")
            } else {
                thread::sleep(Duration::from_millis(300));
                successes.fetch_add(1, Ordering::SeqCst);
                Ok(2 * x)
            }
        });

        thread::scope(|scope| {
            // [Miss] Fails after the second caller started waiting.
            let first = scope.spawn(|| flaky.try_call(1));
            // [Miss] Takes over the computation once the first one failed.
            let second = scope.spawn(|| {
                thread::sleep(Duration::from_millis(30));
                flaky.try_call(1)
            });

            assert_eq!(first.join().unwrap(), Err("first attempt failed"));

            // [Hit] Waits for the second caller instead of computing again.
            let third = scope.spawn(|| flaky.try_call(1));
            assert_eq!(second.join().unwrap(), Ok(2));
            assert_eq!(third.join().unwrap(), Ok(2));
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(flaky.stats(), Stats { hits: 1, misses: 2 });
        assert_eq!(flaky.len(), 1);
    }

    #[test]
    fn test_panic_leaves_empty_slot() {
        let runs = AtomicUsize::new(0);
        let fragile = memoize_sync(|x: u16| {
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("boom");
            }
            x + 1
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| fragile.call(3)));
        assert!(result.is_err());
        assert!(fragile.is_empty());
        assert!(!fragile.contains(&3));
        assert!(fragile.keys().is_empty());

        assert_eq!(fragile.call(3), 4); // [Miss] The panic stored nothing.
        assert_eq!(fragile.call(3), 4); // [Hit]
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(fragile.stats(), Stats { hits: 1, misses: 2 });
        assert_eq!(fragile.keys(), [3]);
    }
}
