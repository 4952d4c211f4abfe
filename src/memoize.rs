use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

use crate::key::{ByValue, KeyPolicy};

/// Wrap a function so that its results are cached by argument value.
///
/// Functions of several arguments are memoized through a tuple argument.
pub fn memoize<F, A, V>(func: F) -> Memoized<F, A, V>
where
    F: Fn(A) -> V,
    ByValue: KeyPolicy<A>,
{
    memoize_with(func, ByValue)
}

/// Wrap a function so that its results are cached under keys derived by
/// `policy`.
pub fn memoize_with<F, A, V, P>(func: F, policy: P) -> Memoized<F, A, V, P>
where
    F: Fn(A) -> V,
    P: KeyPolicy<A>,
{
    Memoized::new(func, policy)
}

/// Wrap a fallible function. Only successful results are cached.
pub fn try_memoize<F, A, V, E>(func: F) -> Memoized<F, A, V>
where
    F: Fn(A) -> Result<V, E>,
    ByValue: KeyPolicy<A>,
{
    try_memoize_with(func, ByValue)
}

/// Wrap a fallible function with a custom key policy. Only successful results
/// are cached.
pub fn try_memoize_with<F, A, V, E, P>(func: F, policy: P) -> Memoized<F, A, V, P>
where
    F: Fn(A) -> Result<V, E>,
    P: KeyPolicy<A>,
{
    Memoized::new(func, policy)
}

/// Hit and miss counters of a memoized function.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Calls answered from the cache.
    pub hits: usize,
    /// Calls that invoked the underlying function, including failed ones.
    pub misses: usize,
}

impl Stats {
    /// The total number of calls.
    pub fn calls(&self) -> usize {
        self.hits + self.misses
    }
}

/// A memoized function.
///
/// Owns its cache: results live exactly as long as the wrapper and are never
/// shared with other wrappers. The cache is not thread-safe; see
/// [`SyncMemoized`](crate::SyncMemoized) for that.
pub struct Memoized<F, A, V, P = ByValue>
where
    P: KeyPolicy<A>,
{
    func: F,
    policy: P,
    cache: Cache<P::Key, V>,
    marker: PhantomData<fn(A) -> V>,
}

impl<F, A, V, P> Memoized<F, A, V, P>
where
    P: KeyPolicy<A>,
{
    /// Wrap `func`, deriving keys with `policy`.
    pub fn new(func: F, policy: P) -> Self {
        Self {
            func,
            policy,
            cache: Cache::default(),
            marker: PhantomData,
        }
    }

    /// The number of cached results.
    pub fn len(&self) -> usize {
        self.cache.map.borrow().len()
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
        self.cache.map.borrow().contains_key(key)
    }

    /// The keys of all cached results, in no particular order.
    pub fn keys(&self) -> Vec<P::Key>
    where
        P::Key: Clone,
    {
        self.cache.map.borrow().keys().cloned().collect()
    }

    /// The hit and miss counters.
    pub fn stats(&self) -> Stats {
        self.cache.stats.get()
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

impl<F, A, V, P> Memoized<F, A, V, P>
where
    P: KeyPolicy<A>,
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
    /// arguments.
    ///
    /// Errors are returned as they are and not cached: the next call with the
    /// same arguments runs the function again.
    pub fn try_call<E>(&self, args: A) -> Result<V, E>
    where
        F: Fn(A) -> Result<V, E>,
    {
        self.resolve(args, |func, args| func(args))
    }

    fn resolve<E>(&self, args: A, run: impl FnOnce(&F, A) -> Result<V, E>) -> Result<V, E> {
        let key = self.policy.key(&args);

        if let Some(output) = self.cache.lookup(&key) {
            return Ok(output);
        }

        self.cache.record_miss();
        tracing::debug!(?key, "cache miss, computing");

        // No borrow of the map is held here, so a panic leaves the cache
        // untouched and the function may use other memoized functions.
        match run(&self.func, args) {
            Ok(output) => {
                self.cache.insert(key, output.clone());
                Ok(output)
            }
            Err(err) => {
                tracing::debug!(?key, "computation failed, nothing cached");
                Err(err)
            }
        }
    }
}

impl<F, A, V, P> Debug for Memoized<F, A, V, P>
where
    P: KeyPolicy<A> + Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// The per-wrapper result storage.
struct Cache<K, V> {
    /// Maps from derived keys to memoized results.
    map: RefCell<FxHashMap<K, V>>,
    /// Hit and miss counters.
    stats: Cell<Stats>,
}

impl<K, V> Cache<K, V>
where
    K: std::hash::Hash + Eq + Debug,
    V: Clone,
{
    /// Look for a cached result and count the hit.
    fn lookup(&self, key: &K) -> Option<V> {
        let output = self.map.borrow().get(key).cloned()?;
        let mut stats = self.stats.get();
        stats.hits += 1;
        self.stats.set(stats);
        tracing::trace!(?key, "cache hit");
        Some(output)
    }

    /// Count an invocation of the underlying function.
    fn record_miss(&self) {
        let mut stats = self.stats.get();
        stats.misses += 1;
        self.stats.set(stats);
    }

    /// Store a freshly computed result.
    fn insert(&self, key: K, output: V) {
        tracing::debug!(?key, "caching result");
        self.map.borrow_mut().insert(key, output);
    }
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            map: RefCell::new(FxHashMap::default()),
            stats: Cell::new(Stats::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Joined, Stringified};

    #[test]
    fn test_hit_returns_stored_value() {
        let runs = Cell::new(0);
        let square = memoize(|x: u64| {
            runs.set(runs.get() + 1);
            x * x
        });

        assert_eq!(square.call(12), 144);
        assert_eq!(square.call(12), 144);
        assert_eq!(runs.get(), 1);
        assert_eq!(square.stats(), Stats { hits: 1, misses: 1 });
        assert_eq!(square.stats().calls(), 2);
    }

    #[test]
    fn test_tuple_arguments() {
        let runs = Cell::new(0);
        let sum = memoize_with(
            |(a, b): (u32, u32)| {
                runs.set(runs.get() + 1);
                a + b
            },
            Joined::default(),
        );

        assert_eq!(sum.call((2, 4)), 6);
        assert_eq!(sum.call((4, 2)), 6);
        assert_eq!(sum.call((2, 4)), 6);
        assert_eq!(runs.get(), 2);
        assert!(sum.contains_key(&"2-4".to_string()));
        assert!(sum.contains(&(4, 2)));
        assert!(!sum.contains(&(3, 3)));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let runs = Cell::new(0);
        let parse = try_memoize(|text: String| {
            runs.set(runs.get() + 1);
            if runs.get() == 1 {
                Err("flaky")
            } else {
                text.parse::<i32>().map_err(|_| "invalid")
            }
        });

        assert_eq!(parse.try_call("7".into()), Err("flaky"));
        assert!(parse.is_empty());
        assert_eq!(parse.try_call("7".into()), Ok(7));
        assert_eq!(parse.try_call("7".into()), Ok(7));
        assert_eq!(runs.get(), 2);
        assert_eq!(parse.stats(), Stats { hits: 1, misses: 2 });
    }

    #[test]
    fn test_into_inner_and_debug() {
        let double = memoize_with(|x: i32| 2 * x, Stringified);
        double.call(3);
        let printed = format!("{double:?}");
        assert!(printed.contains("len: 1"));
        let func = double.into_inner();
        assert_eq!(func(5), 10);
    }
}
