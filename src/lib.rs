//! Per-function memoization and currying.
//!
//! Wrapping a function with [`memoize`] gives it a private cache: the first
//! call with some arguments runs the function, later calls with equal
//! arguments return a clone of the stored result.
//!
//! ```
//! use memocurry::{curry, memoize_with, Stringified};
//!
//! let add = curry(|a: i64, b: i64| a + b);
//! let add_offset = memoize_with(add(42), Stringified);
//!
//! assert_eq!(add_offset.call(4), 46); // [Miss] The cache is empty.
//! assert_eq!(add_offset.call(6), 48); // [Miss] Different number.
//! assert_eq!(add_offset.call(4), 46); // [Hit] Same number as initially.
//! assert!(add_offset.contains_key(&"4".to_string()));
//! ```
//!
//! What counts as "equal arguments" is decided by a [`KeyPolicy`]. The
//! default, [`ByValue`], compares the arguments themselves. [`Stringified`]
//! and [`Joined`] compare display forms, which conflates values that print
//! the same. [`Hashed`] compares 128-bit hashes.
//!
//! Caches are never evicted and never shared. They are dropped together with
//! their wrapper.

mod curry;
mod hash;
mod key;
mod memoize;
mod sync;

pub use crate::curry::{curry, partial, uncurry};
pub use crate::key::{ByValue, Hashed, JoinArgs, Joined, KeyPolicy, Stringified};
pub use crate::memoize::{
    Memoized, Stats, memoize, memoize_with, try_memoize, try_memoize_with,
};
pub use crate::sync::{
    SyncMemoized, memoize_sync, memoize_sync_with, try_memoize_sync,
    try_memoize_sync_with,
};
#[cfg(feature = "macros")]
pub use memocurry_macros::curry;
