use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::hash::hash128;

/// Derives a cache key from the arguments of a memoized call.
///
/// Two calls share a cache entry exactly when their keys are equal, so the
/// policy decides which argument values are considered "the same". Any
/// closure `Fn(&A) -> K` is a policy, too.
pub trait KeyPolicy<A: ?Sized> {
    /// The derived key.
    type Key: Hash + Eq + Debug;

    /// Derive the key for `args`. Must be deterministic.
    fn key(&self, args: &A) -> Self::Key;
}

impl<A, K, F> KeyPolicy<A> for F
where
    A: ?Sized,
    K: Hash + Eq + Debug,
    F: Fn(&A) -> K,
{
    type Key = K;

    fn key(&self, args: &A) -> K {
        self(args)
    }
}

/// Uses the arguments themselves as the key.
///
/// This is the strictest policy: two calls hit the same entry only if their
/// arguments compare equal.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ByValue;

impl<A> KeyPolicy<A> for ByValue
where
    A: Hash + Eq + Clone + Debug,
{
    type Key = A;

    fn key(&self, args: &A) -> A {
        args.clone()
    }
}

/// Uses the argument's `Display` form as the key.
///
/// Distinct values that print the same share an entry. An operand enum that
/// prints both `Int(4)` and `Text("4")` as `4` caches them as one call.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Stringified;

impl<A> KeyPolicy<A> for Stringified
where
    A: Display + ?Sized,
{
    type Key = String;

    fn key(&self, args: &A) -> String {
        args.to_string()
    }
}

/// Joins the `Display` forms of all arguments with a delimiter.
///
/// Arguments that themselves contain the delimiter can collide:
/// `("a-b", "c")` and `("a", "b-c")` both produce `a-b-c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    delimiter: String,
}

impl Joined {
    /// Create a policy joining with a custom delimiter.
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self { delimiter: delimiter.into() }
    }

    /// The delimiter placed between arguments.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}

impl Default for Joined {
    fn default() -> Self {
        Self::new("-")
    }
}

impl<A> KeyPolicy<A> for Joined
where
    A: JoinArgs + ?Sized,
{
    type Key = String;

    fn key(&self, args: &A) -> String {
        args.join_args(&self.delimiter)
    }
}

/// Hashes the arguments into a 128-bit key.
///
/// Keeps the cache small for large arguments without cloning them.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Hashed;

impl<A> KeyPolicy<A> for Hashed
where
    A: Hash + ?Sized,
{
    type Key = u128;

    fn key(&self, args: &A) -> u128 {
        hash128(args)
    }
}

/// An argument list whose elements can be joined into a string.
pub trait JoinArgs {
    /// Join the `Display` forms of all elements with `delimiter`.
    fn join_args(&self, delimiter: &str) -> String;
}

/// Write all parts into one string, separated by `delimiter`.
fn join_displayed(parts: &[&dyn Display], delimiter: &str) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(&part.to_string());
    }
    out
}

impl<T: Display> JoinArgs for [T] {
    fn join_args(&self, delimiter: &str) -> String {
        let parts: Vec<&dyn Display> = self.iter().map(|v| v as &dyn Display).collect();
        join_displayed(&parts, delimiter)
    }
}

impl<T: Display> JoinArgs for Vec<T> {
    fn join_args(&self, delimiter: &str) -> String {
        self.as_slice().join_args(delimiter)
    }
}

impl<T: Display, const N: usize> JoinArgs for [T; N] {
    fn join_args(&self, delimiter: &str) -> String {
        self.as_slice().join_args(delimiter)
    }
}

macro_rules! join_tuple {
    ($($param:ident),+) => {
        impl<$($param: Display),+> JoinArgs for ($($param,)+) {
            #[allow(non_snake_case)]
            fn join_args(&self, delimiter: &str) -> String {
                let ($($param,)+) = self;
                join_displayed(&[$($param as &dyn Display),+], delimiter)
            }
        }
    };
}

join_tuple!(A);
join_tuple!(A, B);
join_tuple!(A, B, C);
join_tuple!(A, B, C, D);
join_tuple!(A, B, C, D, E);
join_tuple!(A, B, C, D, E, F);
join_tuple!(A, B, C, D, E, F, G);
join_tuple!(A, B, C, D, E, F, G, H);
