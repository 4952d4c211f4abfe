use std::hash::Hash;

use siphasher::sip128::{Hasher128, SipHasher13};

/// Produce a 128-bit hash of a value.
///
/// 128 bits make accidental collisions between distinct argument lists
/// practically impossible, so the hash can stand in for the value as a cache
/// key.
#[inline]
pub fn hash128<T: Hash + ?Sized>(value: &T) -> u128 {
    let mut state = SipHasher13::new();
    value.hash(&mut state);
    state.finish128().as_u128()
}
