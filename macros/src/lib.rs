extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("memocurry: ", $fmt) $($tts)*)
        ))
    }
}

mod curry;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, Result};

/// Curry a function.
///
/// A function of several arguments becomes a function of its first argument
/// that returns a function of the next one, until all arguments are supplied.
///
/// ```ignore
/// #[curry]
/// fn add(a: i64, b: i64) -> i64 {
///     a + b
/// }
///
/// let add_three = add(3);
/// assert_eq!(add_three(4), 7);
/// ```
///
/// Every argument but the last is cloned into the next stage, so it must be
/// `Clone`. With three or more arguments the inner stages are boxed, which
/// additionally requires the captured arguments to be owned. Functions with
/// fewer than two arguments are left as they are.
///
/// Inside the body, the function's own name refers to the curried version,
/// so recursive calls supply one argument at a time:
///
/// ```ignore
/// #[curry]
/// fn power(base: u64, exp: u32) -> u64 {
///     if exp == 0 { 1 } else { base * power(base)(exp - 1) }
/// }
/// ```
///
/// Rejected with a compile error: methods, generic functions, `const`,
/// `async`, `unsafe` and variadic functions, and arguments bound by patterns
/// (`(a, b): (i64, i64)`) or with `mut`/`ref`.
#[proc_macro_attribute]
pub fn curry(_: TokenStream, stream: TokenStream) -> TokenStream {
    let func = syn::parse_macro_input!(stream as syn::ItemFn);
    curry::expand(func)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
