use std::rc::Rc;

/// Turn a function of two arguments into a function of the first argument
/// that returns a function of the second.
///
/// ```
/// let add = memocurry::curry(|a: i64, b: i64| a + b);
/// let add_three = add(3);
/// assert_eq!(add_three(4), 7);
/// ```
pub fn curry<F, A, B, Out>(func: F) -> impl Fn(A) -> Box<dyn Fn(B) -> Out>
where
    F: Fn(A, B) -> Out + 'static,
    A: Clone + 'static,
    B: 'static,
    Out: 'static,
{
    let func = Rc::new(func);
    move |first: A| -> Box<dyn Fn(B) -> Out> {
        let func = Rc::clone(&func);
        Box::new(move |second: B| func(first.clone(), second))
    }
}

/// Fix the first argument of a two-argument function.
pub fn partial<F, A, B, Out>(func: F, first: A) -> impl Fn(B) -> Out
where
    F: Fn(A, B) -> Out,
    A: Clone,
{
    move |second: B| func(first.clone(), second)
}

/// Turn a curried function back into a function of two arguments.
pub fn uncurry<G, H, A, B, Out>(curried: G) -> impl Fn(A, B) -> Out
where
    G: Fn(A) -> H,
    H: Fn(B) -> Out,
{
    move |first: A, second: B| curried(first)(second)
}
