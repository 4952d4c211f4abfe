use memocurry::memoize;

#[test]
fn test_simple() {
    let empty = memoize(|(): ()| format!("The world is {}", "big"));
    empty.call(()); // [Miss] The cache is empty.
    empty.call(()); // [Hit] Always a hit from now on.
    empty.call(()); // [Hit] Always a hit from now on.
    assert_eq!(empty.stats().misses, 1);

    let double = memoize(|x: u32| 2 * x);
    double.call(2); // [Miss] The cache is empty.
    double.call(4); // [Miss] Different number.
    double.call(2); // [Hit] Same number as initially.
    assert_eq!(double.stats().misses, 2);

    let sum = memoize(|(a, b): (u32, u32)| a + b);
    sum.call((2, 4)); // [Miss] The cache is empty.
    sum.call((2, 3)); // [Miss] Different numbers.
    sum.call((2, 3)); // [Hit]  Same numbers
    sum.call((4, 2)); // [Miss] Different numbers.
    assert_eq!(sum.stats().misses, 3);
}
