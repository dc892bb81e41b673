//! Assertion helpers for approximate comparisons.

use std::time::Duration;

/// Assert that two floats differ by less than `epsilon`.
///
/// ```ignore
/// use oncovista_common::testing::assert_approx_eq;
///
/// assert_approx_eq(0.8 * 0.8, 0.64, 1e-9);
/// ```
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: f64) {
    let diff = (actual - expected).abs();
    assert!(diff < epsilon, "Values not approximately equal: {actual} vs {expected} (diff: {diff})");
}

/// Assert that a duration lies within `tolerance` of `expected`.
pub fn assert_duration_in_range(actual: Duration, expected: Duration, tolerance: Duration) {
    let min = expected.saturating_sub(tolerance);
    let max = expected + tolerance;
    assert!(
        actual >= min && actual <= max,
        "Duration {actual:?} not within {tolerance:?} of {expected:?}"
    );
}
