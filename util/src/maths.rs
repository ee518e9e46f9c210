//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between `min` and `max` (inclusive).
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the signed minimal rotation from `current` to an angle congruent to
/// `target` (mod 2pi).
///
/// The result is in the range (-pi, pi]. Inputs do not need to be normalised.
pub fn wrapped_difference<T>(current: T, target: T) -> T
where
    T: Float
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    wrapped_difference_on(current, target, tau_t)
}

/// Get the signed minimal distance from `current` to a value congruent to
/// `target` modulo `period`.
///
/// The result is in the range (-period/2, period/2].
pub fn wrapped_difference_on<T>(current: T, target: T, period: T) -> T
where
    T: Float
{
    let half = period / T::from(2).unwrap();

    let mut diff = half - rem_euclid(half - (target - current), period);

    // rem_euclid can round up to exactly `period`
    if diff <= -half {
        diff = diff + period;
    }

    diff
}

/// Map a value onto its representative in the range (lo, hi].
pub fn wrap_to_range<T>(value: T, lo: T, hi: T) -> T
where
    T: Float
{
    let period = hi - lo;

    let mut wrapped = hi - rem_euclid(hi - value, period);

    if wrapped <= lo {
        wrapped = wrapped + period;
    }

    wrapped
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    #[test]
    fn test_wrapped_difference() {
        assert!((wrapped_difference(1f64, 2f64) - 1f64).abs() < 1e-12);
        assert!((wrapped_difference(2f64, 1f64) + 1f64).abs() < 1e-12);
        assert!(wrapped_difference(0f64, TAU).abs() < 1e-12);
        assert!(wrapped_difference(TAU, 0f64).abs() < 1e-12);
        assert!((wrapped_difference(1f64, TAU) + 1f64).abs() < 1e-12);
        assert!((wrapped_difference(TAU - 1f64, 1f64) - 2f64).abs() < 1e-12);

        // Opposite angles land on +pi, never -pi
        assert_eq!(wrapped_difference(0f64, PI), PI);
        assert_eq!(wrapped_difference(0f64, -PI), PI);

        // Nearly wrapped values across the seam
        let d = wrapped_difference(-PI + 0.01, PI - 0.01);
        assert!((d + 0.02).abs() < 1e-9, "got {}", d);
    }

    #[test]
    fn test_wrapped_difference_range_and_congruence() {
        let samples = [
            -1000.3, -7.0, -TAU, -4.0, -PI, -1.0, -0.0, 0.0, 0.5, PI / 2.0,
            PI, 3.5, TAU, 9.42, 123.456, 5000.1
        ];

        for &a in samples.iter() {
            for &b in samples.iter() {
                let d = wrapped_difference(a, b);

                assert!(d > -PI && d <= PI, "d({}, {}) = {} out of range", a, b, d);

                // a + d must be congruent to b
                let residual = rem_euclid(a + d - b, TAU);
                let residual = residual.min(TAU - residual);
                assert!(residual < 1e-9, "a = {}, b = {}, residual = {}", a, b, residual);
            }
        }
    }

    #[test]
    fn test_wrapped_difference_on_period() {
        // Degrees
        assert!((wrapped_difference_on(350f64, 10f64, 360f64) - 20f64).abs() < 1e-12);
        assert!((wrapped_difference_on(10f64, 350f64, 360f64) + 20f64).abs() < 1e-12);
        assert_eq!(wrapped_difference_on(0f64, 180f64, 360f64), 180f64);
    }

    #[test]
    fn test_wrap_to_range() {
        assert!((wrap_to_range(3.0 * PI / 2.0, -PI, PI) + PI / 2.0).abs() < 1e-12);
        assert_eq!(wrap_to_range(-PI, -PI, PI), PI);
        assert!((wrap_to_range(0.25, 0.0, 1.0) - 0.25).abs() < 1e-12);
        assert!((wrap_to_range(7.25, 0.0, 1.0) - 0.25).abs() < 1e-12);
        assert_eq!(wrap_to_range(2.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5f64, &-1f64, &1f64), 1f64);
        assert_eq!(clamp(&-5f64, &-1f64, &1f64), -1f64);
        assert_eq!(clamp(&0.3f64, &-1f64, &1f64), 0.3f64);
    }
}
