//! Linear scaling between a signal's digital codes and physical values.
//!
//! The two directions are not exact inverses: [`physical_to_digital`]
//! truncates toward zero, so a round-trip can be off by one code.

/// Converts a physical value to a 16-bit digital code.
///
/// The scaled value is truncated toward zero and then wrapped to 16 bits
/// (two's complement), not clamped. Files already written under this rule
/// depend on it for bit-exact round-trips.
///
/// Returns `0` when `physical_max == physical_min`.
///
/// ```rust
/// use edfcodec::sample::physical_to_digital;
///
/// assert_eq!(physical_to_digital(0.0, -500.0, 500.0, -2048, 2047), 0);
/// assert_eq!(physical_to_digital(1.0, 5.0, 5.0, -2048, 2047), 0);
/// ```
pub fn physical_to_digital(
    physical: f64,
    physical_min: f64,
    physical_max: f64,
    digital_min: i32,
    digital_max: i32,
) -> i16 {
    if physical_max == physical_min {
        return 0;
    }
    let digital = (physical - physical_min) * (digital_max as f64 - digital_min as f64)
        / (physical_max - physical_min)
        + digital_min as f64;
    // `as i64` truncates toward zero; the second cast keeps the low 16 bits.
    digital as i64 as i16
}

/// Converts a stored digital code to its physical value.
///
/// Returns `0.0` when `digital_max == digital_min`.
pub fn digital_to_physical(
    digital: i16,
    digital_min: i32,
    digital_max: i32,
    physical_min: f64,
    physical_max: f64,
) -> f64 {
    if digital_max == digital_min {
        return 0.0;
    }
    physical_min
        + (digital as f64 - digital_min as f64) * (physical_max - physical_min)
            / (digital_max as f64 - digital_min as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_bounds_return_zero() {
        for v in [-1000.0, 0.0, 3.5, 1e9] {
            assert_eq!(physical_to_digital(v, 10.0, 10.0, -2048, 2047), 0);
        }
        for d in [i16::MIN, -1, 0, 1, i16::MAX] {
            assert_eq!(digital_to_physical(d, 7, 7, -500.0, 500.0), 0.0);
        }
    }

    #[test]
    fn test_bounds_map_to_bounds() {
        assert_eq!(physical_to_digital(-500.0, -500.0, 500.0, -2048, 2047), -2048);
        assert_eq!(physical_to_digital(500.0, -500.0, 500.0, -2048, 2047), 2047);
        assert!((digital_to_physical(-2048, -2048, 2047, -500.0, 500.0) + 500.0).abs() < 1e-9);
        assert!((digital_to_physical(2047, -2048, 2047, -500.0, 500.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // 1.1 * 20 / 2 - 10 ~= 1.0
        let d = physical_to_digital(0.1, -1.0, 1.0, -10, 10);
        assert_eq!(d, 1);
        let d = physical_to_digital(-0.15, -1.0, 1.0, -10, 10);
        // 0.85 * 10 - 10 = -1.5 -> -1 (toward zero, not floor)
        assert_eq!(d, -1);
    }

    #[test]
    fn test_overflow_wraps_instead_of_clamping() {
        // 40000 does not fit in i16; 40000 - 65536 = -25536.
        let d = physical_to_digital(40000.0, 0.0, 1.0, 0, 1);
        assert_eq!(d, -25536);
    }

    #[test]
    fn test_round_trip_within_one_code() {
        let (pmin, pmax, dmin, dmax) = (-500.0, 500.0, -2048, 2047);
        for d in dmin..=dmax {
            let physical = digital_to_physical(d as i16, dmin, dmax, pmin, pmax);
            let back = physical_to_digital(physical, pmin, pmax, dmin, dmax);
            assert!(
                (back as i32 - d).abs() <= 1,
                "code {d} came back as {back}"
            );
        }
    }

    #[test]
    fn test_round_trip_full_range() {
        let (pmin, pmax, dmin, dmax) = (-3.2, 3.2, -32768, 32767);
        for d in (dmin..=dmax).step_by(97) {
            let physical = digital_to_physical(d as i16, dmin, dmax, pmin, pmax);
            let back = physical_to_digital(physical, pmin, pmax, dmin, dmax);
            assert!((back as i32 - d).abs() <= 1);
        }
    }
}
