//! Wall clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch.
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Seconds to microseconds, clamping negatives to zero.
pub fn secs_to_us(secs: f64) -> u64 {
    (secs.max(0.0) * 1e6) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_us() {
        assert_eq!(secs_to_us(0.2), 200_000);
        assert_eq!(secs_to_us(-1.0), 0);
    }

    #[test]
    fn test_now_is_monotonic_enough() {
        let a = now_us();
        let b = now_us();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000_000);
    }
}
