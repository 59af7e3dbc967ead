//! Exchange clock helpers
//!
//! All timestamps in the system are Unix nanoseconds stored as `i64`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix nanoseconds.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_nanos_monotonic_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        // Sanity: after 2020-01-01 in nanos
        assert!(a > 1_577_836_800_000_000_000);
    }
}
