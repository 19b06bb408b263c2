//! Wall-clock access for the core.
//!
//! All timestamps in SoupNet are unix seconds. Strict per-node
//! monotonicity is enforced by the orchestrator's event factory, which
//! spins until the clock advances; this module only reads the clock.

use chrono::Utc;

/// Current wall-clock time in unix seconds.
pub fn unix_timestamp_now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_past_2024() {
        assert!(unix_timestamp_now() > 1_704_067_200);
    }

    #[test]
    fn clock_never_goes_backwards_between_reads() {
        let first = unix_timestamp_now();
        let second = unix_timestamp_now();
        assert!(second >= first);
    }
}
