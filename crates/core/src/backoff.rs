//! Deterministic retry backoff for queue jobs.

use std::time::Duration;

const BASE_SECONDS: [u64; 5] = [30, 120, 300, 600, 1200];

/// Delay before retry `attempt` (1-based). Base delays grow through
/// [`BASE_SECONDS`] and then repeat the last entry; a pseudo-jitter of
/// +/-10% derived from the attempt number keeps runs reproducible.
///
/// # Panics
/// Panics if `attempt` is zero.
pub fn compute_retry_delay(attempt: u32) -> Duration {
    assert!(attempt >= 1, "attempt must be >= 1");

    let index = usize::min(attempt as usize - 1, BASE_SECONDS.len() - 1);
    let base = BASE_SECONDS[index] as i64;

    // Deterministic jitter in [-10%, +10%] keyed on the attempt number.
    let jitter_percent = ((attempt as i64 * 37) % 21) - 10;
    let seconds = base + base * jitter_percent / 100;
    Duration::from_secs(seconds.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_stays_within_ten_percent_of_base() {
        let delay = compute_retry_delay(1).as_secs();
        assert!((27..=33).contains(&delay), "got {delay}");
    }

    #[test]
    fn second_attempt_stays_within_ten_percent_of_base() {
        let delay = compute_retry_delay(2).as_secs();
        assert!((108..=132).contains(&delay), "got {delay}");
    }

    #[test]
    fn delays_are_deterministic_per_attempt() {
        for attempt in 1..=12 {
            assert_eq!(compute_retry_delay(attempt), compute_retry_delay(attempt));
        }
    }

    #[test]
    fn late_attempts_repeat_last_base() {
        let fifth = compute_retry_delay(5).as_secs();
        let tenth = compute_retry_delay(10).as_secs();
        assert!((1080..=1320).contains(&fifth), "got {fifth}");
        assert!((1080..=1320).contains(&tenth), "got {tenth}");
    }

    #[test]
    #[should_panic(expected = "attempt must be >= 1")]
    fn zero_attempt_is_rejected() {
        let _ = compute_retry_delay(0);
    }
}
