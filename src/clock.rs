//! Monotonic sleep and polling helper (C1).

use std::time::{Duration, Instant};

/// Block the calling thread for at least `duration`.
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}

/// Poll `pred` on a monotonic clock until it returns `true` or `timeout`
/// elapses. Returns `true` on the first true observation, `false` on
/// timeout. Any panic inside `pred` propagates unchanged.
pub fn until(mut pred: impl FnMut() -> bool, timeout: Duration, interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(interval.min(deadline.saturating_duration_since(Instant::now())));
    }
}

/// [`until`] with the default 1-second poll interval.
pub fn until_default(pred: impl FnMut() -> bool, timeout: Duration) -> bool {
    until(pred, timeout, Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn until_returns_true_on_first_match() {
        assert!(until(|| true, Duration::from_secs(1), Duration::from_millis(10)));
    }

    #[test]
    fn until_times_out_when_predicate_never_true() {
        assert!(!until(
            || false,
            Duration::from_millis(50),
            Duration::from_millis(10)
        ));
    }

    #[test]
    fn until_observes_predicate_becoming_true() {
        let calls = AtomicU32::new(0);
        let result = until(
            || calls.fetch_add(1, Ordering::SeqCst) >= 2,
            Duration::from_secs(2),
            Duration::from_millis(5),
        );
        assert!(result);
    }
}
