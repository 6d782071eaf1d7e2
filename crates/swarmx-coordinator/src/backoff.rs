use rand::Rng;

/// Exponential backoff with jitter, ported from
/// `original_source/src/auction/backoff.py::calculate_backoff`:
/// `base * 2^attempt`, capped at `max_delay`, jittered by `±jitter`,
/// floored at zero.
pub fn calculate_backoff(attempt: u32, base: f64, max_delay: f64, jitter: f64) -> f64 {
    let exponential = base * 2f64.powi(attempt as i32);
    let capped = exponential.min(max_delay);
    let jittered = if jitter > 0.0 {
        capped + rand::thread_rng().gen_range(-jitter..=jitter)
    } else {
        capped
    };
    jittered.max(0.0)
}

/// Stateful wrapper tracking the current attempt count, mirroring the
/// source's `RandomizedBackoff` class.
#[derive(Clone, Debug)]
pub struct RandomizedBackoff {
    base: f64,
    max_delay: f64,
    jitter: f64,
    attempt: u32,
}

impl RandomizedBackoff {
    pub fn new(base: f64, max_delay: f64, jitter: f64) -> Self {
        Self { base, max_delay, jitter, attempt: 0 }
    }

    pub fn get_delay(&self, attempt: u32) -> f64 {
        calculate_backoff(attempt, self.base, self.max_delay, self.jitter)
    }

    /// Returns the delay for the current attempt, then advances it.
    pub fn next(&mut self) -> f64 {
        let delay = self.get_delay(self.attempt);
        self.attempt += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn current_attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        assert_eq!(calculate_backoff(0, 1.0, 100.0, 0.0), 1.0);
        assert_eq!(calculate_backoff(3, 1.0, 100.0, 0.0), 8.0);
        assert_eq!(calculate_backoff(10, 1.0, 100.0, 0.0), 100.0);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for attempt in 0..5 {
            let delay = calculate_backoff(attempt, 1.0, 100.0, 0.5);
            let exponential = (1.0f64 * 2f64.powi(attempt as i32)).min(100.0);
            assert!(delay >= (exponential - 0.5).max(0.0));
            assert!(delay <= exponential + 0.5);
        }
    }

    #[test]
    fn stateful_backoff_advances_and_resets() {
        let mut backoff = RandomizedBackoff::new(1.0, 100.0, 0.0);
        assert_eq!(backoff.current_attempt(), 0);
        assert_eq!(backoff.next(), 1.0);
        assert_eq!(backoff.next(), 2.0);
        assert_eq!(backoff.current_attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.current_attempt(), 0);
    }
}
