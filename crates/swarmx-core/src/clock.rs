use crate::error::{Result, SwarmError};
use crate::ids::Lamport;

/// Per-thread Lamport clock (§4.2): `observe` implements `local := max(local,
/// env.lamport) + 1`, and separately enforces that a given sender's own
/// lamport never regresses within a thread.
#[derive(Debug, Default)]
pub struct LamportClock {
    local: Lamport,
    per_sender: std::collections::HashMap<String, Lamport>,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the local clock past an incoming envelope's lamport and
    /// checks that `sender_id`'s own clock, within this thread, did not go
    /// backward.
    pub fn observe(&mut self, sender_id: &str, lamport: Lamport) -> Result<Lamport> {
        if let Some(&last) = self.per_sender.get(sender_id) {
            if lamport <= last {
                return Err(SwarmError::ClockRegression);
            }
        }
        self.per_sender.insert(sender_id.to_string(), lamport);
        self.local = self.local.max(lamport) + 1;
        Ok(self.local)
    }

    /// Issues the next lamport value for a local event, without observing
    /// anyone else's clock.
    pub fn tick(&mut self) -> Lamport {
        self.local += 1;
        self.local
    }

    pub fn current(&self) -> Lamport {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_advances_local_past_max() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.observe("a", 5).unwrap(), 6);
        assert_eq!(clock.observe("b", 3).unwrap(), 6);
    }

    #[test]
    fn regression_within_sender_rejected() {
        let mut clock = LamportClock::new();
        clock.observe("a", 10).unwrap();
        assert_eq!(clock.observe("a", 9), Err(SwarmError::ClockRegression));
        assert_eq!(clock.observe("a", 10), Err(SwarmError::ClockRegression));
    }

    #[test]
    fn different_senders_do_not_interfere() {
        let mut clock = LamportClock::new();
        clock.observe("a", 10).unwrap();
        assert!(clock.observe("b", 1).is_ok());
    }
}
