use std::time::{Duration, Instant};

/// Fixed-interval gate: `due` says yes at most once per period.
#[derive(Debug)]
pub struct Cadence {
    last: Option<Instant>,
    period: Duration,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self { last: None, period }
    }

    /// From a rate in Hz; zero or negative rates never fire.
    pub fn from_hz(hz: f32) -> Option<Self> {
        if hz > 0.0 {
            Some(Self::new(Duration::from_secs_f32(1.0 / hz)))
        } else {
            None
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn due(&mut self) -> bool {
        self.due_at(Instant::now())
    }

    pub fn due_at(&mut self, now: Instant) -> bool {
        if let Some(t) = self.last {
            if now.duration_since(t) < self.period { return false; }
        }
        self.last = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let mut c = Cadence::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(c.due_at(t0));
        assert!(!c.due_at(t0 + Duration::from_millis(100)));
        assert!(!c.due_at(t0 + Duration::from_millis(499)));
        assert!(c.due_at(t0 + Duration::from_millis(500)));
        assert!(!c.due_at(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn zero_rate_is_disabled() {
        assert!(Cadence::from_hz(0.0).is_none());
        assert_eq!(Cadence::from_hz(2.0).unwrap().period(), Duration::from_millis(500));
    }
}
