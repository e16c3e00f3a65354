use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

/// Coalesces triggers that arrive within `delay` of each other into one firing.
///
/// Each trigger pushes the deadline out to `now + delay`; the debouncer only
/// fires once the deadline has passed without another trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.delay,
        };
    }

    /// Move back to idle if the deadline has passed. Returns true when the
    /// debounced action should run.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert!(!debouncer.fire(Instant::now() + Duration::from_secs(60)));
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        debouncer.trigger(start);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_secs(1)));

        // Too early
        assert!(!debouncer.fire(start + Duration::from_millis(999)));
        assert!(debouncer.is_pending());

        assert!(debouncer.fire(start + Duration::from_secs(1)));
        assert_eq!(debouncer.state(), DebounceState::Idle);

        // Already fired
        assert!(!debouncer.fire(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_triggers_within_window_coalesce() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        debouncer.trigger(start);
        debouncer.trigger(start + Duration::from_millis(300));
        debouncer.trigger(start + Duration::from_millis(600));

        // The first deadline has passed but the window was extended
        assert!(!debouncer.fire(start + Duration::from_millis(1200)));
        assert!(debouncer.fire(start + Duration::from_millis(1600)));
        assert!(!debouncer.fire(start + Duration::from_millis(1700)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let start = Instant::now();
        sleep_until_deadline(Some(start + Duration::from_secs(3))).await;
        assert!(Instant::now() >= start + Duration::from_secs(3));

        let never = tokio::time::timeout(Duration::from_secs(10), sleep_until_deadline(None)).await;
        assert!(never.is_err());
    }
}
