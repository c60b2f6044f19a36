//! Cancellable quiet-period timer

use std::time::Duration;

use tokio::time::Instant;

/// Fires once a quiet period has passed since the last [`Debouncer::arm`].
///
/// Re-arming pushes the deadline out, so a burst of events yields a single
/// firing. [`Debouncer::fired`] is cancel-safe and can sit in a
/// `tokio::select!` loop next to the events that arm it.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Start or restart the quiet period
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Drop the pending firing, if any
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Disarm and report whether a firing was pending
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the deadline, then disarm. Never completes while unarmed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(600);

    #[tokio::test(start_paused = true)]
    async fn fires_after_quiet_period() {
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.arm();
        let started = Instant::now();

        debouncer.fired().await;

        assert_eq!(started.elapsed(), QUIET);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_extends_the_deadline() {
        let mut debouncer = Debouncer::new(QUIET);
        let started = Instant::now();
        debouncer.arm();
        tokio::time::advance(Duration::from_millis(400)).await;
        debouncer.arm();

        debouncer.fired().await;

        assert_eq!(started.elapsed(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn unarmed_never_fires() {
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.arm();
        debouncer.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), debouncer.fired()).await;
        assert!(outcome.is_err());
    }

    #[test]
    fn flush_reports_pending_work() {
        let mut debouncer = Debouncer::new(QUIET);
        assert!(!debouncer.flush());
        debouncer.arm();
        assert!(debouncer.flush());
        assert!(!debouncer.is_armed());
    }
}
