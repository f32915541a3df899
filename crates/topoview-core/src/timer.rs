use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Fixed-period schedule driven by caller-supplied timestamps.
///
/// The ticker never reads a clock: the owner passes `now` (time since any fixed origin) to
/// [`Ticker::is_due`] and [`Ticker::reschedule`], so schedules can be exercised without waiting.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next_due: Option<Duration>,
    cancelled: Rc<Cell<bool>>,
}

/// Stops a [`Ticker`] from anywhere that holds the handle.
#[derive(Debug, Clone)]
pub struct TickHandle(Rc<Cell<bool>>);

impl TickHandle {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn handle(&self) -> TickHandle {
        TickHandle(self.cancelled.clone())
    }

    /// Arms the ticker; the first tick is due immediately.
    pub fn start(&mut self, now: Duration) {
        self.cancelled.set(false);
        self.next_due = Some(now);
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some() && !self.cancelled.get()
    }

    pub fn next_due(&self) -> Option<Duration> {
        if self.cancelled.get() {
            return None;
        }
        self.next_due
    }

    pub fn is_due(&self, now: Duration) -> bool {
        self.next_due().is_some_and(|due| now >= due)
    }

    pub fn reschedule(&mut self, now: Duration) {
        if self.cancelled.get() {
            return;
        }
        self.next_due = Some(now + self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_every_period_until_cancelled() {
        let mut t = Ticker::new(Duration::from_secs(1));
        assert!(!t.is_due(Duration::ZERO));
        t.start(Duration::ZERO);
        assert!(t.is_due(Duration::ZERO));
        t.reschedule(Duration::ZERO);
        assert!(!t.is_due(Duration::from_millis(999)));
        assert!(t.is_due(Duration::from_millis(1000)));

        let handle = t.handle();
        handle.cancel();
        assert!(!t.is_due(Duration::from_secs(10)));
        assert!(!t.is_running());
        t.reschedule(Duration::from_secs(10));
        assert_eq!(t.next_due(), None);
    }
}
