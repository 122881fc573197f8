use chrono::{DateTime, Local};
use tokio::time::Instant;

/// Represents an entity responsible for providing time across application. Wall time drives
/// calendar decisions (day, hour), monotonic time drives scheduling. Splitting them allows tests
/// to move the calendar independently and lets the daemon notice suspends.
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;
}

#[derive(Clone, Copy)]
pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub mod test_clocks {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, Local};
    use tokio::time::Instant;

    use super::Clock;

    /// Clock that only moves when told to.
    #[derive(Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Local>>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Local>) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        pub fn set(&self, time: DateTime<Local>) {
            *self.now.lock().unwrap() = time;
        }

        pub fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn time(&self) -> DateTime<Local> {
            *self.now.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }
    }

    /// Wall clock that follows tokio time, so paused tests move both clocks together.
    #[derive(Clone)]
    pub struct TestClock {
        pub start_time: DateTime<Local>,
        pub reference: Instant,
    }

    impl TestClock {
        pub fn new(start_time: DateTime<Local>) -> Self {
            Self {
                start_time,
                reference: Instant::now(),
            }
        }
    }

    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }
    }
}
