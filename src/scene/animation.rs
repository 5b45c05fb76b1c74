use log::warn;
use std::time::Duration;

/// Turns variable frame times into a whole number of fixed-interval ticks.
///
/// Leftover time carries over to the next frame. After a long stall the
/// number of ticks handed out at once is capped and the excess is dropped.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    total_ticks: u64,
}

impl TickScheduler {
    /// `interval` must be non-zero.
    pub fn new(interval: Duration, max_ticks_per_frame: u32) -> Self {
        Self {
            interval: interval.max(Duration::from_micros(1)),
            max_ticks_per_frame,
            accumulator: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Adds `elapsed` and returns how many ticks became due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let mut due = 0u32;
        while self.accumulator >= self.interval && due < self.max_ticks_per_frame {
            self.accumulator -= self.interval;
            due += 1;
        }

        if self.accumulator >= self.interval {
            let dropped = self.accumulator.as_nanos() / self.interval.as_nanos();
            warn!("Frame stalled; dropping {dropped} animation ticks");
            self.accumulator = Duration::from_nanos(
                (self.accumulator.as_nanos() % self.interval.as_nanos()) as u64,
            );
        }

        self.total_ticks += u64::from(due);
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_MS: Duration = Duration::from_millis(10);

    #[test]
    fn remainder_carries_into_next_frame() {
        let mut scheduler = TickScheduler::new(TEN_MS, 100);
        assert_eq!(scheduler.advance(Duration::from_millis(16)), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(16)), 2);
        assert_eq!(scheduler.advance(Duration::from_millis(8)), 1);
        assert_eq!(scheduler.total_ticks(), 4);
    }

    #[test]
    fn short_frames_produce_no_ticks() {
        let mut scheduler = TickScheduler::new(TEN_MS, 100);
        assert_eq!(scheduler.advance(Duration::from_millis(3)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(3)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(4)), 1);
    }

    #[test]
    fn stalls_are_capped() {
        let mut scheduler = TickScheduler::new(TEN_MS, 5);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 5);
        // The backlog was dropped, not deferred.
        assert_eq!(scheduler.advance(Duration::ZERO), 0);
    }
}
