//! Drift-free cycle timing
//!
//! Cycle `k` is due at `baseline + k * period`. Deadlines always stay on that grid, so the time
//! a cycle takes never shifts the following ones.

/// Millisecond instant
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Millisecond duration
pub type Duration = fugit::MillisDurationU64;

/// Monotonic millisecond time source
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Next cycle start as decided by [`CycleScheduler::next`]
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Wakeup {
    pub deadline: Instant,
    /// Time left until `deadline`
    pub wait: Duration,
    /// Grid slots that passed while the last cycle was still running
    pub skipped: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct CycleScheduler {
    baseline: Instant,
    period: Duration,
    slot: u64,
}

impl CycleScheduler {
    /// Starts the grid at `baseline`, the first cycle being due right away
    pub fn new(baseline: Instant, period: Duration) -> Self {
        Self {
            baseline,
            period: Duration::from_ticks(period.ticks().max(1)),
            slot: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Index of the grid slot of the current cycle
    pub fn slot(&self) -> u64 {
        self.slot
    }

    pub fn deadline(&self) -> Instant {
        self.slot_start(self.slot)
    }

    fn slot_start(&self, slot: u64) -> Instant {
        Instant::from_ticks(self.baseline.ticks() + slot * self.period.ticks())
    }

    /// Moves to the next cycle, called once the current one has finished at `now`
    ///
    /// Normally this is the following grid slot. After an overrun it is the first slot that is
    /// not yet in the past, never `now + period`.
    pub fn next(&mut self, now: Instant) -> Wakeup {
        let mut slot = self.slot + 1;
        let mut skipped = 0;
        if self.slot_start(slot).ticks() < now.ticks() {
            let elapsed = now.ticks().saturating_sub(self.baseline.ticks());
            let caught_up = elapsed.div_ceil(self.period.ticks());
            skipped = caught_up - slot;
            slot = caught_up;
        }
        self.slot = slot;

        let deadline = self.slot_start(slot);
        let wait = Duration::from_ticks(deadline.ticks().saturating_sub(now.ticks()));
        Wakeup {
            deadline,
            wait,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    fn scheduler(baseline: u64) -> CycleScheduler {
        CycleScheduler::new(at(baseline), Duration::from_ticks(1000))
    }

    #[test]
    fn waits_for_the_rest_of_the_period() {
        let mut scheduler = scheduler(500);

        let wakeup = scheduler.next(at(730));

        assert_eq!(wakeup.deadline.ticks(), 1500);
        assert_eq!(wakeup.wait.ticks(), 770);
        assert_eq!(wakeup.skipped, 0);
    }

    #[test]
    fn cycle_time_does_not_accumulate() {
        let mut scheduler = scheduler(0);
        let mut now = 0;

        for n in 1..=100 {
            // every cycle takes 37 ms
            let wakeup = scheduler.next(at(now + 37));
            now = wakeup.deadline.ticks();
            assert_eq!(now, n * 1000);
        }
    }

    #[test]
    fn overrun_catches_up_on_the_grid() {
        let mut scheduler = scheduler(0);

        // the first cycle takes 1200 ms
        let wakeup = scheduler.next(at(1200));
        assert_eq!(wakeup.deadline.ticks(), 2000);
        assert_eq!(wakeup.wait.ticks(), 800);
        assert_eq!(wakeup.skipped, 1);

        let mut now = wakeup.deadline.ticks();
        for n in 2..50_u64 {
            let wakeup = scheduler.next(at(now + 10));
            now = wakeup.deadline.ticks();
            assert_eq!(now % 1000, 0);
            // one period late at most, never drifting further
            assert!(now - n * 1000 <= 1000);
        }
    }

    #[test]
    fn finishing_exactly_on_the_deadline_does_not_skip() {
        let mut scheduler = scheduler(0);

        let wakeup = scheduler.next(at(1000));

        assert_eq!(wakeup.deadline.ticks(), 1000);
        assert_eq!(wakeup.wait.ticks(), 0);
        assert_eq!(wakeup.skipped, 0);
    }

    #[test]
    fn long_stall_skips_several_slots() {
        let mut scheduler = scheduler(0);

        let wakeup = scheduler.next(at(4321));

        assert_eq!(wakeup.deadline.ticks(), 5000);
        assert_eq!(wakeup.skipped, 4);
        assert_eq!(scheduler.slot(), 5);
    }
}
