//! 24-hour clock with a lock-free read side (C9).
//!
//! The writer (the tick handler) runs with interrupts already disabled and
//! simply increments fields and bumps `version`. The reader runs from task
//! context with interrupts enabled and uses the classic optimistic-read
//! pattern: read `version`, copy the fields, read `version` again, retry if
//! they differ. `version` and every field it brackets must be the width the
//! target reads/writes atomically; `portable_atomic` is what guarantees that
//! on cores (like AVR) without a native wide atomic.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::Config;

/// A point in time on a 24-hour wall clock.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// Tick-driven clock with a version-stamped optimistic reader protocol.
pub struct Clock24 {
    hours: AtomicU8,
    minutes: AtomicU8,
    seconds: AtomicU8,
    version: AtomicU32,
    sub_second_ticks: AtomicU8,
}

impl Clock24 {
    pub const fn new() -> Self {
        Clock24 {
            hours: AtomicU8::new(0),
            minutes: AtomicU8::new(0),
            seconds: AtomicU8::new(0),
            version: AtomicU32::new(0),
            sub_second_ticks: AtomicU8::new(0),
        }
    }

    /// Writer side. Called once per tick from the tick handler, which is
    /// already running with interrupts disabled. Returns `true` on the tick
    /// that rolled the clock over from `23:59:59` to `00:00:00`.
    pub fn advance(&self) -> bool {
        let sub_second = self.sub_second_ticks.load(Ordering::Relaxed) + 1;
        if sub_second < Config::TICK_FREQUENCY_HZ as u8 {
            self.sub_second_ticks.store(sub_second, Ordering::Relaxed);
            return false;
        }
        self.sub_second_ticks.store(0, Ordering::Relaxed);

        self.version.fetch_add(1, Ordering::Relaxed);

        let mut seconds = self.seconds.load(Ordering::Relaxed) + 1;
        let mut minutes = self.minutes.load(Ordering::Relaxed);
        let mut hours = self.hours.load(Ordering::Relaxed);
        let mut rolled_over = false;

        if seconds > 59 {
            seconds = 0;
            minutes += 1;
            if minutes > 59 {
                minutes = 0;
                hours += 1;
                if hours > 23 {
                    hours = 0;
                    rolled_over = true;
                }
            }
        }

        self.seconds.store(seconds, Ordering::Relaxed);
        self.minutes.store(minutes, Ordering::Relaxed);
        self.hours.store(hours, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);

        rolled_over
    }

    /// Reader side. Loops until it observes a consistent `(H, M, S)` snapshot.
    pub fn get(&self) -> TimeOfDay {
        loop {
            let v1 = self.version.load(Ordering::Acquire);
            let time = TimeOfDay {
                hours: self.hours.load(Ordering::Relaxed),
                minutes: self.minutes.load(Ordering::Relaxed),
                seconds: self.seconds.load(Ordering::Relaxed),
            };
            let v2 = self.version.load(Ordering::Acquire);
            if v1 == v2 {
                return time;
            }
        }
    }
}

impl Default for Clock24 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(clock: &Clock24, ticks: u32) {
        for _ in 0..ticks {
            clock.advance();
        }
    }

    #[test]
    fn one_second_worth_of_ticks_advances_seconds_by_one() {
        let clock = Clock24::new();
        drive(&clock, Config::TICK_FREQUENCY_HZ);
        assert_eq!(
            clock.get(),
            TimeOfDay {
                hours: 0,
                minutes: 0,
                seconds: 1
            }
        );
    }

    #[test]
    fn rolls_over_from_235959_to_000000_exactly_once() {
        let clock = Clock24::new();
        drive(&clock, Config::TICK_FREQUENCY_HZ * (23 * 3600 + 59 * 60 + 59));
        assert_eq!(
            clock.get(),
            TimeOfDay {
                hours: 23,
                minutes: 59,
                seconds: 59
            }
        );

        let rolled = (0..Config::TICK_FREQUENCY_HZ)
            .map(|_| clock.advance())
            .filter(|&r| r)
            .count();
        assert_eq!(rolled, 1);
        assert_eq!(
            clock.get(),
            TimeOfDay {
                hours: 0,
                minutes: 0,
                seconds: 0
            }
        );
    }

    #[test]
    fn version_monotonically_advances() {
        let clock = Clock24::new();
        let before = clock.version.load(Ordering::Relaxed);
        drive(&clock, Config::TICK_FREQUENCY_HZ);
        let after = clock.version.load(Ordering::Relaxed);
        assert_ne!(before, after);
    }

    /// A reader spinning on `get()` while a writer advances the clock from
    /// another thread must never observe a torn (H, M, S) tuple: every
    /// snapshot it sees must be a value the writer actually held at some
    /// point, never a mix of fields from before and after a carry.
    #[test]
    fn concurrent_reader_never_observes_a_torn_snapshot() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(Clock24::new());
        let writer_clock = Arc::clone(&clock);
        let writer = thread::spawn(move || {
            for _ in 0..(Config::TICK_FREQUENCY_HZ * 180) {
                writer_clock.advance();
            }
        });

        let mut last_total = 0u32;
        while !writer.is_finished() {
            let t = clock.get();
            assert!(t.hours < 24 && t.minutes < 60 && t.seconds < 60);
            let total = t.hours as u32 * 3600 + t.minutes as u32 * 60 + t.seconds as u32;
            assert!(total >= last_total || (last_total >= 86340 && total < 60));
            last_total = total;
        }
        writer.join().unwrap();
    }
}
