//! Time sources and the frame scheduler
//!
//! The office core never reads the wall clock itself. It is driven by
//! [`FrameScheduler`], which pairs a [`Clock`] with a frame length, so tests
//! and the `simulate` command can fast-forward with a [`ManualClock`].

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::state::Office;

/// Monotonic milliseconds
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock, measured from construction
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and headless runs
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Drives [`Office::tick`] from a time source
#[derive(Debug)]
pub struct FrameScheduler<C: Clock> {
    clock: C,
    frame_ms: u64,
}

impl<C: Clock> FrameScheduler<C> {
    pub fn new(clock: C, frame_rate: f64) -> Self {
        let frame_ms = (1000.0 / frame_rate.max(1.0)).round().max(1.0) as u64;
        Self { clock, frame_ms }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn frame_ms(&self) -> u64 {
        self.frame_ms
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    /// Run one frame at the clock's current time
    pub fn tick(&self, office: &mut Office) {
        office.tick(self.clock.now_ms());
    }
}

impl FrameScheduler<ManualClock> {
    /// Advance frame by frame until `done` holds or `limit_ms` passes.
    /// `done` sees the office before every frame and may feed it input.
    /// Returns whether `done` was reached.
    pub fn run_until(
        &self,
        office: &mut Office,
        limit_ms: u64,
        mut done: impl FnMut(&mut Office) -> bool,
    ) -> bool {
        let end = self.clock.now_ms() + limit_ms;
        while self.clock.now_ms() < end {
            if done(office) {
                return true;
            }
            self.clock.advance(self.frame_ms);
            self.tick(office);
        }
        done(office)
    }
}
