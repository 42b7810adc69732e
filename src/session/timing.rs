// Frame-driven timing primitives
// Countdowns, the pause-aware session clock and the signal cooldown.
// Time only moves when the host ticks with a frame delta.

use std::time::Duration;

/// Serialize `Duration` as floating-point seconds in config files
pub mod serde_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Result of advancing a countdown by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    /// New count to display, only when it changed this frame
    pub shown: Option<u32>,
    pub finished: bool,
}

/// Visible countdown: `counts` steps of `per_count` each, displayed
/// as the number of counts left (3, 2, 1)
#[derive(Debug, Clone)]
pub struct Countdown {
    per_count: Duration,
    remaining: Duration,
    last_shown: Option<u32>,
}

impl Countdown {
    pub fn new(counts: u32, per_count: Duration) -> Self {
        Countdown {
            per_count,
            remaining: per_count.checked_mul(counts).unwrap_or(Duration::MAX),
            last_shown: None,
        }
    }

    /// A countdown over `total`, displayed in whole seconds
    pub fn seconds(total: Duration) -> Self {
        Countdown {
            per_count: Duration::from_secs(1),
            remaining: total,
            last_shown: None,
        }
    }

    pub fn tick(&mut self, dt: Duration) -> CountdownTick {
        let mut shown = None;

        if !self.remaining.is_zero() {
            let display = self.display();
            if self.last_shown != Some(display) {
                self.last_shown = Some(display);
                shown = Some(display);
            }
            self.remaining = self.remaining.saturating_sub(dt);
        }

        CountdownTick {
            shown,
            finished: self.remaining.is_zero(),
        }
    }

    /// Counts left, rounded up
    pub fn display(&self) -> u32 {
        if self.per_count.is_zero() {
            return 0;
        }
        let ratio = self.remaining.as_secs_f64() / self.per_count.as_secs_f64();
        ratio.ceil() as u32
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Wall-clock accumulator with pause accounting.
///
/// Any number of pause/resume cycles fold into one paused offset that
/// is subtracted from the time since `start`.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    now: Duration,
    started_at: Duration,
    paused_accum: Duration,
    pause_started: Option<Duration>,
}

impl SessionClock {
    pub fn new() -> Self {
        SessionClock::default()
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    /// Restart active-time accounting from the current instant
    pub fn start(&mut self) {
        self.started_at = self.now;
        self.paused_accum = Duration::ZERO;
        self.pause_started = None;
    }

    /// Returns false if already paused
    pub fn pause(&mut self) -> bool {
        if self.pause_started.is_some() {
            return false;
        }
        self.pause_started = Some(self.now);
        true
    }

    /// Returns false if not paused
    pub fn resume(&mut self) -> bool {
        match self.pause_started.take() {
            Some(at) => {
                self.paused_accum += self.now.saturating_sub(at);
                true
            }
            None => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started.is_some()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn paused_total(&self) -> Duration {
        let open = self
            .pause_started
            .map(|at| self.now.saturating_sub(at))
            .unwrap_or(Duration::ZERO);
        self.paused_accum + open
    }

    /// Time since `start` excluding paused intervals
    pub fn elapsed_active(&self) -> Duration {
        self.now
            .saturating_sub(self.started_at)
            .saturating_sub(self.paused_total())
    }
}

/// Drops signals that arrive within `period` of the last accepted one
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    until: Option<Duration>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Cooldown {
            period,
            until: None,
        }
    }

    pub fn try_acquire(&mut self, now: Duration) -> bool {
        if let Some(until) = self.until {
            if now < until {
                return false;
            }
        }
        self.until = Some(now + self.period);
        true
    }

    pub fn reset(&mut self) {
        self.until = None;
    }
}
