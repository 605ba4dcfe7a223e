use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

/// Input the host hands to the kernel while it pumps events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    Quit,
    Key { code: u16 },
    Mouse { x: i16, y: i16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

/// Clock and event source for kernel calls that talk to the host.
pub trait Platform {
    fn poll_event(&mut self) -> Option<PlatformEvent>;

    /// Milliseconds since the platform was created.
    fn ticks(&self) -> u64;

    fn sleep(&mut self, duration: Duration);

    fn local_time(&self) -> LocalTime;
}

/// Wall-clock platform. Events are pushed by the host.
pub struct SystemPlatform {
    started: Instant,
    pending: VecDeque<PlatformEvent>,
}

impl SystemPlatform {
    pub fn new() -> Self {
        SystemPlatform {
            started: Instant::now(),
            pending: VecDeque::new(),
        }
    }

    pub fn push_event(&mut self, event: PlatformEvent) {
        self.pending.push_back(event);
    }
}

impl Default for SystemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SystemPlatform {
    fn poll_event(&mut self) -> Option<PlatformEvent> {
        self.pending.pop_front()
    }

    fn ticks(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn local_time(&self) -> LocalTime {
        let now = Local::now();
        LocalTime {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            day: now.day() as u8,
            month: now.month() as u8,
            year: now.year().clamp(0, u16::MAX as i32) as u16,
        }
    }
}

/// An event that becomes visible once the virtual clock reaches `at_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub at_ms: u64,
    pub event: PlatformEvent,
}

/// Deterministic platform for traces and tests: sleeping advances a
/// virtual clock instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlatform {
    now_ms: u64,
    events: Vec<ScheduledEvent>,
    time: LocalTime,
}

impl ScriptedPlatform {
    pub fn new(mut events: Vec<ScheduledEvent>) -> Self {
        events.sort_by_key(|scheduled| scheduled.at_ms);
        ScriptedPlatform {
            now_ms: 0,
            events,
            time: LocalTime::default(),
        }
    }

    pub fn with_local_time(mut self, time: LocalTime) -> Self {
        self.time = time;
        self
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now_ms += duration.as_millis() as u64;
    }
}

impl Platform for ScriptedPlatform {
    fn poll_event(&mut self) -> Option<PlatformEvent> {
        let due = self
            .events
            .first()
            .is_some_and(|scheduled| scheduled.at_ms <= self.now_ms);
        due.then(|| self.events.remove(0).event)
    }

    fn ticks(&self) -> u64 {
        self.now_ms
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }

    fn local_time(&self) -> LocalTime {
        self.time
    }
}
