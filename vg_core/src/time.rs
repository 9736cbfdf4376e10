// ABOUTME: Clocks and timestamp formatting used by the recording loop.
// ABOUTME: Provides wall-clock, fixed-interval replay clocks and monotonic timers.
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of the timestamp attached to each processing cycle
pub trait Clock: Send + Sync {
    /// Timestamp for the cycle being processed
    fn now(&self) -> DateTime<Local>;
}

/// Local wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock for replaying recorded footage at its nominal frame rate.
///
/// Every call to [`Clock::now`] advances the clock by one frame interval, so the
/// n-th cycle observes `start + n * interval` regardless of how fast frames are
/// actually decoded.
///
/// # Examples
///
/// ```
/// use chrono::Local;
/// use std::time::Duration;
/// use vg_core::{Clock, FrameIntervalClock};
///
/// let start = Local::now();
/// let clock = FrameIntervalClock::new(start, Duration::from_millis(100));
/// assert_eq!(clock.now(), start);
/// assert_eq!(clock.now() - start, chrono::Duration::milliseconds(100));
/// ```
#[derive(Debug)]
pub struct FrameIntervalClock {
    start: DateTime<Local>,
    interval: Duration,
    ticks: AtomicU64,
}

impl FrameIntervalClock {
    pub fn new(start: DateTime<Local>, interval: Duration) -> Self {
        Self {
            start,
            interval,
            ticks: AtomicU64::new(0),
        }
    }

    /// Create a clock ticking at `fps` frames per second
    pub fn from_fps(start: DateTime<Local>, fps: f64) -> crate::Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(crate::Error::Validation(format!(
                "Frame rate must be positive, got {}",
                fps
            )));
        }
        Ok(Self::new(start, Duration::from_secs_f64(1.0 / fps)))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Clock for FrameIntervalClock {
    fn now(&self) -> DateTime<Local> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let offset_nanos = self.interval.as_nanos().saturating_mul(tick as u128);
        let offset = chrono::Duration::nanoseconds(offset_nanos.min(i64::MAX as u128) as i64);
        self.start + offset
    }
}

/// Render a timestamp the way it appears on the frame banner
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use vg_core::banner_timestamp;
///
/// let time = Local.with_ymd_and_hms(2021, 1, 1, 12, 30, 5).unwrap();
/// assert_eq!(banner_timestamp(&time), "2021-01-01 12:30:05.000000");
/// ```
pub fn banner_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Wall time spent on a run, independent of the timestamps stamped on frames
///
/// ```
/// use vg_core::MonotonicTimer;
/// use std::time::Duration;
///
/// let timer = MonotonicTimer::new();
/// std::thread::sleep(Duration::from_millis(2));
/// assert!(timer.elapsed_ms() >= 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimer {
    started: Instant,
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed whole milliseconds, saturating
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn restart(&mut self) {
        self.started = Instant::now();
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::thread;

    #[test]
    fn test_system_clock_is_current() {
        let before = Local::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }

    #[test]
    fn test_frame_interval_clock_advances_per_call() {
        let start = Local.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let clock = FrameIntervalClock::new(start, Duration::from_millis(40));

        let stamps: Vec<_> = (0..4).map(|_| clock.now()).collect();
        assert_eq!(stamps[0], start);
        assert_eq!(stamps[3] - start, chrono::Duration::milliseconds(120));
    }

    #[test]
    fn test_frame_interval_clock_from_fps() {
        let start = Local::now();
        let clock = FrameIntervalClock::from_fps(start, 10.0).unwrap();
        assert_eq!(clock.interval(), Duration::from_millis(100));

        assert!(FrameIntervalClock::from_fps(start, 0.0).is_err());
        assert!(FrameIntervalClock::from_fps(start, f64::NAN).is_err());
    }

    #[test]
    fn test_banner_timestamp_keeps_microseconds() {
        let time = Local.with_ymd_and_hms(2023, 11, 5, 23, 59, 58).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(banner_timestamp(&time), "2023-11-05 23:59:58.123456");
    }

    #[test]
    fn test_timer_restart() {
        let mut timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(5));
        let before = timer.elapsed();
        timer.restart();
        assert!(timer.elapsed() < before);
    }
}
