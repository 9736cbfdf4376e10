//! ABOUTME: Core types, errors, clocks, and tracing utilities
//! ABOUTME: Foundation crate used by all other vigil components

pub mod error;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use time::{banner_timestamp, Clock, FrameIntervalClock, MonotonicTimer, SystemClock};
