use std::time::Duration;

/// Rational media timestamp: `value / timescale` seconds.
///
/// A non-positive timescale marks the time as indefinite, which is what media
/// backends report before a source has been resolved (or for live streams).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTime {
    value: i64,
    timescale: i32,
}

impl MediaTime {
    pub const INDEFINITE: MediaTime = MediaTime {
        value: 0,
        timescale: 0,
    };

    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Millisecond precision used for time values produced from `f64` inputs.
    pub const MILLIS: i32 = 1000;

    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        if !seconds.is_finite() || timescale <= 0 {
            return Self::INDEFINITE;
        }
        Self {
            value: (seconds * f64::from(timescale)).round() as i64,
            timescale,
        }
    }

    pub fn from_millis(millis: f64) -> Self {
        Self::from_seconds(millis / 1000.0, Self::MILLIS)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::from_seconds(duration.as_secs_f64(), Self::MILLIS)
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    pub fn is_indefinite(&self) -> bool {
        self.timescale <= 0
    }

    pub fn as_seconds(&self) -> Option<f64> {
        if self.is_indefinite() {
            return None;
        }
        Some(self.value as f64 / f64::from(self.timescale))
    }

    pub fn as_millis(&self) -> Option<f64> {
        self.as_seconds().map(|secs| secs * 1000.0)
    }
}
