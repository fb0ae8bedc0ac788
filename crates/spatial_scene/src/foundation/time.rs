//! Frame timing handed to per-frame update hooks

use std::time::Duration;

const NANOS_PER_SECOND: f32 = 1_000_000_000.0;

/// Timing information for one frame of the update pump.
///
/// Fed by the external per-frame driver with a monotonically increasing
/// frame timestamp; the first update reports a zero delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTime {
    last_frame_nanos: u64,
    delta_nanos: u64,
}

impl FrameTime {
    /// Create a frame time that has not seen any frame yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the frame stamped `frame_time_nanos`
    pub fn update(&mut self, frame_time_nanos: u64) {
        self.delta_nanos = if self.last_frame_nanos == 0 {
            0
        } else {
            frame_time_nanos.saturating_sub(self.last_frame_nanos)
        };
        self.last_frame_nanos = frame_time_nanos;
    }

    /// Time since the previous frame in seconds
    pub fn delta_seconds(&self) -> f32 {
        self.delta_nanos as f32 / NANOS_PER_SECOND
    }

    /// Timestamp of the current frame in seconds
    pub fn start_seconds(&self) -> f32 {
        self.last_frame_nanos as f32 / NANOS_PER_SECOND
    }

    /// Time since the previous frame
    pub fn delta(&self) -> Duration {
        Duration::from_nanos(self.delta_nanos)
    }

    /// Timestamp of the current frame
    pub fn start(&self) -> Duration {
        Duration::from_nanos(self.last_frame_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_has_zero_delta() {
        let mut frame_time = FrameTime::new();
        frame_time.update(5_000_000_000);

        assert_eq!(frame_time.delta(), Duration::ZERO);
        assert_eq!(frame_time.start(), Duration::from_secs(5));
    }

    #[test]
    fn test_delta_between_frames() {
        let mut frame_time = FrameTime::new();
        frame_time.update(1_000_000_000);
        frame_time.update(1_016_000_000);

        assert_eq!(frame_time.delta(), Duration::from_millis(16));
        assert!((frame_time.delta_seconds() - 0.016).abs() < 1e-6);
    }
}
