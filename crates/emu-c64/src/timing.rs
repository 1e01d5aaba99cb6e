//! Real-time frame pacing.
//!
//! The timer keeps an absolute deadline and advances it by one frame
//! duration per frame, so sleep jitter does not accumulate into drift.

use std::thread;
use std::time::{Duration, Instant};

use log::warn;

/// How far behind real time the emulation may fall before the timer gives
/// up catching up and starts over from now.
pub const MAX_LAG: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct FrameTimer {
    frame_duration: Duration,
    target: Instant,
}

impl FrameTimer {
    #[must_use]
    pub fn new(frame_duration: Duration) -> Self {
        Self {
            frame_duration,
            target: Instant::now(),
        }
    }

    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Forget the deadline and start counting from now. Called after a
    /// pause and after every frame computed in warp mode.
    pub fn restart(&mut self) {
        self.target = Instant::now();
    }

    /// Sleep until the end of the current frame.
    pub fn synchronize(&mut self) {
        self.target += self.frame_duration;
        let now = Instant::now();
        if let Some(wait) = self.target.checked_duration_since(now) {
            thread::sleep(wait);
        } else if now.duration_since(self.target) > MAX_LAG {
            warn!(
                "Emulation is {} ms behind, resynchronizing",
                now.duration_since(self.target).as_millis()
            );
            self.restart();
        }
    }
}
