//! Frame-rate and loop statistics

use std::time::{Duration, Instant};

/// Reports frames per second once every `interval` frames
#[derive(Debug)]
pub struct FpsCounter {
    interval: u32,
    frames: u32,
    window_start: Instant,
    last_fps: Option<f64>,
}

impl FpsCounter {
    pub fn new(interval: u32) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: u32, start: Instant) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            window_start: start,
            last_fps: None,
        }
    }

    /// Count a frame. Returns the rate over the finished window when this
    /// frame completes one.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames < self.interval {
            return None;
        }

        let elapsed = now.duration_since(self.window_start).max(Duration::from_micros(1));
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Rate over the most recently completed window
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

/// Totals for one capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub detections: u64,
    pub alerts: u64,
}

impl LoopStats {
    pub fn record(&mut self, detections: usize, alerts: usize) {
        self.frames += 1;
        self.detections += detections as u64;
        self.alerts += alerts as u64;
    }
}
