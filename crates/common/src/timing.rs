use std::fmt;

use crate::types::RenderMode;

/// Averages frame times over a fixed period.
///
/// Frame times are summed until the period elapses, then the average is
/// published and the sum restarts. Before the first period completes there
/// is no average.
#[derive(Debug, Clone)]
pub struct FrameStats {
    period: f32,
    sum: f32,
    count: u32,
    average: Option<f32>,
}

impl FrameStats {
    pub fn new(period: f32) -> Self {
        Self {
            period,
            sum: 0.0,
            count: 0,
            average: None,
        }
    }

    /// Record one frame time in seconds. Returns `true` when a new average
    /// was published by this call.
    pub fn record(&mut self, frame_time: f32) -> bool {
        self.sum += frame_time;
        self.count += 1;
        if self.sum >= self.period {
            self.average = Some(self.sum / self.count as f32);
            self.sum = 0.0;
            self.count = 0;
            return true;
        }
        false
    }

    /// Average frame time in seconds from the last completed period.
    pub fn average(&self) -> Option<f32> {
        self.average
    }

    pub fn fps(&self) -> Option<f32> {
        self.average.filter(|a| *a > 0.0).map(|a| 1.0 / a)
    }
}

/// One-line description of the renderer state, used as the window title.
#[derive(Debug, Clone, Copy)]
pub struct FrameSummary {
    pub mode: RenderMode,
    pub light_count: usize,
    pub average_frame_time: Option<f32>,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - Lights: {}", self.mode.label(), self.light_count)?;
        if let Some(avg) = self.average_frame_time.filter(|a| *a > 0.0) {
            write!(
                f,
                ", Frame Time: {:.2}ms, FPS: {:.0}",
                avg * 1000.0,
                1.0 / avg
            )?;
        }
        Ok(())
    }
}
