use heapless::Vec;

use crate::pipeline::Sample;

/// Samples averaged into one plotted column.
pub const AVERAGE: usize = 3;

pub struct Plot;

impl Plot {
    pub const X_START: i32 = 10;
    pub const X_END: i32 = 300;
    pub const Y_HIGH: i32 = 20;
    pub const Y_LOW: i32 = 220;
    pub const Y_MID: i32 = 120;
    pub const CURSOR_HALF: i32 = 20;
    /// Columns before the cursor wraps back to the left edge.
    pub const CYCLE: u16 = (Plot::X_END - Plot::X_START - 1) as u16;
}

/// One averaged point ready to be drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub x: i32,
    pub y: i32,
    pub marker: Option<i32>,
}

/// Circular strip chart state: cursor, averaging ring and zero reference.
pub struct Chart {
    cursor: u16,
    ring: Vec<Sample, AVERAGE>,
    baseline: Option<Sample>,
    calibrated: Option<Sample>,
}

impl Chart {
    pub fn new() -> Self {
        Chart {
            cursor: 0,
            ring: Vec::new(),
            baseline: None,
            calibrated: None,
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.ring.clear();
        self.baseline = None;
    }

    /// Zero reference used instead of the first sample.
    pub fn set_calibration(&mut self, baseline: Sample) {
        self.calibrated = Some(baseline);
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn baseline(&self) -> Option<Sample> {
        self.baseline
    }

    /// Adds a sample; yields a column every `AVERAGE` samples.
    pub fn push(&mut self, sample: Sample) -> Option<Column> {
        let baseline = match self.baseline {
            Some(baseline) => baseline,
            None => {
                let baseline = self.calibrated.unwrap_or(sample);
                self.baseline = Some(baseline);
                baseline
            }
        };

        // Ring is emptied each time it fills, so this cannot fail.
        self.ring.push(sample).ok()?;
        if self.ring.len() < AVERAGE {
            return None;
        }
        let mean = self.ring.iter().map(|s| *s as u32).sum::<u32>() / AVERAGE as u32;
        self.ring.clear();

        let x = Plot::X_START + 1 + self.cursor as i32;
        let deviation = mean as i32 - baseline as i32;
        let y = (Plot::Y_MID - deviation).clamp(Plot::Y_HIGH, Plot::Y_LOW);
        let marker = if self.cursor + 1 < Plot::CYCLE {
            Some(x + 1)
        } else {
            None
        };

        self.cursor += 1;
        if self.cursor >= Plot::CYCLE {
            self.cursor = 0;
        }
        Some(Column { x, y, marker })
    }
}

impl Default for Chart {
    fn default() -> Self {
        Chart::new()
    }
}
