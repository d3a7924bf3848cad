use crate::pipeline::Sample;

/// Running average over the first `target` samples after start.
pub struct Calibration {
    sum: u32,
    count: u16,
    target: u16,
}

impl Calibration {
    pub fn new(target: u16) -> Self {
        Calibration {
            sum: 0,
            count: 0,
            target: target.max(1),
        }
    }

    /// Returns the baseline once the target count is reached.
    pub fn feed(&mut self, sample: Sample) -> Option<Sample> {
        if self.count >= self.target {
            return None;
        }
        self.sum += sample as u32;
        self.count += 1;
        if self.count < self.target {
            return None;
        }
        Some((self.sum / self.target as u32) as Sample)
    }

    pub fn count(&self) -> u16 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_give_same_baseline() {
        let mut calibration = Calibration::new(32);
        for _ in 0..31 {
            assert_eq!(calibration.feed(0x8000), None);
        }
        assert_eq!(calibration.feed(0x8000), Some(0x8000));
    }

    #[test]
    fn baseline_is_truncated_mean() {
        let mut calibration = Calibration::new(4);
        assert_eq!(calibration.feed(10), None);
        assert_eq!(calibration.feed(11), None);
        assert_eq!(calibration.feed(11), None);
        assert_eq!(calibration.feed(11), Some(10));
    }

    #[test]
    fn full_scale_samples_do_not_overflow() {
        let mut calibration = Calibration::new(32);
        let mut baseline = None;
        for _ in 0..32 {
            baseline = calibration.feed(u16::MAX);
        }
        assert_eq!(baseline, Some(u16::MAX));
    }

    #[test]
    fn completed_episode_ignores_further_samples() {
        let mut calibration = Calibration::new(2);
        calibration.feed(1);
        assert_eq!(calibration.feed(3), Some(2));
        assert_eq!(calibration.feed(100), None);
        assert_eq!(calibration.count(), 2);
    }
}
