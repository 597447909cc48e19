use serde::{Deserialize, Serialize};

/// Accuracy tiers of the adaptive schedule, as `(min accuracy %, rate)`.
///
/// Checked from the top, the first tier whose threshold is reached wins.
pub const ADAPTIVE_TIERS: [(f64, f64); 7] = [
    (99.92, 9.2e-5),
    (99.84, 1e-4),
    (99.76, 1.2e-4),
    (99.68, 1.6e-4),
    (99.60, 2e-4),
    (99.50, 2.4e-4),
    (99.00, 3.2e-4),
];

/// Rate used until the previous epoch reaches 99% accuracy.
pub const ADAPTIVE_BASE_RATE: f64 = 4e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    /// The same rate for every epoch.
    Fixed(f64),
    /// Lowers the rate as the training accuracy of the previous epoch rises.
    ///
    /// Example: 98.7% → 4e-4, 99.5% → 2.4e-4, 99.95% → 9.2e-5.
    Adaptive,
}

impl LearningRateSchedule {
    pub fn new(learning_rate: f64, adaptive: bool) -> Self {
        if adaptive {
            LearningRateSchedule::Adaptive
        } else {
            LearningRateSchedule::Fixed(learning_rate)
        }
    }

    /// Rate for the next epoch, given the mean training accuracy (in percent)
    /// of the previous one.
    pub fn rate(&self, last_accuracy: f64) -> f64 {
        match self {
            LearningRateSchedule::Fixed(rate) => *rate,
            LearningRateSchedule::Adaptive => ADAPTIVE_TIERS
                .iter()
                .find(|(threshold, _)| last_accuracy >= *threshold)
                .map(|(_, rate)| *rate)
                .unwrap_or(ADAPTIVE_BASE_RATE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rate_ignores_accuracy() {
        let schedule = LearningRateSchedule::new(1e-3, false);
        assert_eq!(schedule.rate(0.0), 1e-3);
        assert_eq!(schedule.rate(99.99), 1e-3);
    }

    #[test]
    fn adaptive_rate_follows_the_tiers() {
        let schedule = LearningRateSchedule::new(1e-3, true);
        assert_eq!(schedule, LearningRateSchedule::Adaptive);
        assert_eq!(schedule.rate(0.0), 4e-4);
        assert_eq!(schedule.rate(98.99), 4e-4);
        assert_eq!(schedule.rate(99.0), 3.2e-4);
        assert_eq!(schedule.rate(99.49), 3.2e-4);
        assert_eq!(schedule.rate(99.5), 2.4e-4);
        assert_eq!(schedule.rate(99.6), 2e-4);
        assert_eq!(schedule.rate(99.7), 1.6e-4);
        assert_eq!(schedule.rate(99.76), 1.2e-4);
        assert_eq!(schedule.rate(99.84), 1e-4);
        assert_eq!(schedule.rate(99.92), 9.2e-5);
        assert_eq!(schedule.rate(100.0), 9.2e-5);
    }
}
