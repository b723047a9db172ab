// AquaLog — Reading Validity & Failure Tracking
//
// Decides whether a sampled distance is physically plausible and keeps the
// consecutive-failure streak that drives the deep-sleep escalation.

use crate::config::*;
use crate::events::SensorError;

// ---------------------------------------------------------------------------
// Validity
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validity {
    Valid(f32),
    Invalid,
}

/// Classify one sample. A reading is valid only if the sensor produced a
/// finite distance inside the physically reachable range [0, MAX_DISTANCE_CM].
pub fn classify(sample: Result<f32, SensorError>) -> Validity {
    match sample {
        Ok(d) if d.is_finite() && (0.0..=MAX_DISTANCE_CM).contains(&d) => Validity::Valid(d),
        Ok(_) => Validity::Invalid,
        Err(_) => Validity::Invalid,
    }
}

// ---------------------------------------------------------------------------
// FailureStreak
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct FailureStreak {
    count: u32,
}

impl FailureStreak {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the streak: any valid reading resets it, any invalid one
    /// extends it.
    pub fn record(&mut self, validity: &Validity) {
        match validity {
            Validity::Valid(_) => self.count = 0,
            Validity::Invalid => self.count += 1,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// True once FAILURE_LIMIT consecutive failures have accumulated.
    pub fn should_power_down(&self) -> bool {
        self.count >= FAILURE_LIMIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_invalid() {
        assert_eq!(classify(Err(SensorError::Timeout)), Validity::Invalid);
    }

    #[test]
    fn negative_and_non_finite_are_invalid() {
        assert_eq!(classify(Ok(-1.0)), Validity::Invalid);
        assert_eq!(classify(Ok(f32::NAN)), Validity::Invalid);
        assert_eq!(classify(Ok(f32::INFINITY)), Validity::Invalid);
    }

    #[test]
    fn out_of_range_is_invalid() {
        assert_eq!(classify(Ok(MAX_DISTANCE_CM + 0.1)), Validity::Invalid);
    }

    #[test]
    fn zero_and_in_range_are_valid() {
        assert_eq!(classify(Ok(0.0)), Validity::Valid(0.0));
        assert_eq!(classify(Ok(123.4)), Validity::Valid(123.4));
        assert_eq!(classify(Ok(MAX_DISTANCE_CM)), Validity::Valid(MAX_DISTANCE_CM));
    }

    #[test]
    fn streak_counts_consecutive_failures() {
        let mut streak = FailureStreak::new();
        streak.record(&Validity::Invalid);
        streak.record(&Validity::Invalid);
        assert_eq!(streak.count(), 2);
        assert!(!streak.should_power_down());
        streak.record(&Validity::Invalid);
        assert_eq!(streak.count(), 3);
        assert!(streak.should_power_down());
    }

    #[test]
    fn any_valid_reading_resets_the_streak() {
        let mut streak = FailureStreak::new();
        for _ in 0..7 {
            streak.record(&Validity::Invalid);
        }
        streak.record(&Validity::Valid(42.0));
        assert_eq!(streak.count(), 0);
        assert!(!streak.should_power_down());
    }
}
