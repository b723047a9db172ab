// AquaLog — Runtime Settings
//
// Mutable parameters shared between the controller loop (reader, every tick)
// and the HTTP handlers (writers). Each field is an independently updatable
// atomic; last write wins, which is fine because the values change rarely
// and only affect cadence and offset, never correctness.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::*;

pub struct Settings {
    interval_ms: AtomicU32,
    // f32 calibration offset stored as its bit pattern.
    calibration_bits: AtomicU32,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            interval_ms: AtomicU32::new(DEFAULT_INTERVAL_MS),
            calibration_bits: AtomicU32::new(DEFAULT_CALIBRATION_CM.to_bits()),
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms.load(Ordering::Relaxed)
    }

    /// Set the sample interval. Zero is rejected by the API layer; clamped
    /// here as well so a bad write can never stall the wake timer.
    pub fn set_interval_ms(&self, ms: u32) {
        self.interval_ms.store(ms.max(1), Ordering::Relaxed);
    }

    pub fn calibration_cm(&self) -> f32 {
        f32::from_bits(self.calibration_bits.load(Ordering::Relaxed))
    }

    pub fn set_calibration_cm(&self, offset: f32) {
        self.calibration_bits.store(offset.to_bits(), Ordering::Relaxed);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_defaults() {
        let s = Settings::new();
        assert_eq!(s.interval_ms(), DEFAULT_INTERVAL_MS);
        assert_eq!(s.calibration_cm(), DEFAULT_CALIBRATION_CM);
    }

    #[test]
    fn interval_updates_and_rejects_zero() {
        let s = Settings::new();
        s.set_interval_ms(1000);
        assert_eq!(s.interval_ms(), 1000);
        s.set_interval_ms(0);
        assert_eq!(s.interval_ms(), 1);
    }

    #[test]
    fn calibration_round_trips_through_bits() {
        let s = Settings::new();
        s.set_calibration_cm(5.0);
        assert_eq!(s.calibration_cm(), 5.0);
        s.set_calibration_cm(-2.75);
        assert_eq!(s.calibration_cm(), -2.75);
    }
}
