// AquaLog — HC-SR04 Ultrasonic Ranging Driver
//
// Owns the trigger/echo pin pair. A measurement is a 10 µs trigger pulse
// followed by timing the echo line's high pulse; the round-trip time maps
// linearly to distance at the speed of sound. The echo wait is bounded by
// ECHO_TIMEOUT_US so a disconnected or confused sensor cannot stall the
// caller.

use std::time::{Duration, Instant};

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};

use crate::config::*;
use crate::events::SensorError;

pub struct Ultrasonic<'d> {
    trig: PinDriver<'d, AnyOutputPin, Output>,
    echo: PinDriver<'d, AnyInputPin, Input>,
}

impl<'d> Ultrasonic<'d> {
    pub fn new(
        trig: PinDriver<'d, AnyOutputPin, Output>,
        echo: PinDriver<'d, AnyInputPin, Input>,
    ) -> Self {
        Self { trig, echo }
    }

    /// Take one calibrated distance measurement in centimetres.
    pub fn measure(&mut self, calibration_cm: f32) -> Result<f32, SensorError> {
        let width_us = self.echo_pulse_width_us()?;
        Ok(calibrated_distance_cm(width_us, calibration_cm))
    }

    /// Fire the trigger and time the echo pulse, in microseconds.
    fn echo_pulse_width_us(&mut self) -> Result<f32, SensorError> {
        let _ = self.trig.set_low();
        Ets::delay_us(TRIG_SETTLE_US);
        let _ = self.trig.set_high();
        Ets::delay_us(TRIG_PULSE_US);
        let _ = self.trig.set_low();

        let deadline = Instant::now() + Duration::from_micros(ECHO_TIMEOUT_US);

        // Wait for the echo pulse to start.
        while self.echo.is_low() {
            if Instant::now() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        let rise = Instant::now();

        // Wait for it to end.
        while self.echo.is_high() {
            if Instant::now() >= deadline {
                return Err(SensorError::Timeout);
            }
        }

        Ok(rise.elapsed().as_micros() as f32)
    }
}

/// Echo round-trip time → one-way distance: the pulse travels out and back,
/// so halve the product with the speed of sound.
pub fn pulse_to_distance_cm(width_us: f32) -> f32 {
    width_us * SOUND_CM_PER_US / 2.0
}

/// Converted distance with the configured calibration offset applied.
pub fn calibrated_distance_cm(width_us: f32, calibration_cm: f32) -> f32 {
    pulse_to_distance_cm(width_us) + calibration_cm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_uses_half_round_trip() {
        // 1000 µs round trip at 0.034 cm/µs → 17 cm one way.
        assert_eq!(pulse_to_distance_cm(1000.0), 17.0);
        assert_eq!(pulse_to_distance_cm(0.0), 0.0);
    }

    #[test]
    fn calibration_offset_shifts_distance_exactly() {
        // Same echo timing with and without a +5.0 offset.
        assert_eq!(calibrated_distance_cm(1000.0, 0.0), 17.0);
        assert_eq!(calibrated_distance_cm(1000.0, 5.0), 22.0);
        assert_eq!(
            calibrated_distance_cm(1000.0, 5.0) - calibrated_distance_cm(1000.0, 0.0),
            5.0
        );
    }

    #[test]
    fn negative_calibration_pulls_distance_down() {
        assert_eq!(calibrated_distance_cm(1000.0, -2.5), 14.5);
    }
}
