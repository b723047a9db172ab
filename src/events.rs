// AquaLog — Shared Data Types

use std::fmt;

use crate::drivers::rtc::DateTime;

// ---------------------------------------------------------------------------
// Reading — one timestamped water-level measurement
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime,
    pub distance_cm: f32,
}

impl Reading {
    /// Render the reading as one line of the persisted CSV log.
    pub fn csv_line(&self) -> String {
        format!("{},{:.2}", self.timestamp, self.distance_cm)
    }
}

// ---------------------------------------------------------------------------
// Sensor Errors
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The echo line never pulsed within the ranging timeout.
    Timeout,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "echo timeout"),
        }
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_line_matches_timestamp_comma_distance() {
        let r = Reading {
            timestamp: DateTime::new(2024, 3, 1, 12, 0, 0),
            distance_cm: 17.25,
        };
        assert_eq!(r.csv_line(), "2024-03-01 12:00:00,17.25");
    }

    #[test]
    fn csv_line_rounds_to_two_decimals() {
        let r = Reading {
            timestamp: DateTime::new(2024, 3, 1, 12, 0, 0),
            distance_cm: 100.0,
        };
        assert_eq!(r.csv_line(), "2024-03-01 12:00:00,100.00");
    }
}
