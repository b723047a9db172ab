// AquaLog — DS3231 RTC Driver
//
// Custom register-level driver over shared I2C bus.
// Avoids external crate version conflicts with esp-idf-hal.

use std::fmt;
use std::sync::Mutex;

use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// DS3231 register addresses
const REG_SECONDS: u8 = 0x00; // Start of 7-byte timekeeping burst
const REG_STATUS: u8 = 0x0F;

// ---------------------------------------------------------------------------
// DateTime — calendar timestamp as kept by the RTC
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self { year, month, day, hour, minute, second }
    }

    /// Parse `"YYYY-MM-DD"` and `"HH:MM:SS"` strings, as submitted by the
    /// time-setting API. Returns `None` on any malformed field.
    pub fn parse(date: &str, time: &str) -> Option<Self> {
        let mut d = date.split('-');
        let year: u16 = d.next()?.parse().ok()?;
        let month: u8 = d.next()?.parse().ok()?;
        let day: u8 = d.next()?.parse().ok()?;
        if d.next().is_some() {
            return None;
        }

        let mut t = time.split(':');
        let hour: u8 = t.next()?.parse().ok()?;
        let minute: u8 = t.next()?.parse().ok()?;
        let second: u8 = t.next()?.parse().ok()?;
        if t.next().is_some() {
            return None;
        }

        let dt = Self::new(year, month, day, hour, minute, second);
        dt.is_plausible().then_some(dt)
    }

    fn is_plausible(&self) -> bool {
        (2000..=2099).contains(&self.year)
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// ---------------------------------------------------------------------------
// BCD helpers — DS3231 stores every timekeeping field as packed BCD
// ---------------------------------------------------------------------------
fn bcd_to_dec(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}

fn dec_to_bcd(d: u8) -> u8 {
    ((d / 10) << 4) | (d % 10)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------
#[derive(Clone, Copy)]
pub struct Ds3231 {
    bus: SharedBus,
}

impl Ds3231 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 1];
        bus.write_read(I2C_ADDR_DS3231, &[REG_STATUS], &mut buf, I2C_TIMEOUT_TICKS)
            .is_ok()
    }

    /// Burst-read the 7 timekeeping registers and decode to a calendar value.
    pub fn now(&self) -> anyhow::Result<DateTime> {
        let mut bus = self.bus.lock().unwrap();
        let mut raw = [0u8; 7];
        bus.write_read(I2C_ADDR_DS3231, &[REG_SECONDS], &mut raw, I2C_TIMEOUT_TICKS)?;

        Ok(DateTime {
            second: bcd_to_dec(raw[0] & 0x7F),
            minute: bcd_to_dec(raw[1] & 0x7F),
            hour: bcd_to_dec(raw[2] & 0x3F), // 24-hour mode
            // raw[3] = day of week — skipped
            day: bcd_to_dec(raw[4] & 0x3F),
            month: bcd_to_dec(raw[5] & 0x1F),
            year: 2000 + bcd_to_dec(raw[6]) as u16,
        })
    }

    /// Write a new calendar value to the timekeeping registers.
    pub fn set(&self, dt: &DateTime) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        let buf = [
            REG_SECONDS,
            dec_to_bcd(dt.second),
            dec_to_bcd(dt.minute),
            dec_to_bcd(dt.hour),
            1, // day of week — unused, but the register must hold 1..=7
            dec_to_bcd(dt.day),
            dec_to_bcd(dt.month),
            dec_to_bcd((dt.year % 100) as u8),
        ];
        bus.write(I2C_ADDR_DS3231, &buf, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_round_trips() {
        for d in 0..=99u8 {
            assert_eq!(bcd_to_dec(dec_to_bcd(d)), d);
        }
        assert_eq!(dec_to_bcd(59), 0x59);
        assert_eq!(bcd_to_dec(0x31), 31);
    }

    #[test]
    fn display_is_iso_like() {
        let dt = DateTime::new(2024, 7, 9, 6, 5, 4);
        assert_eq!(dt.to_string(), "2024-07-09 06:05:04");
    }

    #[test]
    fn parse_accepts_well_formed_fields() {
        let dt = DateTime::parse("2024-12-31", "23:59:59").unwrap();
        assert_eq!(dt, DateTime::new(2024, 12, 31, 23, 59, 59));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DateTime::parse("2024-13-01", "00:00:00").is_none());
        assert!(DateTime::parse("2024-01-01", "24:00:00").is_none());
        assert!(DateTime::parse("yesterday", "noon").is_none());
        assert!(DateTime::parse("2024-01-01-05", "00:00:00").is_none());
    }

    #[test]
    fn ordering_follows_calendar_time() {
        let a = DateTime::new(2024, 3, 1, 12, 0, 0);
        let b = DateTime::new(2024, 3, 1, 12, 0, 1);
        let c = DateTime::new(2025, 1, 1, 0, 0, 0);
        assert!(a < b && b < c);
    }
}
