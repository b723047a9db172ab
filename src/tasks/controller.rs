// AquaLog — Measurement & Power Controller Task
//
// The central polling loop: every tick it reads the power switch, decides
// whether a sample is due, routes the sample through the validity
// classifier, and persists good readings. A switch in the OFF position or
// three consecutive bad samples put the system into deep sleep; the wake
// timer is armed with the current sample interval, and the switch going ON
// wakes it early. Deep sleep restarts the firmware, so waking re-runs
// `main` and all volatile subsystems are initialized fresh.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};

use crate::classifier::{classify, FailureStreak, Validity};
use crate::config::*;
use crate::drivers::rtc::Ds3231;
use crate::drivers::ultrasonic::Ultrasonic;
use crate::events::Reading;
use crate::settings::Settings;
use crate::storage::DataLog;

// ---------------------------------------------------------------------------
// Decision core — pure state machine, no hardware
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// The power switch was flipped OFF.
    SwitchOff,
    /// The sensor failed FAILURE_LIMIT times in a row.
    SensorFailures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    Sample,
    Suspend(SuspendReason),
}

pub struct Controller {
    mode: Mode,
    streak: FailureStreak,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            mode: Mode::Active,
            streak: FailureStreak::new(),
        }
    }

    /// Current operating mode (kept for diagnostics; the task loop itself
    /// never returns from a suspend).
    #[allow(dead_code)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn failure_count(&self) -> u32 {
        self.streak.count()
    }

    /// Decide what this tick should do. The switch overrides everything:
    /// OFF means suspend now, whatever the streak or cadence says.
    pub fn plan_tick(&mut self, switch_on: bool, sample_due: bool) -> TickAction {
        if !switch_on {
            self.mode = Mode::Suspended;
            return TickAction::Suspend(SuspendReason::SwitchOff);
        }
        if sample_due {
            TickAction::Sample
        } else {
            TickAction::Idle
        }
    }

    /// Fold a classified sample into the streak. Returns the suspend reason
    /// once the failure limit is reached.
    pub fn record_sample(&mut self, validity: &Validity) -> Option<SuspendReason> {
        self.streak.record(validity);
        if self.streak.should_power_down() {
            self.mode = Mode::Suspended;
            Some(SuspendReason::SensorFailures)
        } else {
            None
        }
    }

    /// Re-enter the active state after a hardware wake. The streak is
    /// deliberately untouched: only the next valid reading clears it.
    /// On the chip a wake is a reset, so this models the transition rather
    /// than being called at runtime.
    #[allow(dead_code)]
    pub fn wake(&mut self) {
        self.mode = Mode::Active;
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Task loop
// ---------------------------------------------------------------------------

pub fn controller_task(
    sampler: Arc<Mutex<Ultrasonic<'static>>>,
    rtc: Ds3231,
    settings: Arc<Settings>,
    data_log: Arc<DataLog>,
    switch: PinDriver<'static, AnyInputPin, Input>,
) {
    log::info!("Controller task started");

    let mut controller = Controller::new();
    // None → the first sample is due immediately after boot.
    let mut last_sample: Option<Instant> = None;
    let poll = Duration::from_millis(SWITCH_POLL_MS);

    loop {
        let switch_on = switch.is_low(); // pull-up, active LOW
        let interval = Duration::from_millis(settings.interval_ms() as u64);
        let sample_due = last_sample.map_or(true, |t| t.elapsed() >= interval);

        match controller.plan_tick(switch_on, sample_due) {
            TickAction::Idle => {}
            TickAction::Suspend(reason) => enter_deep_sleep(reason, settings.interval_ms()),
            TickAction::Sample => {
                let result = sampler.lock().unwrap().measure(settings.calibration_cm());
                last_sample = Some(Instant::now());

                let validity = classify(result);
                match validity {
                    Validity::Valid(distance_cm) => match rtc.now() {
                        Ok(timestamp) => {
                            let reading = Reading { timestamp, distance_cm };
                            log::info!("Water level: {:.2} cm at {}", distance_cm, timestamp);
                            if let Err(e) = data_log.append(&reading) {
                                // Reading is dropped; the loop carries on.
                                log::error!("Could not open reading log: {}", e);
                            }
                        }
                        Err(e) => log::error!("RTC read failed: {}", e),
                    },
                    Validity::Invalid => {
                        log::warn!(
                            "Bad sample ({} consecutive)",
                            controller.failure_count() + 1
                        );
                    }
                }

                if let Some(reason) = controller.record_sample(&validity) {
                    enter_deep_sleep(reason, settings.interval_ms());
                }
            }
        }

        thread::sleep(poll);
    }
}

/// Stop the radio, arm the wake sources (interval timer + switch ON), and
/// enter deep sleep. This function does not return; waking resets the chip.
fn enter_deep_sleep(reason: SuspendReason, interval_ms: u32) -> ! {
    log::info!(
        "Entering deep sleep ({:?}) — wake in {} ms or on switch ON (GPIO{})",
        reason,
        interval_ms,
        PIN_SWITCH
    );
    unsafe {
        esp_idf_sys::esp_wifi_stop();
        let ret = esp_idf_sys::esp_sleep_enable_timer_wakeup(interval_ms as u64 * 1000);
        if ret != esp_idf_sys::ESP_OK {
            log::error!("Failed to arm wake timer ({})", ret);
        }
        // Only GPIO0–5 can wake the ESP32-C3 from deep sleep; PIN_SWITCH
        // lives in that range.
        let ret = esp_idf_sys::esp_deep_sleep_enable_gpio_wakeup(
            1u64 << PIN_SWITCH,
            esp_idf_sys::esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_LOW,
        );
        if ret != esp_idf_sys::ESP_OK {
            log::error!("Failed to arm switch wake on GPIO{} ({})", PIN_SWITCH, ret);
        }
        esp_idf_sys::esp_deep_sleep_start();
    }
    // Never reached — but satisfies the `!` return type.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SensorError;

    #[test]
    fn switch_pin_can_wake_from_deep_sleep() {
        // The ESP32-C3 only honours GPIO0–5 as deep-sleep wake sources; a
        // switch outside that range would sleep through switch-ON forever.
        assert!((0..=5).contains(&PIN_SWITCH));
    }

    #[test]
    fn starts_active_with_no_failures() {
        let c = Controller::new();
        assert_eq!(c.mode(), Mode::Active);
        assert_eq!(c.failure_count(), 0);
    }

    #[test]
    fn idle_until_a_sample_is_due() {
        let mut c = Controller::new();
        assert_eq!(c.plan_tick(true, false), TickAction::Idle);
        assert_eq!(c.plan_tick(true, true), TickAction::Sample);
    }

    #[test]
    fn switch_off_suspends_immediately() {
        let mut c = Controller::new();
        // Even with a sample due and a clean streak, OFF wins.
        assert_eq!(
            c.plan_tick(false, true),
            TickAction::Suspend(SuspendReason::SwitchOff)
        );
        assert_eq!(c.mode(), Mode::Suspended);
    }

    #[test]
    fn third_consecutive_failure_suspends() {
        let mut c = Controller::new();
        assert_eq!(c.record_sample(&classify(Err(SensorError::Timeout))), None);
        assert_eq!(c.record_sample(&classify(Err(SensorError::Timeout))), None);
        assert_eq!(
            c.record_sample(&classify(Err(SensorError::Timeout))),
            Some(SuspendReason::SensorFailures)
        );
        assert_eq!(c.mode(), Mode::Suspended);
    }

    #[test]
    fn valid_reading_resets_the_streak() {
        let mut c = Controller::new();
        c.record_sample(&Validity::Invalid);
        c.record_sample(&Validity::Invalid);
        assert_eq!(c.record_sample(&Validity::Valid(10.0)), None);
        assert_eq!(c.failure_count(), 0);
        assert_eq!(c.mode(), Mode::Active);
    }

    #[test]
    fn wake_restores_active_but_keeps_the_streak() {
        // Three timeouts in a row put the controller to sleep; the hardware
        // timer wakes it one interval later.
        let mut c = Controller::new();
        for _ in 0..3 {
            c.record_sample(&classify(Err(SensorError::Timeout)));
        }
        assert_eq!(c.mode(), Mode::Suspended);

        c.wake();
        assert_eq!(c.mode(), Mode::Active);
        // Only the next valid reading clears the streak.
        assert_eq!(c.failure_count(), 3);
        c.record_sample(&Validity::Valid(33.3));
        assert_eq!(c.failure_count(), 0);
    }
}
