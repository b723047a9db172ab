// AquaLog — Firmware Entry Point
//
// Boot sequence:
//   1. Log the wake cause (cold boot, wake timer, or power switch).
//   2. Mount the SPIFFS storage partition (fatal on failure).
//   3. Probe the DS3231 RTC on the I2C bus (fatal if absent).
//   4. Configure the ranging pins and the power switch.
//   5. Bring up the soft AP and the HTTP API.
//   6. Spawn the measurement/power controller task.
//
// The system enters deep sleep when:
//   - The power switch is flipped OFF.
//   - The sensor fails three samples in a row.
// Waking (interval timer or switch ON) resets the chip and re-runs this
// boot sequence.

mod classifier;
mod config;
mod drivers;
mod events;
mod server;
mod settings;
mod storage;
mod tasks;

use std::ffi::CString;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{
    AnyInputPin, AnyOutputPin, Input, InputPin, Output, OutputPin, PinDriver,
};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use crate::config::*;
use crate::drivers::rtc::Ds3231;
use crate::drivers::ultrasonic::Ultrasonic;
use crate::server::ApiContext;
use crate::settings::Settings;
use crate::storage::DataLog;

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("AquaLog firmware starting…");
    log_wake_cause();

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // ---- Storage partition (holds the reading log) ------------------------
    // No log store means nothing to monitor for — treat as a boot failure.
    mount_storage()?;

    // ---- I2C bus (DS3231 RTC) ---------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;
    // SAFETY: The I2C peripheral is a singleton obtained from `Peripherals::take()`.
    // It will live for the entire programme duration (embedded firmware never exits).
    let i2c_bus: &'static Mutex<I2cDriver<'static>> =
        Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(i2c) })));

    let rtc = Ds3231::new(i2c_bus);
    if !rtc.is_connected() {
        anyhow::bail!("DS3231 not responding on the I2C bus — cannot timestamp readings");
    }
    match rtc.now() {
        Ok(now) => log::info!("RTC reports {}", now),
        Err(e) => log::warn!("RTC probe read failed: {}", e),
    }

    // ---- Ranging pins & power switch --------------------------------------
    let trig = PinDriver::output(peripherals.pins.gpio2.downgrade_output())?;
    let echo = PinDriver::input(peripherals.pins.gpio4.downgrade_input())?;
    let switch = PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    configure_pullup(&switch);

    // SAFETY: GPIO peripheral lives forever, same argument as I2C above.
    let trig_static: PinDriver<'static, AnyOutputPin, Output> =
        unsafe { core::mem::transmute(trig) };
    let echo_static: PinDriver<'static, AnyInputPin, Input> =
        unsafe { core::mem::transmute(echo) };
    let switch_static: PinDriver<'static, AnyInputPin, Input> =
        unsafe { core::mem::transmute(switch) };

    // ---- Shared state -----------------------------------------------------
    let sampler = Arc::new(Mutex::new(Ultrasonic::new(trig_static, echo_static)));
    let settings = Arc::new(Settings::new());
    let data_log = Arc::new(DataLog::new(LOG_PATH));

    // ---- Network: soft AP + HTTP API --------------------------------------
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let _wifi = server::start_access_point(peripherals.modem, sys_loop, nvs)?;
    let _http = server::start_http_server(ApiContext {
        sampler: Arc::clone(&sampler),
        rtc,
        settings: Arc::clone(&settings),
        data_log: Arc::clone(&data_log),
    })?;

    // ---- Spawn the controller task ----------------------------------------
    let task_sampler = Arc::clone(&sampler);
    let task_settings = Arc::clone(&settings);
    let task_log = Arc::clone(&data_log);
    thread::Builder::new()
        .name("controller".into())
        .stack_size(STACK_CONTROLLER)
        .spawn(move || {
            tasks::controller::controller_task(
                task_sampler,
                rtc,
                task_settings,
                task_log,
                switch_static,
            );
        })?;

    log::info!("Boot complete — entering normal operation");

    // Main thread has nothing left to do — park it forever.
    // (The WiFi and HTTP handles above must stay alive.)
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

// ---------------------------------------------------------------------------
// Boot helpers
// ---------------------------------------------------------------------------

/// Mount the SPIFFS partition that backs the reading log.
fn mount_storage() -> anyhow::Result<()> {
    let base_path = CString::new(STORAGE_MOUNT_POINT)?;
    let partition_label = CString::new(STORAGE_PARTITION_LABEL)?;

    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: partition_label.as_ptr(),
        max_files: 4,
        format_if_mount_failed: true,
    };

    // SAFETY: the register call copies both strings before returning.
    let ret = unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) };
    if ret != esp_idf_sys::ESP_OK {
        anyhow::bail!("SPIFFS mount failed ({})", ret);
    }
    log::info!("Storage mounted at {}", STORAGE_MOUNT_POINT);
    Ok(())
}

/// Log why this activation started: cold boot or a deep-sleep wake.
fn log_wake_cause() {
    let cause = unsafe { esp_idf_sys::esp_sleep_get_wakeup_cause() };
    match cause {
        esp_idf_sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => {
            log::info!("Woke from deep sleep: wake timer");
        }
        esp_idf_sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO => {
            log::info!("Woke from deep sleep: power switch");
        }
        _ => log::info!("Cold boot"),
    }
}

/// Configure internal pull-up on a PinDriver.  Separated because the borrow
/// checker needs a helper for the downgraded pin type.
fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    // The PinDriver constructor only sets the direction; the switch idles
    // HIGH through the pull-up and reads LOW when flipped ON.
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(
            PIN_SWITCH,
            esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
        );
    }
}
