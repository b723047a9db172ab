// AquaLog — Hardware & System Configuration
// Target: ESP32-C3 water-level monitor (HC-SR04 + DS3231)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_TRIG: i32 = 2;    // Ultrasonic trigger output
pub const PIN_ECHO: i32 = 4;    // Ultrasonic echo input
pub const PIN_SWITCH: i32 = 3;  // Power switch (INPUT_PULLUP, active LOW = run)
                                // Must stay on GPIO0–5: only those can wake
                                // the ESP32-C3 from deep sleep.
pub const PIN_I2C_SDA: i32 = 6; // I2C data line (DS3231)
pub const PIN_I2C_SCL: i32 = 7; // I2C clock line (DS3231)

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_DS3231: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Ultrasonic Ranging
// ---------------------------------------------------------------------------
pub const TRIG_SETTLE_US: u32 = 2;       // Quiet period before the pulse
pub const TRIG_PULSE_US: u32 = 10;       // Trigger pulse width
pub const ECHO_TIMEOUT_US: u64 = 30_000; // ~5 m round trip, then give up
pub const SOUND_CM_PER_US: f32 = 0.034;  // Speed of sound in air
pub const MAX_DISTANCE_CM: f32 = 500.0;  // Physical ceiling of the sensor

// ---------------------------------------------------------------------------
// Measurement & Power Management
// ---------------------------------------------------------------------------
pub const DEFAULT_INTERVAL_MS: u32 = 60_000; // One sample per minute
pub const DEFAULT_CALIBRATION_CM: f32 = 0.0;
pub const SWITCH_POLL_MS: u64 = 50;          // Controller tick cadence
pub const FAILURE_LIMIT: u32 = 3;            // Consecutive failures → deep sleep

// ---------------------------------------------------------------------------
// Persistence (SPIFFS)
// ---------------------------------------------------------------------------
pub const STORAGE_MOUNT_POINT: &str = "/spiffs";
pub const STORAGE_PARTITION_LABEL: &str = "storage";
pub const LOG_PATH: &str = "/spiffs/readings.csv";

// ---------------------------------------------------------------------------
// Network (soft AP + HTTP API)
// ---------------------------------------------------------------------------
pub const AP_SSID: &str = "water_level";
pub const AP_PASSWORD: &str = "sulungresearch";
pub const AP_CHANNEL: u8 = 1;
pub const HTTP_STACK_SIZE: usize = 16 * 1024;
pub const MAX_HTTP_BODY: usize = 1024;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_CONTROLLER: usize = 8192;
