pub mod rtc;
pub mod ultrasonic;
