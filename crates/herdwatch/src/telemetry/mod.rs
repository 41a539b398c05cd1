//! Telemetry
//!
//! Sensor readings as they arrive from livestock collars.

mod reading;

pub use reading::*;
