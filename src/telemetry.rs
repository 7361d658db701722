// Telemetry records printed by the runtime

use serde::{Deserialize, Serialize};

/// One wheel's drive state at one instant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelTelemetry {
    /// Seconds since the run started
    pub t: f64,
    pub module: String,
    pub drive_id: u8,
    pub volts: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Conversion factors reported by `check`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleReport {
    pub module: String,
    pub drive_id: u8,
    pub drive_inverted: bool,
    pub position_conversion_factor: f64,
    pub velocity_conversion_factor: f64,
}
