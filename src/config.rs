// Signal periods, timeouts, bus defaults and the robot description file
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::module::ModuleConfiguration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Status signal refresh periods (ms)
// Fault/output-status signals only need a slow refresh
pub const STATUS_PERIOD_SLOW_MS: u16 = 100;
// Anything feeding position/velocity or electrical state
pub const STATUS_PERIOD_FAST_MS: u16 = 20;
// Signals a drive motor never reads, once the robot is running
pub const STATUS_PERIOD_REDUCED_MS: u16 = 500;

// Time to wait for a device to acknowledge a parameter write
pub const PARAMETER_ACK_TIMEOUT: Duration = Duration::from_millis(50);
// Flash writes are slow
pub const FLASH_ACK_TIMEOUT: Duration = Duration::from_millis(500);

// Serial-line CAN adapter
pub const DEFAULT_ADAPTER_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_ADAPTER_BAUDRATE: u32 = 115_200;
pub const ADAPTER_READ_TIMEOUT: Duration = Duration::from_millis(10);

// Robot description loaded when --config is omitted
pub const DEFAULT_CONFIG_PATH: &str = "swerve.json";

/// Errors raised while loading a robot description
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid robot description: {0}")]
    Invalid(String),
}

/// Where the drive controllers live
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusConfig {
    Slcan {
        #[serde(default = "default_port")]
        port: String,
        #[serde(default = "default_baudrate")]
        baudrate: u32,
    },
    Simulated,
}

fn default_port() -> String {
    DEFAULT_ADAPTER_PORT.to_string()
}

fn default_baudrate() -> u32 {
    DEFAULT_ADAPTER_BAUDRATE
}

/// Optional drive tuning, fed to the factory builder
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
pub struct DriveTuning {
    #[serde(default)]
    pub voltage_compensation: Option<f64>,
    #[serde(default)]
    pub current_limit: Option<f64>,
}

/// One swerve module's drive motor
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    pub drive_id: u8,
    pub module: ModuleConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    pub bus: BusConfig,
    #[serde(default)]
    pub drive: DriveTuning,
    pub modules: Vec<ModuleEntry>,
}

impl RobotConfig {
    /// Read and validate a robot description from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a robot description
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::Invalid("no modules listed".to_string()));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for entry in &self.modules {
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate module name '{}'",
                    entry.name
                )));
            }
            if !ids.insert(entry.drive_id) {
                return Err(ConfigError::Invalid(format!(
                    "drive id {} used by more than one module",
                    entry.drive_id
                )));
            }
        }
        Ok(())
    }
}
