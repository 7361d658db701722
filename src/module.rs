// Physical description of a swerve module's drive stage
//
// Supplies the constants needed to turn motor-shaft rotations into wheel
// travel: wheel diameter, drive reduction and whether the drive motor is
// mounted inverted.

use std::f64::consts::PI;

use serde::Deserialize;

/// Error for module geometry that can't describe a real wheel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleConfigError {
    #[error("wheel diameter must be positive and finite, got {0}")]
    WheelDiameter(f64),

    #[error("drive reduction must be positive and finite, got {0}")]
    DriveReduction(f64),
}

/// Immutable drive geometry of one swerve module
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "ModuleSpec")]
pub struct ModuleConfiguration {
    wheel_diameter: f64,
    drive_reduction: f64,
    drive_inverted: bool,
}

impl ModuleConfiguration {
    /// `drive_reduction` is wheel rotations per motor rotation, so it is
    /// below 1 for every real module (an MK4i L2 is 1 / 6.75 ≈ 0.148).
    /// Passing the motor-to-wheel ratio (6.75) instead makes both conversion
    /// factors 45× too large.
    pub fn new(
        wheel_diameter: f64,
        drive_reduction: f64,
        drive_inverted: bool,
    ) -> Result<Self, ModuleConfigError> {
        if !(wheel_diameter.is_finite() && wheel_diameter > 0.0) {
            return Err(ModuleConfigError::WheelDiameter(wheel_diameter));
        }
        if !(drive_reduction.is_finite() && drive_reduction > 0.0) {
            return Err(ModuleConfigError::DriveReduction(drive_reduction));
        }
        Ok(Self {
            wheel_diameter,
            drive_reduction,
            drive_inverted,
        })
    }

    /// Wheel diameter; every converted reading uses this length unit
    pub fn wheel_diameter(&self) -> f64 {
        self.wheel_diameter
    }

    /// Wheel rotations per motor rotation
    pub fn drive_reduction(&self) -> f64 {
        self.drive_reduction
    }

    pub fn drive_inverted(&self) -> bool {
        self.drive_inverted
    }

    /// Wheel travel per motor rotation
    pub fn position_conversion_factor(&self) -> f64 {
        PI * self.wheel_diameter * self.drive_reduction
    }

    /// Wheel travel per second for one motor RPM
    pub fn velocity_conversion_factor(&self) -> f64 {
        self.position_conversion_factor() / 60.0
    }
}

/// Off-the-shelf swerve modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePreset {
    Mk3Standard,
    Mk3Fast,
    Mk4L1,
    Mk4L2,
    Mk4L3,
    Mk4L4,
    Mk4iL1,
    Mk4iL2,
    Mk4iL3,
}

const MK3_WHEEL_DIAMETER: f64 = 0.1016;
const MK4_WHEEL_DIAMETER: f64 = 0.10033;

impl ModulePreset {
    pub fn configuration(self) -> ModuleConfiguration {
        // (wheel diameter m, wheel rotations per motor rotation, drive inverted)
        let (wheel_diameter, drive_reduction, drive_inverted) = match self {
            Self::Mk3Standard => (
                MK3_WHEEL_DIAMETER,
                (14.0 / 50.0) * (28.0 / 16.0) * (15.0 / 60.0),
                true,
            ),
            Self::Mk3Fast => (
                MK3_WHEEL_DIAMETER,
                (16.0 / 48.0) * (28.0 / 16.0) * (15.0 / 60.0),
                true,
            ),
            Self::Mk4L1 | Self::Mk4iL1 => (
                MK4_WHEEL_DIAMETER,
                (14.0 / 50.0) * (25.0 / 19.0) * (15.0 / 45.0),
                true,
            ),
            Self::Mk4L2 | Self::Mk4iL2 => (
                MK4_WHEEL_DIAMETER,
                (14.0 / 50.0) * (27.0 / 17.0) * (15.0 / 45.0),
                true,
            ),
            Self::Mk4L3 | Self::Mk4iL3 => (
                MK4_WHEEL_DIAMETER,
                (14.0 / 50.0) * (28.0 / 16.0) * (15.0 / 45.0),
                true,
            ),
            Self::Mk4L4 => (
                MK4_WHEEL_DIAMETER,
                (16.0 / 48.0) * (28.0 / 16.0) * (15.0 / 45.0),
                true,
            ),
        };

        ModuleConfiguration {
            wheel_diameter,
            drive_reduction,
            drive_inverted,
        }
    }
}

impl From<ModulePreset> for ModuleConfiguration {
    fn from(preset: ModulePreset) -> Self {
        preset.configuration()
    }
}

// JSON form: either a preset name or explicit geometry
#[derive(Deserialize)]
#[serde(untagged)]
enum ModuleSpec {
    Preset(ModulePreset),
    Explicit {
        wheel_diameter: f64,
        drive_reduction: f64,
        #[serde(default)]
        drive_inverted: bool,
    },
}

impl TryFrom<ModuleSpec> for ModuleConfiguration {
    type Error = ModuleConfigError;

    fn try_from(spec: ModuleSpec) -> Result<Self, Self::Error> {
        match spec {
            ModuleSpec::Preset(preset) => Ok(preset.configuration()),
            ModuleSpec::Explicit {
                wheel_diameter,
                drive_reduction,
                drive_inverted,
            } => Self::new(wheel_diameter, drive_reduction, drive_inverted),
        }
    }
}
