// Drive motor hardware abstraction for swerve modules
//
// Higher-level drivetrain code asks a DriveControllerFactory for one
// DriveController per wheel and never sees which motor controller is
// actually installed.

pub mod config;
pub mod diagnostics;
pub mod drive;
pub mod module;
pub mod rev;
pub mod runtime;
pub mod sim;
pub mod telemetry;

pub use diagnostics::{DiagnosticsSink, TracingSink};
pub use drive::{
    ControllerHandle, DriveController, DriveControllerFactory, DriveControllerFactoryBuilder,
    DriveError, DriveSettings,
};
pub use module::{ModuleConfiguration, ModulePreset};
