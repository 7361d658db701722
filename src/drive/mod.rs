// Drive controller abstraction for swerve modules
//
// A builder collects optional tuning, emits a factory, and the factory
// creates one controller per wheel behind the DriveController trait.

pub mod builder;
pub(crate) mod claims;
pub mod controller;
pub mod factory;

pub use builder::{Backend, DriveControllerFactoryBuilder, DriveSettings};
pub use controller::{ControllerHandle, DriveController, SparkDriveController};
pub use factory::{spark_config, DriveControllerFactory, DriveError};
