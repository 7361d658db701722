// REV Spark Flex support
//
// Provides:
// - The in-memory Spark configuration and its status codes
// - The SparkLink vendor transport and the Spark device handle
// - A CAN implementation of SparkLink over a serial-line CAN adapter

pub mod can;
pub mod config;
pub mod link;
pub mod slcan;
pub mod spark;
pub mod status;

#[cfg(test)]
pub(crate) mod fake;

pub use can::{CanBus, CanFrame, CanSparkLink};
pub use config::{IdleMode, PersistMode, ResetMode, SparkConfig};
pub use link::{SparkBus, SparkLink};
pub use slcan::{SlcanBus, SlcanError};
pub use spark::{RelativeEncoder, SparkFlex};
pub use status::StatusCode;
