// Vendor transport: one blocking call per device operation
//
// Every configuration call hands back a StatusCode; the caller decides what
// a failure means. Reads return the value the device last reported.

use std::sync::{Arc, Mutex, MutexGuard};

use super::config::{Parameter, ParameterValue, Signal};
use super::status::StatusCode;
use crate::drive::claims::DeviceClaims;

/// Highest device number a Spark accepts on the bus
pub const MAX_DEVICE_ID: u8 = 62;

pub trait SparkLink: Send {
    /// Restore the device's safe parameters to factory defaults
    fn reset_safe_parameters(&mut self, device: u8) -> StatusCode;

    fn set_signal_period(&mut self, device: u8, signal: Signal, period_ms: u16) -> StatusCode;

    fn set_parameter(
        &mut self,
        device: u8,
        parameter: Parameter,
        value: ParameterValue,
    ) -> StatusCode;

    /// Burn the current parameters to the device's flash
    fn persist_parameters(&mut self, device: u8) -> StatusCode;

    fn set_voltage(&mut self, device: u8, volts: f64) -> StatusCode;

    /// Primary encoder position, already scaled by the device
    fn position(&mut self, device: u8) -> f64;

    /// Primary encoder velocity, already scaled by the device
    fn velocity(&mut self, device: u8) -> f64;
}

/// A vendor link shared by every Spark on one bus
pub struct SparkBus {
    link: Mutex<Box<dyn SparkLink>>,
    pub(crate) claims: DeviceClaims,
}

impl SparkBus {
    pub fn new(link: impl SparkLink + 'static) -> Arc<Self> {
        Arc::new(Self {
            link: Mutex::new(Box::new(link)),
            claims: DeviceClaims::default(),
        })
    }

    /// Exclusive access to the link. Hold the guard for a whole transaction
    /// so that another device's configuration can't interleave with it.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn SparkLink>> {
        // A panic mid-call leaves the link usable; the device state is
        // whatever the last completed call left behind.
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
