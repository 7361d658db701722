// Handle to one Spark Flex motor controller and its primary encoder

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::{PersistMode, ResetMode, SignalsConfig, SparkConfig};
use super::link::{SparkBus, SparkLink};
use super::status::StatusCode;
use crate::diagnostics::{check_status, DiagnosticsSink};

/// Exclusive owner of one device number on a Spark bus
pub struct SparkFlex {
    bus: Arc<SparkBus>,
    device: u8,
}

impl SparkFlex {
    /// Bind to `device`. The caller must already hold its claim on `bus`;
    /// dropping the handle gives the claim back.
    pub(crate) fn new(bus: Arc<SparkBus>, device: u8) -> Self {
        Self { bus, device }
    }

    pub fn device_id(&self) -> u8 {
        self.device
    }

    /// Apply `config` in one transaction: optional reset, signal periods,
    /// parameters, optional persist.
    ///
    /// Each call is attempted exactly once. A failing call is reported to
    /// `sink` and the transaction carries on with the next one, so the
    /// device may end up partially configured. Returns the last failure
    /// seen, or `StatusCode::Ok`.
    pub fn configure(
        &mut self,
        config: &SparkConfig,
        reset: ResetMode,
        persist: PersistMode,
        sink: &dyn DiagnosticsSink,
    ) -> StatusCode {
        let id = self.device;
        let mut result = StatusCode::Ok;
        let mut link = self.bus.lock();

        debug!("Configuring Spark {} ({:?}, {:?})", id, reset, persist);

        if reset == ResetMode::ResetSafeParameters {
            let status = link.reset_safe_parameters(id);
            let context = format!("Failed to reset Spark {} to safe defaults", id);
            if !check_status(sink, status, &context) {
                result = status;
            }
        }

        let status = apply_signal_periods(&mut **link, id, &config.signals, sink);
        if !status.is_ok() {
            result = status;
        }

        for (parameter, value) in config.parameters() {
            let status = link.set_parameter(id, parameter, value);
            let context = format!("Failed to set {} on Spark {}", parameter.name(), id);
            if !check_status(sink, status, &context) {
                result = status;
            }
        }

        if persist == PersistMode::PersistParameters {
            let status = link.persist_parameters(id);
            let context = format!("Failed to persist parameters on Spark {}", id);
            if !check_status(sink, status, &context) {
                result = status;
            }
        }

        result
    }

    /// Change signal periods at runtime without touching flash
    pub fn set_signal_periods(
        &mut self,
        signals: &SignalsConfig,
        sink: &dyn DiagnosticsSink,
    ) -> StatusCode {
        let mut link = self.bus.lock();
        apply_signal_periods(&mut **link, self.device, signals, sink)
    }

    /// Command an output voltage; the device saturates at its supply rail
    pub fn set_voltage(&mut self, volts: f64) -> StatusCode {
        self.bus.lock().set_voltage(self.device, volts)
    }

    /// The primary relative encoder on this controller
    pub fn encoder(&self) -> RelativeEncoder {
        RelativeEncoder {
            bus: Arc::clone(&self.bus),
            device: self.device,
        }
    }
}

impl Drop for SparkFlex {
    fn drop(&mut self) {
        // Never leave a released motor driving
        let status = self.set_voltage(0.0);
        if !status.is_ok() {
            warn!("Failed to stop Spark {} on drop: {}", self.device, status);
        }
        self.bus.claims.release(self.device);
    }
}

fn apply_signal_periods(
    link: &mut dyn SparkLink,
    id: u8,
    signals: &SignalsConfig,
    sink: &dyn DiagnosticsSink,
) -> StatusCode {
    let mut result = StatusCode::Ok;
    for (signal, period_ms) in signals.iter() {
        let status = link.set_signal_period(id, signal, period_ms);
        let context = format!("Failed to set {} period on Spark {}", signal.name(), id);
        if !check_status(sink, status, &context) {
            result = status;
        }
    }
    result
}

/// Reads the primary encoder in the units its conversion factors produce
pub struct RelativeEncoder {
    bus: Arc<SparkBus>,
    device: u8,
}

impl RelativeEncoder {
    pub fn position(&self) -> f64 {
        self.bus.lock().position(self.device)
    }

    pub fn velocity(&self) -> f64 {
        self.bus.lock().velocity(self.device)
    }
}
