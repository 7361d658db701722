// Fluent configuration for drive controller factories

use std::sync::Arc;

use super::factory::DriveControllerFactory;
use crate::diagnostics::{default_sink, SharedSink};
use crate::rev::link::SparkBus;
use crate::sim::SimClock;

/// Where created controllers live. Chosen once, when the builder is made.
#[derive(Clone)]
pub enum Backend {
    /// REV Spark Flex controllers sharing one vendor link
    Spark(Arc<SparkBus>),
    /// Physics-model motors driven by a shared simulation clock
    Simulated(Arc<SimClock>),
}

/// Optional tuning. `None` means "leave the device default alone"; it is
/// not the same as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveSettings {
    /// Nominal bus voltage for voltage compensation
    pub voltage_compensation: Option<f64>,
    /// Current limit in amperes
    pub current_limit: Option<f64>,
}

pub struct DriveControllerFactoryBuilder {
    backend: Backend,
    settings: DriveSettings,
    diagnostics: SharedSink,
}

impl DriveControllerFactoryBuilder {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            settings: DriveSettings::default(),
            diagnostics: default_sink(),
        }
    }

    pub fn spark(bus: Arc<SparkBus>) -> Self {
        Self::new(Backend::Spark(bus))
    }

    pub fn simulated(clock: Arc<SimClock>) -> Self {
        Self::new(Backend::Simulated(clock))
    }

    /// Compensate output against this nominal voltage. A non-finite value
    /// clears the setting.
    pub fn with_voltage_compensation(mut self, nominal_voltage: f64) -> Self {
        self.settings.voltage_compensation = finite(nominal_voltage);
        self
    }

    pub fn has_voltage_compensation(&self) -> bool {
        self.settings.voltage_compensation.is_some()
    }

    /// Limit motor current, in amperes. A non-finite value clears the setting.
    pub fn with_current_limit(mut self, amps: f64) -> Self {
        self.settings.current_limit = finite(amps);
        self
    }

    pub fn has_current_limit(&self) -> bool {
        self.settings.current_limit.is_some()
    }

    /// Send configuration faults somewhere other than the tracing log
    pub fn with_diagnostics(mut self, sink: SharedSink) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn settings(&self) -> DriveSettings {
        self.settings
    }

    pub fn build(self) -> DriveControllerFactory {
        DriveControllerFactory::new(self.backend, self.settings, self.diagnostics)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
