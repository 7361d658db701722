// Turns a hardware id plus module geometry into a configured drive controller

use std::sync::Arc;

use tracing::{info, warn};

use super::builder::{Backend, DriveSettings};
use super::controller::{ControllerHandle, SparkDriveController};
use crate::config::{STATUS_PERIOD_FAST_MS, STATUS_PERIOD_SLOW_MS};
use crate::diagnostics::SharedSink;
use crate::module::ModuleConfiguration;
use crate::rev::config::{EncoderConfig, IdleMode, PersistMode, ResetMode, Signal, SparkConfig};
use crate::rev::link::{SparkBus, MAX_DEVICE_ID};
use crate::rev::spark::SparkFlex;
use crate::sim::{SimClock, SimDriveController};

/// Caller mistakes that stop a controller from being created.
/// Vendor faults never do; they go to diagnostics instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriveError {
    #[error("device {0} already has a drive controller")]
    DeviceInUse(u8),

    #[error("device id {id} is out of range (max {max})")]
    InvalidDeviceId { id: u8, max: u8 },
}

/// Immutable snapshot of a builder. Owns no devices; every `create` call
/// hands out an independent controller.
pub struct DriveControllerFactory {
    backend: Backend,
    settings: DriveSettings,
    diagnostics: SharedSink,
}

impl DriveControllerFactory {
    pub(crate) fn new(backend: Backend, settings: DriveSettings, diagnostics: SharedSink) -> Self {
        Self {
            backend,
            settings,
            diagnostics,
        }
    }

    pub fn settings(&self) -> DriveSettings {
        self.settings
    }

    /// Configure the drive motor at `id` and bind a controller to it.
    ///
    /// On a Spark bus this blocks for the whole configuration transaction.
    /// Any step the device rejects is reported to diagnostics and the rest
    /// still run, so the returned controller may be partially configured.
    pub fn create(
        &self,
        id: u8,
        module: &ModuleConfiguration,
    ) -> Result<ControllerHandle, DriveError> {
        match &self.backend {
            Backend::Spark(bus) => self.create_spark(bus, id, module),
            Backend::Simulated(clock) => self.create_simulated(clock, id, module),
        }
    }

    fn create_spark(
        &self,
        bus: &Arc<SparkBus>,
        id: u8,
        module: &ModuleConfiguration,
    ) -> Result<ControllerHandle, DriveError> {
        if id > MAX_DEVICE_ID {
            return Err(DriveError::InvalidDeviceId {
                id,
                max: MAX_DEVICE_ID,
            });
        }
        if !bus.claims.claim(id) {
            return Err(DriveError::DeviceInUse(id));
        }

        let mut motor = SparkFlex::new(Arc::clone(bus), id);
        let config = spark_config(&self.settings, module);

        let status = motor.configure(
            &config,
            ResetMode::ResetSafeParameters,
            PersistMode::PersistParameters,
            self.diagnostics.as_ref(),
        );
        if status.is_ok() {
            info!("Spark {} configured as drive motor", id);
        } else {
            warn!("Spark {} is only partially configured (last error: {})", id, status);
        }

        let encoder = motor.encoder();
        Ok(ControllerHandle::Spark(SparkDriveController::new(
            motor,
            encoder,
            Arc::clone(&self.diagnostics),
        )))
    }

    fn create_simulated(
        &self,
        clock: &Arc<SimClock>,
        id: u8,
        module: &ModuleConfiguration,
    ) -> Result<ControllerHandle, DriveError> {
        if !clock.claims.claim(id) {
            return Err(DriveError::DeviceInUse(id));
        }
        info!("Simulated drive motor {} created", id);
        Ok(ControllerHandle::Simulated(SimDriveController::new(
            Arc::clone(clock),
            id,
            &self.settings,
            module,
        )))
    }
}

/// The Spark configuration for a drive motor
pub fn spark_config(settings: &DriveSettings, module: &ModuleConfiguration) -> SparkConfig {
    let mut config = SparkConfig::new();

    // Status 0
    config
        .signals
        .period_ms(Signal::AppliedOutput, STATUS_PERIOD_SLOW_MS)
        .period_ms(Signal::Faults, STATUS_PERIOD_SLOW_MS);
    // Status 1
    config
        .signals
        .period_ms(Signal::AbsoluteEncoderVelocity, STATUS_PERIOD_FAST_MS)
        .period_ms(Signal::BusVoltage, STATUS_PERIOD_FAST_MS)
        .period_ms(Signal::MotorTemperature, STATUS_PERIOD_FAST_MS)
        .period_ms(Signal::OutputCurrent, STATUS_PERIOD_FAST_MS);
    // Status 2
    config
        .signals
        .period_ms(Signal::PrimaryEncoderPosition, STATUS_PERIOD_FAST_MS)
        .period_ms(Signal::AbsoluteEncoderPosition, STATUS_PERIOD_FAST_MS)
        .period_ms(Signal::IAccumulation, STATUS_PERIOD_FAST_MS);

    if let Some(volts) = settings.voltage_compensation {
        config.voltage_compensation(volts);
    }
    if let Some(amps) = settings.current_limit {
        // Whole amps, negative clamps to zero
        config.smart_current_limit(amps.max(0.0) as u32);
    }
    config.inverted(module.drive_inverted());
    config.idle_mode(IdleMode::Brake);

    let mut encoder = EncoderConfig::default();
    encoder
        .position_conversion_factor(module.position_conversion_factor())
        .velocity_conversion_factor(module.velocity_conversion_factor());
    config.apply_encoder(&encoder);

    config
}
