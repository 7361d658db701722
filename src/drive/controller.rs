// The drive motor interface the drivetrain sees, and its implementations

use tracing::warn;

use crate::config::STATUS_PERIOD_REDUCED_MS;
use crate::diagnostics::SharedSink;
use crate::rev::config::{Signal, SignalsConfig};
use crate::rev::spark::{RelativeEncoder, SparkFlex};
use crate::sim::SimDriveController;

/// Raw voltage/position/velocity access to one wheel's drive motor.
///
/// Distances are in whatever unit the module's wheel diameter was given in.
pub trait DriveController: Send {
    /// Command a signed output voltage. Saturation is left to the hardware.
    fn set_reference_voltage(&mut self, voltage: f64);

    /// Cumulative wheel travel
    fn position(&self) -> f64;

    /// Wheel surface speed per second
    fn state_velocity(&self) -> f64;

    /// Cut telemetry traffic further once the robot is running.
    /// Controllers with nothing to trim do nothing.
    fn set_can_status_frame_period_reductions(&mut self) {}
}

/// Spark Flex motor with its built-in relative encoder
pub struct SparkDriveController {
    motor: SparkFlex,
    encoder: RelativeEncoder,
    diagnostics: SharedSink,
}

impl SparkDriveController {
    pub(crate) fn new(motor: SparkFlex, encoder: RelativeEncoder, diagnostics: SharedSink) -> Self {
        Self {
            motor,
            encoder,
            diagnostics,
        }
    }

    pub fn device_id(&self) -> u8 {
        self.motor.device_id()
    }
}

impl DriveController for SparkDriveController {
    fn set_reference_voltage(&mut self, voltage: f64) {
        let status = self.motor.set_voltage(voltage);
        if !status.is_ok() {
            warn!(
                "Voltage command to Spark {} failed: {}",
                self.motor.device_id(),
                status
            );
        }
    }

    fn position(&self) -> f64 {
        self.encoder.position()
    }

    fn state_velocity(&self) -> f64 {
        self.encoder.velocity()
    }

    /// Slow the absolute-encoder and I-accumulation signals to
    /// `STATUS_PERIOD_REDUCED_MS`. This deliberately overrides the 20 ms
    /// periods `create` applied; nothing is persisted, so a power cycle
    /// restores them.
    fn set_can_status_frame_period_reductions(&mut self) {
        // A drive motor has no absolute encoder and runs no onboard PID
        let mut signals = SignalsConfig::default();
        signals
            .period_ms(Signal::AbsoluteEncoderPosition, STATUS_PERIOD_REDUCED_MS)
            .period_ms(Signal::AbsoluteEncoderVelocity, STATUS_PERIOD_REDUCED_MS)
            .period_ms(Signal::IAccumulation, STATUS_PERIOD_REDUCED_MS);
        self.motor.set_signal_periods(&signals, self.diagnostics.as_ref());
    }
}

/// Every kind of drive controller a factory can produce
pub enum ControllerHandle {
    Spark(SparkDriveController),
    Simulated(SimDriveController),
}

impl ControllerHandle {
    pub fn device_id(&self) -> u8 {
        match self {
            Self::Spark(c) => c.device_id(),
            Self::Simulated(c) => c.device_id(),
        }
    }
}

impl DriveController for ControllerHandle {
    fn set_reference_voltage(&mut self, voltage: f64) {
        match self {
            Self::Spark(c) => c.set_reference_voltage(voltage),
            Self::Simulated(c) => c.set_reference_voltage(voltage),
        }
    }

    fn position(&self) -> f64 {
        match self {
            Self::Spark(c) => c.position(),
            Self::Simulated(c) => c.position(),
        }
    }

    fn state_velocity(&self) -> f64 {
        match self {
            Self::Spark(c) => c.state_velocity(),
            Self::Simulated(c) => c.state_velocity(),
        }
    }

    fn set_can_status_frame_period_reductions(&mut self) {
        match self {
            Self::Spark(c) => c.set_can_status_frame_period_reductions(),
            Self::Simulated(c) => c.set_can_status_frame_period_reductions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::builder::DriveControllerFactoryBuilder;
    use crate::module::ModuleConfiguration;
    use crate::rev::fake::{Call, FakeLink};
    use crate::rev::link::SparkBus;
    use crate::sim::SimClock;

    fn spark(link: &FakeLink, id: u8) -> ControllerHandle {
        let module = ModuleConfiguration::new(0.1, 0.15, false).unwrap();
        DriveControllerFactoryBuilder::spark(SparkBus::new(link.clone()))
            .build()
            .create(id, &module)
            .unwrap()
    }

    #[test]
    fn test_reads_come_from_the_encoder() {
        let link = FakeLink::default();
        let drive = spark(&link, 7);
        link.set_encoder(7, 1.25, -0.5);

        assert_eq!(drive.device_id(), 7);
        assert_eq!(drive.position(), 1.25);
        assert_eq!(drive.state_velocity(), -0.5);
    }

    #[test]
    fn test_voltage_passed_through_unclamped() {
        let link = FakeLink::default();
        let mut drive = spark(&link, 7);
        drive.set_reference_voltage(30.0);
        assert_eq!(link.calls().last(), Some(&Call::Voltage(7, 30.0)));
    }

    #[test]
    fn test_status_frame_reductions() {
        let link = FakeLink::default();
        let mut drive = spark(&link, 8);
        let before = link.calls().len();

        drive.set_can_status_frame_period_reductions();

        let calls = link.calls();
        // configured fast at creation, then slowed
        assert!(calls[..before].contains(&Call::SignalPeriod(8, Signal::IAccumulation, 20)));
        assert_eq!(
            &calls[before..],
            [
                Call::SignalPeriod(8, Signal::AbsoluteEncoderPosition, 500),
                Call::SignalPeriod(8, Signal::AbsoluteEncoderVelocity, 500),
                Call::SignalPeriod(8, Signal::IAccumulation, 500),
            ]
        );
        // runtime change, nothing burned to flash
        assert!(!calls[before..].iter().any(|c| matches!(c, Call::Persist(_))));
    }

    #[test]
    fn test_drop_stops_motor() {
        let link = FakeLink::default();
        let mut drive = spark(&link, 9);
        drive.set_reference_voltage(5.0);
        drop(drive);
        assert_eq!(link.calls().last(), Some(&Call::Voltage(9, 0.0)));
    }

    #[test]
    fn test_simulated_reductions_are_a_no_op() {
        let clock = SimClock::new();
        let module = ModuleConfiguration::new(0.1, 0.15, false).unwrap();
        let mut drive = DriveControllerFactoryBuilder::simulated(clock)
            .build()
            .create(1, &module)
            .unwrap();
        drive.set_can_status_frame_period_reductions();
        assert_eq!(drive.position(), 0.0);
    }
}
