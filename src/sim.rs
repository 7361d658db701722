// Simulated drive motors for bench runs without hardware
//
// A first-order brushless motor model: shaft speed chases
// `volts * KV_RPM_PER_VOLT` with a short time constant while driven or
// braking, and a long one while coasting. Time only moves when the shared
// SimClock is advanced, so runs are reproducible.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::drive::builder::DriveSettings;
use crate::drive::claims::DeviceClaims;
use crate::drive::controller::DriveController;
use crate::module::ModuleConfiguration;
use crate::rev::config::IdleMode;

/// Free speed per volt of a Vortex-class motor (6784 RPM at 12 V)
pub const KV_RPM_PER_VOLT: f64 = 6784.0 / 12.0;
/// Supply voltage when no compensation is configured
pub const BATTERY_VOLTAGE: f64 = 12.6;
pub const STALL_CURRENT: f64 = 211.0;

const DRIVEN_TIME_CONSTANT: f64 = 0.05;
const COAST_TIME_CONSTANT: f64 = 2.0;
const STEP: f64 = 0.001;

/// Simulation time shared by every simulated motor
#[derive(Debug, Default)]
pub struct SimClock {
    now: Mutex<Duration>,
    pub(crate) claims: DeviceClaims,
}

impl SimClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advance(&self, dt: Duration) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) += dt;
    }

    pub fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Shaft dynamics of one motor. Speed and rotations are physical (before
/// inversion); readings flip them back so that positive volts always read
/// as positive travel.
#[derive(Debug, Clone)]
pub struct SimMotor {
    pub max_output: f64,
    pub max_acceleration: Option<f64>,
    pub inverted: bool,
    pub idle_mode: IdleMode,
    command: f64,
    rpm: f64,
    rotations: f64,
}

impl SimMotor {
    pub fn new(
        max_output: f64,
        max_acceleration: Option<f64>,
        inverted: bool,
        idle_mode: IdleMode,
    ) -> Self {
        Self {
            max_output,
            max_acceleration,
            inverted,
            idle_mode,
            command: 0.0,
            rpm: 0.0,
            rotations: 0.0,
        }
    }

    pub fn set_voltage(&mut self, volts: f64) {
        self.command = volts;
    }

    /// Integrate `dt` seconds in 1 ms steps
    pub fn step(&mut self, dt: f64) {
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = remaining.min(STEP);
            self.step_once(h);
            remaining -= h;
        }
    }

    fn step_once(&mut self, h: f64) {
        let output = self.command.clamp(-self.max_output, self.max_output);
        let physical = if self.inverted { -output } else { output };
        let target = physical * KV_RPM_PER_VOLT;

        let tau = if output == 0.0 && self.idle_mode == IdleMode::Coast {
            COAST_TIME_CONSTANT
        } else {
            DRIVEN_TIME_CONSTANT
        };

        let mut delta = (target - self.rpm) * (h / tau);
        if let Some(max) = self.max_acceleration {
            delta = delta.clamp(-max * h, max * h);
        }
        self.rpm += delta;
        self.rotations += self.rpm / 60.0 * h;
    }

    fn sign(&self) -> f64 {
        if self.inverted { -1.0 } else { 1.0 }
    }

    /// Motor rotations as the encoder reports them
    pub fn rotations(&self) -> f64 {
        self.sign() * self.rotations
    }

    /// Motor RPM as the encoder reports it
    pub fn rpm(&self) -> f64 {
        self.sign() * self.rpm
    }
}

struct SimState {
    motor: SimMotor,
    updated_at: Duration,
}

/// Drive controller backed by SimMotor
pub struct SimDriveController {
    clock: Arc<SimClock>,
    device: u8,
    position_factor: f64,
    velocity_factor: f64,
    state: Mutex<SimState>,
}

impl SimDriveController {
    /// Build a simulated motor configured the way a real one would be.
    /// The caller must already hold the claim on `device`.
    pub(crate) fn new(
        clock: Arc<SimClock>,
        device: u8,
        settings: &DriveSettings,
        module: &ModuleConfiguration,
    ) -> Self {
        let max_output = settings.voltage_compensation.unwrap_or(BATTERY_VOLTAGE).abs();
        // Current limit scales the stall acceleration down proportionally
        let max_acceleration = settings.current_limit.map(|amps| {
            let stall_acceleration = KV_RPM_PER_VOLT * BATTERY_VOLTAGE / DRIVEN_TIME_CONSTANT;
            stall_acceleration * (amps.max(0.0).trunc() / STALL_CURRENT)
        });
        let motor = SimMotor::new(
            max_output,
            max_acceleration,
            module.drive_inverted(),
            IdleMode::Brake,
        );

        Self {
            device,
            position_factor: module.position_conversion_factor(),
            velocity_factor: module.velocity_conversion_factor(),
            state: Mutex::new(SimState {
                motor,
                updated_at: clock.now(),
            }),
            clock,
        }
    }

    pub fn device_id(&self) -> u8 {
        self.device
    }

    pub fn idle_mode(&self) -> IdleMode {
        self.with_motor(|motor| motor.idle_mode)
    }

    /// Catch the motor up to the clock, then look at it
    fn with_motor<T>(&self, f: impl FnOnce(&mut SimMotor) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let now = self.clock.now();
        let elapsed = now.saturating_sub(state.updated_at);
        state.motor.step(elapsed.as_secs_f64());
        state.updated_at = now;
        f(&mut state.motor)
    }
}

impl DriveController for SimDriveController {
    fn set_reference_voltage(&mut self, voltage: f64) {
        self.with_motor(|motor| motor.set_voltage(voltage));
    }

    fn position(&self) -> f64 {
        self.with_motor(|motor| motor.rotations()) * self.position_factor
    }

    fn state_velocity(&self) -> f64 {
        self.with_motor(|motor| motor.rpm()) * self.velocity_factor
    }
}

impl Drop for SimDriveController {
    fn drop(&mut self) {
        self.clock.claims.release(self.device);
    }
}
