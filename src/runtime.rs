// Drivetrain bring-up and the fixed-rate spin loop
//
// Opens the bus named in the robot description, builds one drive controller
// per module, and drives them at LOOP_HZ while printing telemetry.

use std::io::Write;
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::{BusConfig, RobotConfig, LOOP_HZ};
use crate::drive::{
    Backend, ControllerHandle, DriveController, DriveControllerFactoryBuilder, DriveError,
};
use crate::rev::can::CanSparkLink;
use crate::rev::link::SparkBus;
use crate::rev::slcan::{SlcanBus, SlcanError};
use crate::sim::SimClock;
use crate::telemetry::{ModuleReport, WheelTelemetry};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Bus error: {0}")]
    Bus(#[from] SlcanError),

    #[error("Module '{module}': {source}")]
    Drive {
        module: String,
        #[source]
        source: DriveError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Open whatever the robot description says the drive motors sit on
pub fn open_backend(bus: &BusConfig) -> Result<Backend, RuntimeError> {
    match bus {
        BusConfig::Slcan { port, baudrate } => {
            let adapter = SlcanBus::open(port, *baudrate)?;
            Ok(Backend::Spark(SparkBus::new(CanSparkLink::new(adapter))))
        }
        BusConfig::Simulated => {
            info!("Using simulated drive motors");
            Ok(Backend::Simulated(SimClock::new()))
        }
    }
}

/// Conversion factors of every module, without touching hardware
pub fn module_reports(config: &RobotConfig) -> Vec<ModuleReport> {
    config
        .modules
        .iter()
        .map(|entry| ModuleReport {
            module: entry.name.clone(),
            drive_id: entry.drive_id,
            drive_inverted: entry.module.drive_inverted(),
            position_conversion_factor: entry.module.position_conversion_factor(),
            velocity_conversion_factor: entry.module.velocity_conversion_factor(),
        })
        .collect()
}

pub struct Wheel {
    pub name: String,
    pub controller: ControllerHandle,
}

/// Every drive motor of the robot
pub struct Drivetrain {
    backend: Backend,
    wheels: Vec<Wheel>,
}

impl Drivetrain {
    /// Open the bus and configure every drive motor
    pub fn from_config(config: &RobotConfig) -> Result<Self, RuntimeError> {
        let backend = open_backend(&config.bus)?;
        Self::with_backend(config, backend)
    }

    /// Configure every drive motor on an already opened backend.
    /// Motors are created one after another; configurations never overlap
    /// on the bus.
    pub fn with_backend(config: &RobotConfig, backend: Backend) -> Result<Self, RuntimeError> {
        let mut builder = DriveControllerFactoryBuilder::new(backend.clone());
        if let Some(volts) = config.drive.voltage_compensation {
            builder = builder.with_voltage_compensation(volts);
        }
        if let Some(amps) = config.drive.current_limit {
            builder = builder.with_current_limit(amps);
        }
        let factory = builder.build();

        let mut wheels = Vec::with_capacity(config.modules.len());
        for entry in &config.modules {
            info!("Configuring {} drive (id {})", entry.name, entry.drive_id);
            let controller = factory
                .create(entry.drive_id, &entry.module)
                .map_err(|source| RuntimeError::Drive {
                    module: entry.name.clone(),
                    source,
                })?;
            wheels.push(Wheel {
                name: entry.name.clone(),
                controller,
            });
        }

        Ok(Self { backend, wheels })
    }

    pub fn wheels(&self) -> &[Wheel] {
        &self.wheels
    }

    pub fn set_voltage(&mut self, volts: f64) {
        for wheel in &mut self.wheels {
            wheel.controller.set_reference_voltage(volts);
        }
    }

    /// Steady-state telemetry trim on every controller
    pub fn reduce_status_frames(&mut self) {
        for wheel in &mut self.wheels {
            wheel.controller.set_can_status_frame_period_reductions();
        }
    }

    /// Let `dt` pass. Real hardware needs nothing; the simulation clock moves.
    pub fn tick(&self, dt: Duration) {
        if let Backend::Simulated(clock) = &self.backend {
            clock.advance(dt);
        }
    }

    pub fn telemetry(&self, t: f64, volts: f64) -> Vec<WheelTelemetry> {
        self.wheels
            .iter()
            .map(|wheel| WheelTelemetry {
                t,
                module: wheel.name.clone(),
                drive_id: wheel.controller.device_id(),
                volts,
                position: wheel.controller.position(),
                velocity: wheel.controller.state_velocity(),
            })
            .collect()
    }
}

/// Hold `volts` on every wheel for `seconds`, writing one JSON line per
/// wheel per loop to `out`, then command 0 V.
pub fn spin(
    drivetrain: &mut Drivetrain,
    volts: f64,
    seconds: f64,
    mut out: impl Write,
) -> Result<(), RuntimeError> {
    let period = Duration::from_millis(1000 / LOOP_HZ);
    let ticks = (seconds.max(0.0) * LOOP_HZ as f64).round() as u64;

    info!(
        "Spinning {} wheels at {} V for {} ticks ({}Hz loop)",
        drivetrain.wheels().len(),
        volts,
        ticks,
        LOOP_HZ
    );

    drivetrain.reduce_status_frames();

    let started = Instant::now();
    let mut result = Ok(());
    for tick in 0..ticks {
        let next = started + period * (tick as u32 + 1);

        drivetrain.set_voltage(volts);
        drivetrain.tick(period);

        let t = (tick + 1) as f64 * period.as_secs_f64();
        if let Err(e) = write_telemetry(&mut out, &drivetrain.telemetry(t, volts)) {
            result = Err(e);
            break;
        }

        let now = Instant::now();
        if next > now {
            sleep(next - now);
        }
    }

    // Always leave the wheels stopped, even if output failed
    drivetrain.set_voltage(0.0);
    info!("Spin finished, wheels stopped");
    result
}

fn write_telemetry(out: &mut impl Write, records: &[WheelTelemetry]) -> Result<(), RuntimeError> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
