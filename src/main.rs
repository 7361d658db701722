use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swerve_drive_hal::config::{RobotConfig, DEFAULT_CONFIG_PATH};
use swerve_drive_hal::runtime::{self, Drivetrain};

#[derive(Parser)]
#[command(name = "swerve-hal", version, about = "Configure and exercise swerve drive motors")]
struct Cli {
    /// Robot description (JSON)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the robot description and print conversion factors
    Check,
    /// Run the configuration sequence on every drive motor
    Configure,
    /// Hold a voltage on every wheel and stream telemetry as JSON lines
    Spin {
        /// Output voltage (negative spins backwards)
        #[arg(long, allow_hyphen_values = true)]
        volts: f64,
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,
    },
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = RobotConfig::load(&cli.config)?;

    match cli.command {
        Command::Check => {
            for report in runtime::module_reports(&config) {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Command::Configure => {
            let drivetrain = Drivetrain::from_config(&config)?;
            println!("Configured {} drive motors", drivetrain.wheels().len());
        }
        Command::Spin { volts, seconds } => {
            let mut drivetrain = Drivetrain::from_config(&config)?;
            runtime::spin(&mut drivetrain, volts, seconds, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
