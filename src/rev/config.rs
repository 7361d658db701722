// In-memory Spark configuration, committed to the device in one transaction
//
// Every field is optional: a field left unset is never written, so the
// device keeps whatever its defaults (after the reset) say.

/// Periodically transmitted telemetry values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    AppliedOutput,
    Faults,
    PrimaryEncoderVelocity,
    PrimaryEncoderPosition,
    AbsoluteEncoderVelocity,
    AbsoluteEncoderPosition,
    BusVoltage,
    MotorTemperature,
    OutputCurrent,
    IAccumulation,
}

impl Signal {
    pub fn wire_id(self) -> u8 {
        match self {
            Self::AppliedOutput => 0,
            Self::Faults => 1,
            Self::PrimaryEncoderVelocity => 2,
            Self::PrimaryEncoderPosition => 3,
            Self::AbsoluteEncoderVelocity => 4,
            Self::AbsoluteEncoderPosition => 5,
            Self::BusVoltage => 6,
            Self::MotorTemperature => 7,
            Self::OutputCurrent => 8,
            Self::IAccumulation => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AppliedOutput => "applied output",
            Self::Faults => "faults",
            Self::PrimaryEncoderVelocity => "primary encoder velocity",
            Self::PrimaryEncoderPosition => "primary encoder position",
            Self::AbsoluteEncoderVelocity => "absolute encoder velocity",
            Self::AbsoluteEncoderPosition => "absolute encoder position",
            Self::BusVoltage => "bus voltage",
            Self::MotorTemperature => "motor temperature",
            Self::OutputCurrent => "output current",
            Self::IAccumulation => "I accumulation",
        }
    }
}

/// Persistent device parameters this crate writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    VoltageCompensation,
    SmartCurrentLimit,
    Inverted,
    IdleMode,
    PositionConversionFactor,
    VelocityConversionFactor,
}

impl Parameter {
    pub fn wire_id(self) -> u16 {
        match self {
            Self::Inverted => 2,
            Self::IdleMode => 6,
            Self::VoltageCompensation => 59,
            Self::SmartCurrentLimit => 60,
            Self::PositionConversionFactor => 112,
            Self::VelocityConversionFactor => 113,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VoltageCompensation => "voltage compensation",
            Self::SmartCurrentLimit => "smart current limit",
            Self::Inverted => "inversion",
            Self::IdleMode => "idle mode",
            Self::PositionConversionFactor => "position conversion factor",
            Self::VelocityConversionFactor => "velocity conversion factor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Float(f64),
    Uint(u32),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleMode {
    Coast,
    Brake,
}

impl IdleMode {
    pub fn wire_value(self) -> u32 {
        match self {
            Self::Coast => 0,
            Self::Brake => 1,
        }
    }
}

/// What to do with the device's existing parameters before applying a config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    NoResetSafeParameters,
    ResetSafeParameters,
}

/// Whether a config is burned to flash once applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    NoPersistParameters,
    PersistParameters,
}

/// Signal refresh periods, in the order they were set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalsConfig {
    periods: Vec<(Signal, u16)>,
}

impl SignalsConfig {
    /// Set a signal's refresh period, replacing any earlier value
    pub fn period_ms(&mut self, signal: Signal, period_ms: u16) -> &mut Self {
        match self.periods.iter_mut().find(|(s, _)| *s == signal) {
            Some(entry) => entry.1 = period_ms,
            None => self.periods.push((signal, period_ms)),
        }
        self
    }

    pub fn get(&self, signal: Signal) -> Option<u16> {
        self.periods
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|&(_, period)| period)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Signal, u16)> + '_ {
        self.periods.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncoderConfig {
    position_conversion_factor: Option<f64>,
    velocity_conversion_factor: Option<f64>,
}

impl EncoderConfig {
    pub fn position_conversion_factor(&mut self, factor: f64) -> &mut Self {
        self.position_conversion_factor = Some(factor);
        self
    }

    pub fn velocity_conversion_factor(&mut self, factor: f64) -> &mut Self {
        self.velocity_conversion_factor = Some(factor);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparkConfig {
    pub signals: SignalsConfig,
    voltage_compensation: Option<f64>,
    smart_current_limit: Option<u32>,
    inverted: Option<bool>,
    idle_mode: Option<IdleMode>,
    encoder: EncoderConfig,
}

impl SparkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voltage_compensation(&mut self, nominal_voltage: f64) -> &mut Self {
        self.voltage_compensation = Some(nominal_voltage);
        self
    }

    pub fn smart_current_limit(&mut self, amps: u32) -> &mut Self {
        self.smart_current_limit = Some(amps);
        self
    }

    pub fn inverted(&mut self, inverted: bool) -> &mut Self {
        self.inverted = Some(inverted);
        self
    }

    pub fn idle_mode(&mut self, mode: IdleMode) -> &mut Self {
        self.idle_mode = Some(mode);
        self
    }

    /// Merge encoder settings; fields unset in `encoder` are kept
    pub fn apply_encoder(&mut self, encoder: &EncoderConfig) -> &mut Self {
        if let Some(factor) = encoder.position_conversion_factor {
            self.encoder.position_conversion_factor = Some(factor);
        }
        if let Some(factor) = encoder.velocity_conversion_factor {
            self.encoder.velocity_conversion_factor = Some(factor);
        }
        self
    }

    /// Parameters to write, in application order
    pub fn parameters(&self) -> Vec<(Parameter, ParameterValue)> {
        let mut params = Vec::with_capacity(6);

        if let Some(volts) = self.voltage_compensation {
            params.push((Parameter::VoltageCompensation, ParameterValue::Float(volts)));
        }
        if let Some(amps) = self.smart_current_limit {
            params.push((Parameter::SmartCurrentLimit, ParameterValue::Uint(amps)));
        }
        if let Some(inverted) = self.inverted {
            params.push((Parameter::Inverted, ParameterValue::Bool(inverted)));
        }
        if let Some(mode) = self.idle_mode {
            params.push((Parameter::IdleMode, ParameterValue::Uint(mode.wire_value())));
        }
        if let Some(factor) = self.encoder.position_conversion_factor {
            params.push((
                Parameter::PositionConversionFactor,
                ParameterValue::Float(factor),
            ));
        }
        if let Some(factor) = self.encoder.velocity_conversion_factor {
            params.push((
                Parameter::VelocityConversionFactor,
                ParameterValue::Float(factor),
            ));
        }

        params
    }
}
