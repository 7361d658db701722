// Recording SparkLink for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::config::{Parameter, ParameterValue, Signal};
use super::link::SparkLink;
use super::status::StatusCode;
use crate::diagnostics::DiagnosticsSink;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reset(u8),
    SignalPeriod(u8, Signal, u16),
    Parameter(u8, Parameter, ParameterValue),
    Persist(u8),
    Voltage(u8, f64),
}

/// A call the fake answers with `StatusCode::Timeout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Reset,
    SignalPeriod(Signal),
    Parameter(Parameter),
    Persist,
}

#[derive(Default)]
pub struct Journal {
    pub calls: Vec<Call>,
    pub failing: HashSet<Fault>,
    pub encoders: HashMap<u8, (f64, f64)>,
}

/// Every call lands in a journal the test keeps a handle to
#[derive(Clone, Default)]
pub struct FakeLink(pub Arc<Mutex<Journal>>);

impl FakeLink {
    pub fn failing(fault: Fault) -> Self {
        let link = Self::default();
        link.0.lock().unwrap().failing.insert(fault);
        link
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, device: u8) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                let id = match call {
                    Call::Reset(id)
                    | Call::SignalPeriod(id, ..)
                    | Call::Parameter(id, ..)
                    | Call::Persist(id)
                    | Call::Voltage(id, _) => *id,
                };
                id == device
            })
            .collect()
    }

    pub fn set_encoder(&self, device: u8, position: f64, velocity: f64) {
        self.0.lock().unwrap().encoders.insert(device, (position, velocity));
    }

    /// Journal `call`, then answer as scripted for `fault`
    fn record(&self, call: Call, fault: Fault) -> StatusCode {
        let mut journal = self.0.lock().unwrap();
        journal.calls.push(call);
        if journal.failing.contains(&fault) {
            StatusCode::Timeout
        } else {
            StatusCode::Ok
        }
    }
}

impl SparkLink for FakeLink {
    fn reset_safe_parameters(&mut self, device: u8) -> StatusCode {
        self.record(Call::Reset(device), Fault::Reset)
    }

    fn set_signal_period(&mut self, device: u8, signal: Signal, period_ms: u16) -> StatusCode {
        self.record(
            Call::SignalPeriod(device, signal, period_ms),
            Fault::SignalPeriod(signal),
        )
    }

    fn set_parameter(
        &mut self,
        device: u8,
        parameter: Parameter,
        value: ParameterValue,
    ) -> StatusCode {
        self.record(
            Call::Parameter(device, parameter, value),
            Fault::Parameter(parameter),
        )
    }

    fn persist_parameters(&mut self, device: u8) -> StatusCode {
        self.record(Call::Persist(device), Fault::Persist)
    }

    fn set_voltage(&mut self, device: u8, volts: f64) -> StatusCode {
        self.0.lock().unwrap().calls.push(Call::Voltage(device, volts));
        StatusCode::Ok
    }

    fn position(&mut self, device: u8) -> f64 {
        self.0.lock().unwrap().encoders.get(&device).map_or(0.0, |e| e.0)
    }

    fn velocity(&mut self, device: u8) -> f64 {
        self.0.lock().unwrap().encoders.get(&device).map_or(0.0, |e| e.1)
    }
}

/// Keeps every reported message
#[derive(Default)]
pub struct RecordingSink(pub Mutex<Vec<String>>);

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report_error(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}
