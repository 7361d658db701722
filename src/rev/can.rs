// Spark commands as FRC CAN frames
//
// 29-bit FRC arbitration id layout:
// [device type:5][manufacturer:8][api class:6][api index:4][device number:6]
//
// Host -> device commands are acknowledged with an ACK frame carrying the
// command's api index, a 16-bit key (parameter or signal id) and a status
// byte. Encoder values arrive unsolicited in periodic status frames and are
// cached per device.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::config::{Parameter, ParameterValue, Signal};
use super::link::{SparkLink, MAX_DEVICE_ID};
use super::status::StatusCode;
use crate::config::{FLASH_ACK_TIMEOUT, PARAMETER_ACK_TIMEOUT};

pub const DEVICE_TYPE_MOTOR_CONTROLLER: u32 = 2;
pub const MANUFACTURER_REV: u32 = 5;

/// Upper bound on frames drained per read so a chatty bus can't stall a caller
const MAX_DRAIN_FRAMES: usize = 64;

/// Classic CAN data frame with an extended id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    len: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Returns None if `data` is longer than 8 bytes or `id` exceeds 29 bits
    pub fn new(id: u32, data: &[u8]) -> Option<Self> {
        if data.len() > 8 || id > 0x1FFF_FFFF {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            len: data.len() as u8,
            data: buf,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Raw frame transport
pub trait CanBus: Send {
    type Error: std::error::Error;

    fn send(&mut self, frame: &CanFrame) -> Result<(), Self::Error>;

    /// Next received frame, or None if nothing arrives within `timeout`.
    /// A zero timeout polls without blocking.
    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>, Self::Error>;
}

/// API class/index pair of an FRC CAN id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Api {
    pub class: u8,
    pub index: u8,
}

impl Api {
    pub const VOLTAGE_SETPOINT: Api = Api { class: 0, index: 2 };
    pub const STATUS_1: Api = Api { class: 6, index: 1 };
    pub const STATUS_2: Api = Api { class: 6, index: 2 };
    pub const PARAMETER_WRITE: Api = Api { class: 48, index: 0 };
    pub const SIGNAL_PERIOD: Api = Api { class: 48, index: 1 };
    pub const RESET_SAFE_PARAMETERS: Api = Api { class: 48, index: 2 };
    pub const PERSIST_PARAMETERS: Api = Api { class: 48, index: 3 };
    pub const ACK: Api = Api { class: 48, index: 15 };
}

/// Build the arbitration id for a REV motor controller
pub fn frc_id(api: Api, device: u8) -> u32 {
    (DEVICE_TYPE_MOTOR_CONTROLLER << 24)
        | (MANUFACTURER_REV << 16)
        | ((api.class as u32 & 0x3F) << 10)
        | ((api.index as u32 & 0x0F) << 6)
        | (device as u32 & 0x3F)
}

/// Split an arbitration id; None if it isn't from a REV motor controller
pub fn decode_frc_id(id: u32) -> Option<(Api, u8)> {
    if (id >> 24) & 0x1F != DEVICE_TYPE_MOTOR_CONTROLLER || (id >> 16) & 0xFF != MANUFACTURER_REV
    {
        return None;
    }
    let api = Api {
        class: ((id >> 10) & 0x3F) as u8,
        index: ((id >> 6) & 0x0F) as u8,
    };
    Some((api, (id & 0x3F) as u8))
}

fn encode_value(value: ParameterValue) -> (u8, [u8; 4]) {
    match value {
        ParameterValue::Uint(v) => (0, v.to_le_bytes()),
        ParameterValue::Float(v) => (1, (v as f32).to_le_bytes()),
        ParameterValue::Bool(v) => (2, (v as u32).to_le_bytes()),
    }
}

fn read_f32(data: &[u8]) -> Option<f64> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(f32::from_le_bytes(bytes) as f64)
}

#[derive(Debug, Clone, Copy, Default)]
struct EncoderState {
    position: f64,
    velocity: f64,
}

/// SparkLink over any CAN transport
pub struct CanSparkLink<B: CanBus> {
    bus: B,
    encoders: HashMap<u8, EncoderState>,
}

impl<B: CanBus> CanSparkLink<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            encoders: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn send(&mut self, api: Api, device: u8, data: &[u8]) -> StatusCode {
        if device > MAX_DEVICE_ID {
            return StatusCode::InvalidCanId;
        }
        let Some(frame) = CanFrame::new(frc_id(api, device), data) else {
            return StatusCode::Error;
        };
        match self.bus.send(&frame) {
            Ok(()) => StatusCode::Ok,
            Err(e) => {
                warn!("CAN send to device {} failed: {}", device, e);
                StatusCode::CanError
            }
        }
    }

    /// Send a command and block until the device acknowledges it
    fn transact(
        &mut self,
        api: Api,
        device: u8,
        key: u16,
        data: &[u8],
        timeout: Duration,
    ) -> StatusCode {
        let status = self.send(api, device, data);
        if !status.is_ok() {
            return status;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match self.bus.recv(remaining) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("CAN receive from device {} failed: {}", device, e);
                    return StatusCode::CanError;
                }
            };

            if let Some(status) = self.handle_frame(&frame, (api, device, key)) {
                return status;
            }
            if remaining.is_zero() {
                break;
            }
        }

        debug!(
            "No acknowledgement from device {} for api {:?} key {}",
            device, api, key
        );
        StatusCode::Timeout
    }

    /// Cache encoder telemetry; returns the status if `frame` is the
    /// acknowledgement we are waiting for
    fn handle_frame(&mut self, frame: &CanFrame, pending: (Api, u8, u16)) -> Option<StatusCode> {
        let (api, device) = decode_frc_id(frame.id())?;
        let data = frame.data();

        match api {
            Api::STATUS_1 => {
                if let Some(velocity) = read_f32(data) {
                    self.encoders.entry(device).or_default().velocity = velocity;
                }
                None
            }
            Api::STATUS_2 => {
                if let Some(position) = read_f32(data) {
                    self.encoders.entry(device).or_default().position = position;
                }
                None
            }
            Api::ACK if data.len() >= 4 => {
                let (pending_api, pending_device, pending_key) = pending;
                let key = u16::from_le_bytes([data[1], data[2]]);
                if device == pending_device
                    && data[0] == pending_api.index
                    && key == pending_key
                {
                    Some(StatusCode::from_wire(data[3]))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Pull in whatever telemetry is already waiting
    fn drain(&mut self) {
        // Device 255 doesn't fit the 6-bit device field, so no ACK matches
        let no_pending = (Api::VOLTAGE_SETPOINT, u8::MAX, u16::MAX);
        for _ in 0..MAX_DRAIN_FRAMES {
            match self.bus.recv(Duration::ZERO) {
                Ok(Some(frame)) => {
                    self.handle_frame(&frame, no_pending);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("CAN receive failed while reading telemetry: {}", e);
                    break;
                }
            }
        }
    }

    fn encoder(&mut self, device: u8) -> EncoderState {
        self.drain();
        self.encoders.get(&device).copied().unwrap_or_default()
    }
}

impl<B: CanBus> SparkLink for CanSparkLink<B> {
    fn reset_safe_parameters(&mut self, device: u8) -> StatusCode {
        self.transact(
            Api::RESET_SAFE_PARAMETERS,
            device,
            0,
            &[],
            PARAMETER_ACK_TIMEOUT,
        )
    }

    fn set_signal_period(&mut self, device: u8, signal: Signal, period_ms: u16) -> StatusCode {
        let [lo, hi] = period_ms.to_le_bytes();
        self.transact(
            Api::SIGNAL_PERIOD,
            device,
            signal.wire_id() as u16,
            &[signal.wire_id(), lo, hi],
            PARAMETER_ACK_TIMEOUT,
        )
    }

    fn set_parameter(
        &mut self,
        device: u8,
        parameter: Parameter,
        value: ParameterValue,
    ) -> StatusCode {
        let id = parameter.wire_id();
        let [id_lo, id_hi] = id.to_le_bytes();
        let (kind, bytes) = encode_value(value);
        let data = [id_lo, id_hi, kind, bytes[0], bytes[1], bytes[2], bytes[3]];
        self.transact(
            Api::PARAMETER_WRITE,
            device,
            id,
            &data,
            PARAMETER_ACK_TIMEOUT,
        )
    }

    fn persist_parameters(&mut self, device: u8) -> StatusCode {
        self.transact(Api::PERSIST_PARAMETERS, device, 0, &[], FLASH_ACK_TIMEOUT)
    }

    fn set_voltage(&mut self, device: u8, volts: f64) -> StatusCode {
        self.send(Api::VOLTAGE_SETPOINT, device, &(volts as f32).to_le_bytes())
    }

    fn position(&mut self, device: u8) -> f64 {
        self.encoder(device).position
    }

    fn velocity(&mut self, device: u8) -> f64 {
        self.encoder(device).velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::convert::Infallible;

    /// Acknowledges every command, except parameter ids listed in `reject`
    /// and everything sent to `silent` devices
    #[derive(Default)]
    struct FakeDevice {
        sent: Vec<CanFrame>,
        inbox: VecDeque<CanFrame>,
        reject: HashSet<u16>,
        silent: HashSet<u8>,
    }

    impl FakeDevice {
        fn ack(&mut self, api: Api, device: u8, key: u16, status: u8) {
            let [lo, hi] = key.to_le_bytes();
            let frame = CanFrame::new(frc_id(Api::ACK, device), &[api.index, lo, hi, status]);
            self.inbox.push_back(frame.unwrap());
        }

        fn telemetry(&mut self, api: Api, device: u8, value: f32) {
            let frame = CanFrame::new(frc_id(api, device), &value.to_le_bytes()).unwrap();
            self.inbox.push_back(frame);
        }
    }

    impl CanBus for FakeDevice {
        type Error = Infallible;

        fn send(&mut self, frame: &CanFrame) -> Result<(), Infallible> {
            self.sent.push(*frame);
            let (api, device) = decode_frc_id(frame.id()).unwrap();
            if self.silent.contains(&device) || api == Api::VOLTAGE_SETPOINT {
                return Ok(());
            }
            let data = frame.data();
            let key = match api {
                Api::PARAMETER_WRITE => u16::from_le_bytes([data[0], data[1]]),
                Api::SIGNAL_PERIOD => data[0] as u16,
                _ => 0,
            };
            let status = if api == Api::PARAMETER_WRITE && self.reject.contains(&key) {
                8
            } else {
                0
            };
            self.ack(api, device, key, status);
            Ok(())
        }

        fn recv(&mut self, _timeout: Duration) -> Result<Option<CanFrame>, Infallible> {
            Ok(self.inbox.pop_front())
        }
    }

    #[test]
    fn test_frc_id_layout() {
        let id = frc_id(Api::PARAMETER_WRITE, 5);
        assert_eq!(id, 0x0205_C005);
        assert_eq!(decode_frc_id(id), Some((Api::PARAMETER_WRITE, 5)));
        // CTRE (manufacturer 4) traffic is not ours
        assert_eq!(decode_frc_id(0x0204_0001), None);
    }

    #[test]
    fn test_frame_length_limit() {
        assert!(CanFrame::new(1, &[0; 8]).is_some());
        assert!(CanFrame::new(1, &[0; 9]).is_none());
        assert!(CanFrame::new(0x2000_0000, &[]).is_none());
    }

    #[test]
    fn test_parameter_write_encoding() {
        let mut link = CanSparkLink::new(FakeDevice::default());
        let status = link.set_parameter(
            3,
            Parameter::SmartCurrentLimit,
            ParameterValue::Uint(40),
        );
        assert_eq!(status, StatusCode::Ok);

        let bus = link.into_inner();
        assert_eq!(bus.sent.len(), 1);
        assert_eq!(bus.sent[0].id(), frc_id(Api::PARAMETER_WRITE, 3));
        assert_eq!(bus.sent[0].data(), &[60, 0, 0, 40, 0, 0, 0]);
    }

    #[test]
    fn test_rejected_parameter_reports_device_status() {
        let mut device = FakeDevice::default();
        device.reject.insert(Parameter::Inverted.wire_id());
        let mut link = CanSparkLink::new(device);

        assert_eq!(
            link.set_parameter(1, Parameter::Inverted, ParameterValue::Bool(true)),
            StatusCode::ParamInvalid
        );
        assert_eq!(
            link.set_parameter(1, Parameter::IdleMode, ParameterValue::Uint(1)),
            StatusCode::Ok
        );
    }

    #[test]
    fn test_silent_device_times_out() {
        let mut device = FakeDevice::default();
        device.silent.insert(9);
        let mut link = CanSparkLink::new(device);
        assert_eq!(link.persist_parameters(9), StatusCode::Timeout);
    }

    #[test]
    fn test_out_of_range_device_never_sent() {
        let mut link = CanSparkLink::new(FakeDevice::default());
        assert_eq!(link.reset_safe_parameters(63), StatusCode::InvalidCanId);
        assert!(link.into_inner().sent.is_empty());
    }

    #[test]
    fn test_telemetry_cached_per_device() {
        let mut device = FakeDevice::default();
        device.telemetry(Api::STATUS_2, 1, 1.5);
        device.telemetry(Api::STATUS_1, 1, -0.25);
        device.telemetry(Api::STATUS_2, 2, 7.0);
        let mut link = CanSparkLink::new(device);

        assert_eq!(link.position(1), 1.5);
        assert_eq!(link.velocity(1), -0.25);
        assert_eq!(link.position(2), 7.0);
        assert_eq!(link.velocity(2), 0.0);
        assert_eq!(link.position(4), 0.0);
    }

    #[test]
    fn test_telemetry_seen_while_waiting_for_ack() {
        let mut device = FakeDevice::default();
        device.telemetry(Api::STATUS_2, 6, 3.0);
        let mut link = CanSparkLink::new(device);

        assert_eq!(link.reset_safe_parameters(6), StatusCode::Ok);
        assert_eq!(link.position(6), 3.0);
    }

    #[test]
    fn test_voltage_is_fire_and_forget() {
        let mut link = CanSparkLink::new(FakeDevice::default());
        assert_eq!(link.set_voltage(2, -6.0), StatusCode::Ok);
        let bus = link.into_inner();
        assert_eq!(bus.sent[0].id(), frc_id(Api::VOLTAGE_SETPOINT, 2));
        assert_eq!(bus.sent[0].data(), &(-6.0f32).to_le_bytes());
        assert!(bus.inbox.is_empty());
    }
}
