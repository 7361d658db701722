// Result codes returned by every Spark call

use std::fmt;

use crate::diagnostics::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Error,
    Timeout,
    NotImplemented,
    CanError,
    ParamInvalidId,
    ParamMismatchType,
    ParamAccessMode,
    ParamInvalid,
    InvalidCanId,
    Unknown(u8),
}

impl StatusCode {
    /// Decode the status byte of a device acknowledgement
    pub fn from_wire(raw: u8) -> Self {
        match raw {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::Timeout,
            3 => Self::NotImplemented,
            4 => Self::CanError,
            5 => Self::ParamInvalidId,
            6 => Self::ParamMismatchType,
            7 => Self::ParamAccessMode,
            8 => Self::ParamInvalid,
            9 => Self::InvalidCanId,
            other => Self::Unknown(other),
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "general error"),
            Self::Timeout => write!(f, "timed out waiting for device"),
            Self::NotImplemented => write!(f, "not implemented"),
            Self::CanError => write!(f, "CAN bus error"),
            Self::ParamInvalidId => write!(f, "invalid parameter id"),
            Self::ParamMismatchType => write!(f, "parameter type mismatch"),
            Self::ParamAccessMode => write!(f, "parameter is read-only"),
            Self::ParamInvalid => write!(f, "parameter value rejected"),
            Self::InvalidCanId => write!(f, "invalid CAN id"),
            Self::Unknown(raw) => write!(f, "unknown status 0x{:02X}", raw),
        }
    }
}

impl Status for StatusCode {
    fn is_ok(&self) -> bool {
        StatusCode::is_ok(*self)
    }
}
