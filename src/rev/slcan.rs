// Serial-line CAN (SLCAN) adapter
//
// ASCII protocol, every command terminated by '\r':
//   S8          set bitrate to 1 Mbit/s
//   O / C       open / close the channel
//   Tiiiiiiiildd..  transmit/receive extended frame (8 hex id, length, data)
//   tiiildd..       same for standard ids
// The adapter answers commands with '\r' (ok), 'z\r'/'Z\r' (frame queued)
// or BEL (error); those replies carry no frames and are skipped.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, info, warn};

use super::can::{CanBus, CanFrame};
use crate::config::ADAPTER_READ_TIMEOUT;

const TERMINATOR: u8 = b'\r';
const BELL: u8 = 0x07;
/// Longest unterminated run kept before it is written off as line noise.
/// A full extended frame line is 26 bytes.
const MAX_PENDING: usize = 256;

/// CAN bitrate command for the 1 Mbit/s FRC bus
const BITRATE_1M: &[u8] = b"S8\r";
const OPEN: &[u8] = b"O\r";
const CLOSE: &[u8] = b"C\r";

#[derive(Debug, thiserror::Error)]
pub enum SlcanError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed SLCAN line {line:?}: {reason}")]
    Malformed { line: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SlcanError>;

/// A USB/serial CAN adapter speaking SLCAN
pub struct SlcanBus {
    port: Box<dyn SerialPort>,
    rx: Vec<u8>,
}

impl SlcanBus {
    /// Open the adapter and bring the CAN channel up at 1 Mbit/s
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening SLCAN adapter on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(ADAPTER_READ_TIMEOUT)
            .open()?;
        Self::with_port(port)
    }

    /// Use an already opened serial port
    pub fn with_port(port: Box<dyn SerialPort>) -> Result<Self> {
        let mut bus = Self {
            port,
            rx: Vec::with_capacity(256),
        };
        // Close first in case a previous run left the channel open
        bus.write_command(CLOSE)?;
        bus.write_command(BITRATE_1M)?;
        bus.write_command(OPEN)?;
        Ok(bus)
    }

    fn write_command(&mut self, command: &[u8]) -> Result<()> {
        self.port.write_all(command)?;
        self.port.flush()?;
        Ok(())
    }

    /// Parse the next complete frame already sitting in the receive buffer
    fn next_buffered_frame(&mut self) -> Option<CanFrame> {
        while let Some(end) = self.rx.iter().position(|&b| b == TERMINATOR) {
            let line: Vec<u8> = self.rx.drain(..=end).collect();
            // Error replies are a bare BEL with no terminator, so several
            // can pile up in front of the next line
            let mut line = &line[..line.len() - 1];
            while let Some(rest) = line.strip_prefix(&[BELL]) {
                line = rest;
            }

            match line.first() {
                Some(b'T') | Some(b't') => match decode_frame(line) {
                    Ok(frame) => return Some(frame),
                    Err(e) => debug!("Skipping {}", e),
                },
                Some(b'z') | Some(b'Z') | None => {}
                Some(_) => debug!("Ignoring adapter reply {:?}", String::from_utf8_lossy(line)),
            }
        }

        if self.rx.len() > MAX_PENDING {
            warn!("Dropping {} bytes of unterminated adapter input", self.rx.len());
            self.rx.clear();
        }
        None
    }

    fn fill(&mut self, max: usize) -> std::io::Result<usize> {
        let mut chunk = [0u8; 128];
        let n = self.port.read(&mut chunk[..max.clamp(1, 128)])?;
        self.rx.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

impl CanBus for SlcanBus {
    type Error = SlcanError;

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let line = encode_frame(frame);
        self.write_command(&line)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.next_buffered_frame() {
                return Ok(Some(frame));
            }

            let available = self.port.bytes_to_read()? as usize;
            if available > 0 {
                self.fill(available)?;
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // Block for the next byte, bounded by what's left of the timeout
            self.port.set_timeout(deadline - now)?;
            match self.fill(1) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for SlcanBus {
    fn drop(&mut self) {
        if let Err(e) = self.write_command(CLOSE) {
            warn!("Failed to close SLCAN channel: {}", e);
        }
    }
}

/// Render a frame as an SLCAN transmit command (terminator included)
pub fn encode_frame(frame: &CanFrame) -> Vec<u8> {
    let data = frame.data();
    let mut line = format!("T{:08X}{}", frame.id(), data.len());
    for byte in data {
        line.push_str(&format!("{:02X}", byte));
    }
    line.push('\r');
    line.into_bytes()
}

/// Parse one received SLCAN frame line (terminator stripped)
pub fn decode_frame(line: &[u8]) -> Result<CanFrame> {
    let malformed = |reason: &str| SlcanError::Malformed {
        line: String::from_utf8_lossy(line).into_owned(),
        reason: reason.to_string(),
    };

    let id_len = match line.first() {
        Some(b'T') => 8,
        Some(b't') => 3,
        _ => return Err(malformed("not a data frame")),
    };

    if !line.is_ascii() {
        return Err(malformed("not ASCII"));
    }
    let text = std::str::from_utf8(line).map_err(|_| malformed("not ASCII"))?;
    let id_text = text
        .get(1..1 + id_len)
        .ok_or_else(|| malformed("truncated id"))?;
    let id = u32::from_str_radix(id_text, 16).map_err(|_| malformed("bad id"))?;

    let len_text = text
        .get(1 + id_len..2 + id_len)
        .ok_or_else(|| malformed("missing length"))?;
    let len = len_text
        .parse::<usize>()
        .ok()
        .filter(|&len| len <= 8)
        .ok_or_else(|| malformed("bad length"))?;

    let data_text = &text[2 + id_len..];
    if data_text.len() < len * 2 {
        return Err(malformed("truncated data"));
    }

    let mut data = [0u8; 8];
    for (i, byte) in data.iter_mut().take(len).enumerate() {
        *byte = u8::from_str_radix(&data_text[i * 2..i * 2 + 2], 16)
            .map_err(|_| malformed("bad data byte"))?;
    }

    CanFrame::new(id, &data[..len]).ok_or_else(|| malformed("id out of range"))
}
