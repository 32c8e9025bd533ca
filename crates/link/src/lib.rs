//! byte-serial link layer: framing, link contract and simulated ports

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod framing;
pub mod memory;
pub mod simulated;
pub mod stream;

pub use framing::{DecodeOutcome, DecodeStatus, FrameDecoder, FrameEncoder};
pub use memory::MemoryLink;
pub use simulated::{LineStats, SimulatedPort, VirtualPortPair};
pub use stream::StreamLink;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Port {0} does not exist")]
    PortNotFound(String),

    #[error("Port {0} is already open")]
    PortBusy(String),

    #[error("Link closed by the remote end")]
    Closed,

    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A byte-serial channel. Every call moves exactly one byte.
#[async_trait]
pub trait Link: Send {
    async fn write_byte(&mut self, byte: u8) -> Result<(), LinkError>;

    /// Waits up to `timeout` for one byte. `Ok(None)` means the window elapsed
    /// with nothing on the line.
    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, LinkError>;
}

/// Hands out link endpoints by name, like opening a serial device path.
#[async_trait]
pub trait PortOpener: Send + Sync + 'static {
    type Port: Link + 'static;

    async fn open(&self, endpoint: &str) -> Result<Self::Port, LinkError>;
}

/// Impairments applied to every byte crossing a simulated wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConditions {
    /// Probability that a byte arrives as 0x00
    pub byte_reset_probability: f64,
    /// Probability that a byte arrives with one random bit inverted
    pub bit_flip_probability: f64,
    /// Hold each byte on the wire for 10 bit times (8N1) at the configured baud rate
    pub paced: bool,
}

impl LineConditions {
    pub fn lossless() -> Self {
        Self {
            byte_reset_probability: 0.0,
            bit_flip_probability: 0.0,
            paced: false,
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.byte_reset_probability <= 0.0 && self.bit_flip_probability <= 0.0
    }
}

impl Default for LineConditions {
    fn default() -> Self {
        Self {
            byte_reset_probability: 0.005,
            bit_flip_probability: 0.0,
            paced: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub sender_endpoint: String,
    pub receiver_endpoint: String,
    pub baud_rate: u32,
    /// Read window for each byte the decoder waits on
    pub per_attempt_timeout: Duration,
    pub inter_packet_delay: Duration,
    pub overall_session_timeout: Duration,
    pub success_target: u32,
    pub max_attempts: u32,
    /// Head start the receiver gets before the sender begins writing
    pub sender_stagger: Duration,
    /// Pause between two receive attempts
    pub attempt_pause: Duration,
    pub line: LineConditions,
}

impl LinkConfig {
    /// Time one byte occupies the wire: start bit, 8 data bits, stop bit
    pub fn byte_time(&self) -> Duration {
        if self.baud_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(10.0 / self.baud_rate as f64)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            sender_endpoint: "COM30".to_string(),
            receiver_endpoint: "COM31".to_string(),
            baud_rate: 9600,
            per_attempt_timeout: Duration::from_millis(200),
            inter_packet_delay: Duration::from_millis(150),
            overall_session_timeout: Duration::from_secs(30),
            success_target: 100,
            max_attempts: 150,
            sender_stagger: Duration::from_secs(1),
            attempt_pause: Duration::from_millis(10),
            line: LineConditions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_time() {
        let config = LinkConfig {
            baud_rate: 10_000,
            ..Default::default()
        };
        assert_eq!(config.byte_time(), Duration::from_millis(1));

        let unpaced = LinkConfig {
            baud_rate: 0,
            ..Default::default()
        };
        assert_eq!(unpaced.byte_time(), Duration::ZERO);
    }

    #[test]
    fn test_lossless_conditions() {
        assert!(LineConditions::lossless().is_lossless());
        assert!(!LineConditions::default().is_lossless());
    }
}
