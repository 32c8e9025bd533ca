//! Simulated null-modem port pair for testing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info, trace};
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};

use crate::{LineConditions, Link, LinkConfig, LinkError, PortOpener};

/// Bytes each direction can hold before a writer waits, like a UART FIFO
const LINE_BUFFER: usize = 4096;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub bytes_written: u64,
    pub bytes_reset: u64,
    pub bits_flipped: u64,
}

/// Two cross-wired endpoints, named after `sender_endpoint` and
/// `receiver_endpoint`. Each endpoint can be opened once.
pub struct VirtualPortPair {
    endpoints: [String; 2],
    ports: Mutex<HashMap<String, SimulatedPort>>,
    stats: Arc<Mutex<LineStats>>,
}

impl VirtualPortPair {
    pub fn new(config: &LinkConfig) -> Self {
        let (a_to_b, b_from_a) = mpsc::channel(LINE_BUFFER);
        let (b_to_a, a_from_b) = mpsc::channel(LINE_BUFFER);
        let stats = Arc::new(Mutex::new(LineStats::default()));
        let byte_time = if config.line.paced {
            config.byte_time()
        } else {
            Duration::ZERO
        };

        let a = SimulatedPort {
            name: config.sender_endpoint.clone(),
            tx: a_to_b,
            rx: a_from_b,
            line: config.line.clone(),
            byte_time,
            stats: stats.clone(),
        };
        let b = SimulatedPort {
            name: config.receiver_endpoint.clone(),
            tx: b_to_a,
            rx: b_from_a,
            line: config.line.clone(),
            byte_time,
            stats: stats.clone(),
        };

        info!(
            "Virtual port pair {} <-> {} ({} baud, line {:?})",
            a.name, b.name, config.baud_rate, config.line
        );

        let mut ports = HashMap::new();
        ports.insert(a.name.clone(), a);
        ports.insert(b.name.clone(), b);

        Self {
            endpoints: [
                config.sender_endpoint.clone(),
                config.receiver_endpoint.clone(),
            ],
            ports: Mutex::new(ports),
            stats,
        }
    }

    pub async fn line_stats(&self) -> LineStats {
        *self.stats.lock().await
    }
}

#[async_trait]
impl PortOpener for VirtualPortPair {
    type Port = SimulatedPort;

    async fn open(&self, endpoint: &str) -> Result<SimulatedPort, LinkError> {
        let mut ports = self.ports.lock().await;
        match ports.remove(endpoint) {
            Some(port) => {
                debug!("Opened virtual port {}", endpoint);
                Ok(port)
            }
            None if self.endpoints.iter().any(|e| e == endpoint) => {
                Err(LinkError::PortBusy(endpoint.to_string()))
            }
            None => Err(LinkError::PortNotFound(endpoint.to_string())),
        }
    }
}

/// One end of a [`VirtualPortPair`]
pub struct SimulatedPort {
    name: String,
    tx: mpsc::Sender<u8>,
    rx: mpsc::Receiver<u8>,
    line: LineConditions,
    byte_time: Duration,
    stats: Arc<Mutex<LineStats>>,
}

impl SimulatedPort {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn impair(&self, byte: u8) -> (u8, bool, bool) {
        if self.line.is_lossless() {
            return (byte, false, false);
        }
        let mut rng = rand::rng();
        let mut out = byte;
        let reset = rng.random::<f64>() < self.line.byte_reset_probability;
        if reset {
            out = 0x00;
        }
        let flipped = rng.random::<f64>() < self.line.bit_flip_probability;
        if flipped {
            out ^= 1 << rng.random_range(0..8u8);
        }
        (out, reset, flipped)
    }
}

#[async_trait]
impl Link for SimulatedPort {
    async fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        if !self.byte_time.is_zero() {
            sleep(self.byte_time).await;
        }

        let (wire_byte, reset, flipped) = self.impair(byte);
        {
            let mut stats = self.stats.lock().await;
            stats.bytes_written += 1;
            if reset {
                stats.bytes_reset += 1;
            }
            if flipped {
                stats.bits_flipped += 1;
            }
        }
        if wire_byte != byte {
            trace!("{}: line turned 0x{:02x} into 0x{:02x}", self.name, byte, wire_byte);
        }

        // nobody on the far end: the byte is lost, as on a real line
        if self.tx.send(wire_byte).await.is_err() {
            trace!("{}: peer closed, dropping byte", self.name);
        }
        Ok(())
    }

    async fn read_byte(&mut self, window: Duration) -> Result<Option<u8>, LinkError> {
        match timeout(window, self.rx.recv()).await {
            Ok(Some(byte)) => Ok(Some(byte)),
            Ok(None) => {
                // peer hung up; a dead line is indistinguishable from a quiet one
                sleep(window).await;
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }
}
