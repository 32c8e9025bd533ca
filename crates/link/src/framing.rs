//! Frame encoding and the resynchronizing frame decoder
//!
//! ```text
//! +------+--------+-------------------+-------+------+
//! | 0xAA | len    | payload (len)     | crc8  | 0x55 |
//! +------+--------+-------------------+-------+------+
//! ```
//!
//! `len` is 1..=200 and the CRC covers `len ++ payload`.

use std::fmt;
use std::time::Duration;
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use serial_link_core::{
    checksum_of, clamp_sample, length_in_range, sample_in_range, Crc8, Frame, FrameError,
    Payload, END_BYTE, FRAME_OVERHEAD, MAX_PAYLOAD_LEN, START_BYTE,
};

use crate::{Link, LinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecodeStatus {
    Success,
    CrcMismatch,
    RangeError,
    Desync,
    Timeout,
}

impl fmt::Display for DecodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DecodeStatus::Success => "CRC Valid",
            DecodeStatus::CrcMismatch => "CRC Error",
            DecodeStatus::RangeError => "Range Error",
            DecodeStatus::Desync => "Desync",
            DecodeStatus::Timeout => "Timeout",
        };
        f.write_str(label)
    }
}

/// Result of one decode attempt. The payload is whatever was read before the
/// attempt ended; it is only trustworthy when `status` is `Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOutcome {
    pub payload: Payload,
    pub status: DecodeStatus,
}

impl DecodeOutcome {
    fn new(payload: Payload, status: DecodeStatus) -> Self {
        Self { payload, status }
    }

    fn desync() -> Self {
        Self::new(Vec::new(), DecodeStatus::Desync)
    }

    pub fn is_success(&self) -> bool {
        self.status == DecodeStatus::Success
    }
}

pub struct FrameEncoder;

impl FrameEncoder {
    /// Encodes samples into a wire frame, clamping each one into 0..=255.
    ///
    /// The length byte is the payload length truncated to 8 bits; nothing here
    /// rejects payloads the decoder will refuse. Use [`FrameEncoder::try_encode`]
    /// for strict validation.
    pub fn encode<V>(samples: &[V]) -> Bytes
    where
        V: Copy + Into<i64>,
    {
        if samples.is_empty() || samples.len() > MAX_PAYLOAD_LEN {
            warn!(
                "Encoding {} samples, receivers only accept 1..={}",
                samples.len(),
                MAX_PAYLOAD_LEN
            );
        }

        let length = samples.len() as u8;
        let mut crc = Crc8::new();
        crc.update_byte(length);

        let mut buf = BytesMut::with_capacity(samples.len() + FRAME_OVERHEAD);
        buf.put_u8(START_BYTE);
        buf.put_u8(length);
        for sample in samples {
            let byte = clamp_sample((*sample).into());
            crc.update_byte(byte);
            buf.put_u8(byte);
        }
        buf.put_u8(crc.finish());
        buf.put_u8(END_BYTE);
        buf.freeze()
    }

    /// Encodes samples, refusing empty or oversized payloads and out of range samples
    pub fn try_encode<V>(samples: &[V]) -> Result<Bytes, FrameError>
    where
        V: Copy + Into<i64>,
    {
        let frame = Frame::from_samples(samples)?;
        Ok(Bytes::from(frame.to_bytes()))
    }

    /// Encodes and writes a frame one byte per write. Returns the bytes written.
    pub async fn send<L, V>(link: &mut L, samples: &[V]) -> Result<usize, LinkError>
    where
        L: Link + ?Sized,
        V: Copy + Into<i64>,
    {
        let frame = Self::encode(samples);
        trace!("Sending frame {}", hex::encode(&frame));
        for &byte in frame.iter() {
            link.write_byte(byte).await?;
        }
        Ok(frame.len())
    }
}

enum DecodeState {
    SeekStart,
    ReadLength,
    ReadPayload { length: u8, payload: Payload },
    ReadChecksum { length: u8, payload: Payload },
    ReadEnd { length: u8, payload: Payload, received_crc: u8 },
}

/// Pulls one frame at a time off a link, discarding noise until a start marker
pub struct FrameDecoder {
    timeout: Duration,
    bytes_skipped: u64,
}

impl FrameDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            bytes_skipped: 0,
        }
    }

    /// Bytes discarded while hunting for a start marker, over all attempts
    pub fn bytes_skipped(&self) -> u64 {
        self.bytes_skipped
    }

    /// Runs the state machine until one terminal outcome. Only transport
    /// failures come back as `Err`; timeouts and malformed frames are outcomes.
    pub async fn decode<L>(&mut self, link: &mut L) -> Result<DecodeOutcome, LinkError>
    where
        L: Link + ?Sized,
    {
        let mut state = DecodeState::SeekStart;
        loop {
            state = match state {
                DecodeState::SeekStart => match link.read_byte(self.timeout).await? {
                    None => return Ok(DecodeOutcome::new(Vec::new(), DecodeStatus::Timeout)),
                    Some(START_BYTE) => DecodeState::ReadLength,
                    Some(noise) => {
                        self.bytes_skipped += 1;
                        trace!("Skipping 0x{:02x} while seeking start marker", noise);
                        DecodeState::SeekStart
                    }
                },
                DecodeState::ReadLength => match link.read_byte(self.timeout).await? {
                    None => return Ok(DecodeOutcome::new(Vec::new(), DecodeStatus::Timeout)),
                    Some(length) if !length_in_range(length) => {
                        debug!("Rejecting frame with length {}", length);
                        return Ok(DecodeOutcome::desync());
                    }
                    Some(length) => DecodeState::ReadPayload {
                        length,
                        payload: Vec::with_capacity(length as usize),
                    },
                },
                DecodeState::ReadPayload { length, mut payload } => {
                    if payload.len() == length as usize {
                        DecodeState::ReadChecksum { length, payload }
                    } else {
                        match link.read_byte(self.timeout).await? {
                            None => {
                                debug!(
                                    "Timed out after {} of {} payload bytes",
                                    payload.len(),
                                    length
                                );
                                return Ok(DecodeOutcome::new(payload, DecodeStatus::Timeout));
                            }
                            Some(byte) => {
                                payload.push(byte);
                                DecodeState::ReadPayload { length, payload }
                            }
                        }
                    }
                }
                DecodeState::ReadChecksum { length, payload } => {
                    match link.read_byte(self.timeout).await? {
                        None => return Ok(DecodeOutcome::new(payload, DecodeStatus::Timeout)),
                        Some(received_crc) => DecodeState::ReadEnd {
                            length,
                            payload,
                            received_crc,
                        },
                    }
                }
                DecodeState::ReadEnd {
                    length,
                    payload,
                    received_crc,
                } => {
                    return match link.read_byte(self.timeout).await? {
                        Some(END_BYTE) => Ok(Self::validate(length, payload, received_crc)),
                        Some(other) => {
                            debug!("Expected end marker, got 0x{:02x}", other);
                            Ok(DecodeOutcome::desync())
                        }
                        None => {
                            debug!("Timed out waiting for end marker");
                            Ok(DecodeOutcome::desync())
                        }
                    };
                }
            };
        }
    }

    fn validate(length: u8, payload: Payload, received_crc: u8) -> DecodeOutcome {
        let expected = checksum_of(length, &payload);
        if expected != received_crc {
            debug!(
                "CRC mismatch: expected 0x{:02x}, received 0x{:02x}",
                expected, received_crc
            );
            return DecodeOutcome::new(payload, DecodeStatus::CrcMismatch);
        }

        // byte reads cannot produce these today; kept in case samples widen
        if let Some(bad) = payload.iter().find(|&&b| !sample_in_range(i64::from(b))) {
            debug!("Sample {} outside the accepted range", bad);
            return DecodeOutcome::new(payload, DecodeStatus::RangeError);
        }

        DecodeOutcome::new(payload, DecodeStatus::Success)
    }
}
