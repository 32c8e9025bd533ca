use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crc::Crc8;
use crate::types::{
    sample_in_range, Payload, END_BYTE, FRAME_OVERHEAD, MAX_PAYLOAD_LEN, START_BYTE,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame payload is empty")]
    EmptyPayload,

    #[error("Frame payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Sample {value} at index {index} is outside 0..=255")]
    ValueOutOfRange { index: usize, value: i64 },
}

/// A validated wire frame: `START | len | payload | crc | END`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    payload: Payload,
    checksum: u8,
}

impl Frame {
    pub fn new(payload: Payload) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        let checksum = checksum_of(payload.len() as u8, &payload);
        Ok(Self { payload, checksum })
    }

    /// Builds a frame from wider samples, rejecting anything that would need clamping
    pub fn from_samples<V>(samples: &[V]) -> Result<Self, FrameError>
    where
        V: Copy + Into<i64>,
    {
        let mut payload = Vec::with_capacity(samples.len());
        for (index, sample) in samples.iter().enumerate() {
            let value: i64 = (*sample).into();
            if !sample_in_range(value) {
                return Err(FrameError::ValueOutOfRange { index, value });
            }
            payload.push(value as u8);
        }
        Self::new(payload)
    }

    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.push(START_BYTE);
        bytes.push(self.length());
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.checksum);
        bytes.push(END_BYTE);
        bytes
    }
}

/// CRC over the length byte followed by the payload
pub fn checksum_of(length: u8, payload: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    crc.update_byte(length);
    crc.update(payload);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8;

    #[test]
    fn test_frame_wire_layout() {
        let frame = Frame::new(vec![10, 20, 30]).unwrap();
        let expected_crc = crc8(&[0x03, 0x0A, 0x14, 0x1E]);
        assert_eq!(
            frame.to_bytes(),
            vec![0xAA, 0x03, 0x0A, 0x14, 0x1E, expected_crc, 0x55]
        );
        assert_eq!(frame.wire_len(), 7);
        assert_eq!(frame.checksum(), expected_crc);
    }

    #[test]
    fn test_frame_length_limits() {
        assert_eq!(Frame::new(vec![]), Err(FrameError::EmptyPayload));
        assert!(Frame::new(vec![0; MAX_PAYLOAD_LEN]).is_ok());
        assert_eq!(
            Frame::new(vec![0; MAX_PAYLOAD_LEN + 1]),
            Err(FrameError::PayloadTooLong { len: 201, max: 200 })
        );
    }

    #[test]
    fn test_from_samples_rejects_out_of_range() {
        assert_eq!(
            Frame::from_samples(&[1i32, -5, 3]),
            Err(FrameError::ValueOutOfRange { index: 1, value: -5 })
        );
        assert_eq!(
            Frame::from_samples(&[300i32]),
            Err(FrameError::ValueOutOfRange { index: 0, value: 300 })
        );
        let frame = Frame::from_samples(&[0i32, 255]).unwrap();
        assert_eq!(frame.payload(), &[0, 255]);
    }
}
