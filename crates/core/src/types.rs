pub type Payload = Vec<u8>;

/// Marks the beginning of a frame
pub const START_BYTE: u8 = 0xAA;
/// Marks the end of a frame
pub const END_BYTE: u8 = 0x55;
/// Reserved acknowledgment marker. No control flow emits it.
pub const ACK_BYTE: u8 = 0x06;
/// Reserved negative acknowledgment marker. No control flow emits it.
pub const NACK_BYTE: u8 = 0x15;

pub const MIN_PAYLOAD_LEN: usize = 1;
pub const MAX_PAYLOAD_LEN: usize = 200;

pub const MIN_SAMPLE: i64 = 0;
pub const MAX_SAMPLE: i64 = 255;

/// start + length + checksum + end
pub const FRAME_OVERHEAD: usize = 4;

/// Clamps a sample into the byte range. Out of range values saturate.
pub fn clamp_sample(value: i64) -> u8 {
    value.clamp(MIN_SAMPLE, MAX_SAMPLE) as u8
}

pub fn sample_in_range(value: i64) -> bool {
    (MIN_SAMPLE..=MAX_SAMPLE).contains(&value)
}

/// Whether a received length byte can describe a frame
pub fn length_in_range(length: u8) -> bool {
    (MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&(length as usize))
}
