//! Core algorithms and data types for the serial link

pub mod crc;
pub mod frame;
pub mod types;

pub use crc::{crc8, Crc8};
pub use frame::{checksum_of, Frame, FrameError};
pub use types::*;
