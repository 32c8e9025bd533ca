//! In-memory loopback link

use std::collections::VecDeque;
use std::time::Duration;
use async_trait::async_trait;

use crate::{Link, LinkError};

/// Lossless loopback: every written byte becomes readable in order. Reading an
/// empty buffer times out immediately instead of waiting out the window.
#[derive(Debug, Default, Clone)]
pub struct MemoryLink {
    buffer: VecDeque<u8>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link with `bytes` already waiting on the line
    pub fn with_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            buffer: bytes.as_ref().iter().copied().collect(),
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied());
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }
}

#[async_trait]
impl Link for MemoryLink {
    async fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        self.buffer.push_back(byte);
        Ok(())
    }

    async fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, LinkError> {
        Ok(self.buffer.pop_front())
    }
}
