/// Length-prefixed frame assembly
///
/// Inbound frames are `[length][payload...][checksum]`. The decoder is a
/// two-state machine: awaiting a length byte, or accumulating the
/// `length + 1` bytes that follow. A gap longer than the idle timeout
/// between chunks throws away any partial frame.

use crate::error::{AtrError, Result};
use crate::sio::checksum::checksum;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Default gap after which a partial frame is abandoned
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest payload a length byte can describe
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Inbound frame state machine
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    remaining: usize,
    idle_timeout: Duration,
    last_received: Option<Instant>,
}

impl FrameDecoder {
    /// Create a decoder with the given idle timeout
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_PAYLOAD + 1),
            remaining: 0,
            idle_timeout,
            last_received: None,
        }
    }

    /// Check whether the decoder is waiting for a length byte
    pub fn is_awaiting_length(&self) -> bool {
        self.remaining == 0
    }

    /// Bytes still expected for the current frame, checksum included
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.remaining = 0;
    }

    /// Feed a chunk of received bytes
    ///
    /// Returns one item per frame completed by this chunk: the payload if
    /// its checksum matched, otherwise a `ChecksumMismatch`.
    pub fn receive(&mut self, data: &[u8], now: Instant) -> Vec<Result<Vec<u8>>> {
        if let Some(previous) = self.last_received {
            if now.saturating_duration_since(previous) > self.idle_timeout {
                if !self.is_awaiting_length() {
                    warn!("Serial timed out, discarding {} bytes", self.buffer.len());
                }
                self.reset();
            }
        }
        self.last_received = Some(now);

        data.iter()
            .filter_map(|&byte| self.receive_byte(byte))
            .collect()
    }

    fn receive_byte(&mut self, byte: u8) -> Option<Result<Vec<u8>>> {
        if self.remaining == 0 {
            self.buffer.clear();
            self.remaining = byte as usize + 1;
            return None;
        }

        self.buffer.push(byte);
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }

        let (payload, received) = self.buffer.split_at(self.buffer.len() - 1);
        let expected = checksum(payload);
        let result = if expected == received[0] {
            Ok(payload.to_vec())
        } else {
            warn!("Invalid checksum");
            debug!("{}", hex_dump(&self.buffer));
            Err(AtrError::ChecksumMismatch {
                expected,
                actual: received[0],
            })
        };
        self.buffer.clear();
        Some(result)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

/// Wrap a payload as `[length][payload...][checksum]`
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(AtrError::FrameTooLong(payload.len()));
    }

    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    Ok(frame)
}

/// Space separated hex bytes, e.g. "53 31 00 00"
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
