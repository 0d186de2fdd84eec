/// Device configuration

use crate::sio::frame::DEFAULT_IDLE_TIMEOUT;
use crate::sio::reply::{ProtocolVariant, ReplyTiming};
use std::time::Duration;

/// Default serial bitrate
pub const DEFAULT_BITRATE: u32 = 19200;

/// Default device name prefix searched for under /dev
pub const DEFAULT_DEVICE_PREFIX: &str = "cu.usbmodem";

/// Settings for an SIO device, fixed for the life of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Reply wire convention
    pub variant: ProtocolVariant,
    /// Gap that abandons a partial frame
    pub idle_timeout: Duration,
    /// Two-phase reply delays
    pub timing: ReplyTiming,
    /// Serial bitrate
    pub bitrate: u32,
    /// Device name prefix for discovery
    pub device_prefix: String,
}

impl DeviceConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            variant: ProtocolVariant::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            timing: ReplyTiming::default(),
            bitrate: DEFAULT_BITRATE,
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
        }
    }

    /// Set the reply wire convention
    pub fn variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the two-phase reply delays
    pub fn timing(mut self, timing: ReplyTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Set the serial bitrate
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Set the device name prefix
    pub fn device_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.device_prefix = prefix.into();
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}
