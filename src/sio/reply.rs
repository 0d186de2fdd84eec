/// Device to host replies and their wire encodings

use crate::error::Result;
use crate::sio::checksum::checksum;
use crate::sio::frame::encode_frame;
use std::fmt;
use std::time::Duration;

/// Single byte reply codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// 'A': command accepted
    Acknowledge = 0x41,
    /// 'C': operation complete
    Complete = 0x43,
    /// 'E': operation failed
    Error = 0x45,
    /// 'N': command not accepted
    Negative = 0x4E,
}

impl ReplyCode {
    /// Wire value
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.byte() as char)
    }
}

/// A reply to send to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bare status code
    Code(ReplyCode),
    /// Data block
    Data(Vec<u8>),
}

/// Wire convention for replies
///
/// The two variants are not compatible; one is chosen per device and
/// kept for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Data goes out as `[length][data...][checksum]`
    #[default]
    LengthPrefixed,
    /// Data goes out as `['C'][data...][checksum]`
    StatusByte,
}

impl ProtocolVariant {
    /// Encode a reply for the wire
    ///
    /// Status codes are always a single unframed byte.
    pub fn encode(self, reply: &Reply) -> Result<Vec<u8>> {
        match (self, reply) {
            (_, Reply::Code(code)) => Ok(vec![code.byte()]),
            (ProtocolVariant::LengthPrefixed, Reply::Data(data)) => encode_frame(data),
            (ProtocolVariant::StatusByte, Reply::Data(data)) => {
                let mut out = Vec::with_capacity(data.len() + 2);
                out.push(ReplyCode::Complete.byte());
                out.extend_from_slice(data);
                out.push(checksum(data));
                Ok(out)
            }
        }
    }

    /// Parse a variant name from the console
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "length" | "length-prefixed" | "framed" => Some(ProtocolVariant::LengthPrefixed),
            "status" | "status-byte" => Some(ProtocolVariant::StatusByte),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::LengthPrefixed => write!(f, "length-prefixed"),
            ProtocolVariant::StatusByte => write!(f, "status-byte"),
        }
    }
}

/// Minimum delays for two-phase replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTiming {
    /// Delay before the acknowledge
    pub acknowledge_delay: Duration,
    /// Delay between acknowledge and complete
    pub complete_delay: Duration,
}

impl ReplyTiming {
    /// No delays at all, for scripted sessions
    pub fn immediate() -> Self {
        Self {
            acknowledge_delay: Duration::ZERO,
            complete_delay: Duration::ZERO,
        }
    }
}

impl Default for ReplyTiming {
    fn default() -> Self {
        Self {
            acknowledge_delay: Duration::ZERO,
            complete_delay: Duration::from_micros(250),
        }
    }
}

/// One reply sent after a delay measured from the previous step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyStep {
    /// Wait before sending
    pub delay: Duration,
    /// What to send
    pub reply: Reply,
}

/// Ordered replies to a single command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyPlan {
    steps: Vec<ReplyStep>,
}

impl ReplyPlan {
    /// Send nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Send one status code straight away
    pub fn code(code: ReplyCode) -> Self {
        Self::default().then(Duration::ZERO, Reply::Code(code))
    }

    /// Send a data block straight away
    pub fn data(data: Vec<u8>) -> Self {
        Self::default().then(Duration::ZERO, Reply::Data(data))
    }

    /// Acknowledge, then complete after the configured delays
    pub fn acknowledge_then_complete(timing: ReplyTiming) -> Self {
        Self::default()
            .then(timing.acknowledge_delay, Reply::Code(ReplyCode::Acknowledge))
            .then(timing.complete_delay, Reply::Code(ReplyCode::Complete))
    }

    /// Append a step
    pub fn then(mut self, delay: Duration, reply: Reply) -> Self {
        self.steps.push(ReplyStep { delay, reply });
        self
    }

    /// Steps in send order
    pub fn steps(&self) -> &[ReplyStep] {
        &self.steps
    }

    /// Check for an empty plan
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Consume the plan
    pub fn into_steps(self) -> Vec<ReplyStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ReplyCode::Acknowledge.byte(), b'A');
        assert_eq!(ReplyCode::Complete.byte(), b'C');
        assert_eq!(ReplyCode::Error.byte(), b'E');
        assert_eq!(ReplyCode::Negative.byte(), b'N');
        assert_eq!(ReplyCode::Error.to_string(), "E");
    }

    #[test]
    fn test_length_prefixed_encoding() {
        let variant = ProtocolVariant::LengthPrefixed;
        assert_eq!(variant.encode(&Reply::Code(ReplyCode::Complete)).unwrap(), vec![0x43]);
        assert_eq!(
            variant.encode(&Reply::Data(vec![0x10, 0x00, 0x05, 0x00])).unwrap(),
            vec![4, 0x10, 0x00, 0x05, 0x00, 0x15]
        );
    }

    #[test]
    fn test_status_byte_encoding() {
        let variant = ProtocolVariant::StatusByte;
        assert_eq!(variant.encode(&Reply::Code(ReplyCode::Acknowledge)).unwrap(), vec![0x41]);
        assert_eq!(
            variant.encode(&Reply::Data(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3, 6]
        );
    }

    #[test]
    fn test_two_phase_plan() {
        let plan = ReplyPlan::acknowledge_then_complete(ReplyTiming::default());
        let steps = plan.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].reply, Reply::Code(ReplyCode::Acknowledge));
        assert_eq!(steps[0].delay, Duration::ZERO);
        assert_eq!(steps[1].reply, Reply::Code(ReplyCode::Complete));
        assert_eq!(steps[1].delay, Duration::from_micros(250));
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(ProtocolVariant::from_name("status"), Some(ProtocolVariant::StatusByte));
        assert_eq!(ProtocolVariant::from_name("Framed"), Some(ProtocolVariant::LengthPrefixed));
        assert_eq!(ProtocolVariant::from_name("xyz"), None);
        assert_eq!(ProtocolVariant::default().to_string(), "length-prefixed");
    }
}
