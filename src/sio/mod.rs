/// SIO serial protocol: framing, commands and the drive bank

/// Fold-carry frame checksum
pub mod checksum;
/// Command frame decoding
pub mod command;
/// Device settings
pub mod config;
/// Serial device service object
pub mod device;
/// Command execution against mounted disks
pub mod dispatcher;
/// Drive slot table and change notifications
pub mod drives;
/// Inbound frame assembly and outbound framing
pub mod frame;
/// Reply codes, wire variants and timed reply plans
pub mod reply;
/// Drive status word and configuration block
pub mod status;
/// Serial transport abstraction
pub mod transport;

pub use checksum::checksum;
pub use command::{Command, CommandCode};
pub use config::DeviceConfig;
pub use device::SioDevice;
pub use dispatcher::Dispatcher;
pub use drives::{lock_disk, share, DeviceEvent, DriveTable, SharedDisk, DRIVE_COUNT};
pub use frame::{encode_frame, FrameDecoder};
pub use reply::{ProtocolVariant, Reply, ReplyCode, ReplyPlan, ReplyStep, ReplyTiming};
pub use status::DriveStatus;
pub use transport::{find_device, MemoryTransport, SerialTransport, TtyTransport};
