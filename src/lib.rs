/*!
# atrmanager

A Rust library for Atari 8-bit floppy disks: ATR disk images, the Atari
DOS 2.x filesystem and an SIO drive emulator that serves mounted images to
a real machine over a serial adapter.

## Features

- Load and save ATR images in single, enhanced and double density
- Read, add, delete, rename and lock files on DOS 2.0 / 2.5 disks
- Frame decoding and checksums for the SIO serial link
- Eight drive slots answering status, read, write and format commands

## Quick Start

```rust,no_run
use atrmanager::{share, DeviceConfig, DiskImage, Dos2FileSystem, DriveTable, FileSystem};
use atrmanager::{SioDevice, TtyTransport};

// Open an existing ATR file
let image = DiskImage::open("disk.atr")?;

// List the DOS 2 directory
let fs = Dos2FileSystem::from_image(&image);
for entry in fs.read_dir()? {
    println!("{}: {} sectors", entry.name, entry.sectors);
}

// Mount it in D1 and serve it over a serial adapter
let drives = DriveTable::new();
drives.mount(share(image), 0)?;

let config = DeviceConfig::new();
let mut device = SioDevice::new(TtyTransport::new(config.bitrate), drives, config);
let inbound = device.open("/dev/cu.usbmodem1401")?;
# drop(inbound);
# Ok::<(), atrmanager::AtrError>(())
```

## Modules

- `format`: ATR constants and disk geometries
- `image`: Disk image and sector data structures
- `io`: ATR file reading and writing
- `filesystem`: Atari DOS 2.x filesystem
- `sio`: SIO protocol engine and drive emulation
- `map`: Sector map visualization
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Error types and Result alias
pub mod error;
/// Filesystem implementations (Atari DOS 2.x)
pub mod filesystem;
/// ATR format constants and disk geometries
pub mod format;
/// Core image data structures (DiskImage, Sector)
pub mod image;
/// I/O operations for reading and writing ATR files
pub mod io;
/// Sector map visualization
pub mod map;
/// SIO serial protocol and drive emulation
pub mod sio;

// Re-export common types
pub use error::{AtrError, Result};
pub use filesystem::{
    is_dos2, DirEntry, Dos2FileSystem, Dos2FileSystemMut, FileAttributes, FileSystem,
    FileSystemInfo,
};
pub use format::DiskGeometry;
pub use image::{DiskImage, Sector, SectorStatus};
pub use map::draw_free_map;
pub use sio::{
    checksum, encode_frame, find_device, lock_disk, share, Command, CommandCode, DeviceConfig,
    DeviceEvent, Dispatcher, DriveStatus, DriveTable, FrameDecoder, MemoryTransport,
    ProtocolVariant, Reply, ReplyCode, ReplyPlan, ReplyStep, ReplyTiming, SerialTransport,
    SharedDisk, SioDevice, TtyTransport, DRIVE_COUNT,
};
