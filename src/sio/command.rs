/// Command frame decoding
///
/// | byte | field |
/// |---|---|
/// | 0 | command code |
/// | 1 | device ID, 0x31 (D1) to 0x38 (D8) |
/// | 2-3 | sector number (LE) |
/// | 4 | byte offset, reads only |
/// | 4-131 | sector data, writes only |

use crate::error::{AtrError, Result};
use crate::format::{read_u16_le, DiskGeometry, SINGLE_DENSITY_SECTOR_SIZE};
use crate::sio::drives::DRIVE_COUNT;

/// Device ID of drive D1
pub const FIRST_DEVICE_ID: u8 = 0x31;

/// Size of a write frame: code, device, sector and one sector of data
pub const WRITE_FRAME_LEN: usize = 4 + SINGLE_DENSITY_SECTOR_SIZE;

/// Size of each read reply chunk
pub const READ_CHUNK_SIZE: usize = 32;

/// Read offset that asks only whether the sector exists
pub const OFFSET_QUERY: u8 = 0xFF;

/// SIO command codes handled by the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    /// Text from the serial adapter's firmware
    DebugInfo = 0x01,
    /// '!': format single density
    FormatSingle = 0x21,
    /// '"': format enhanced density
    FormatEnhanced = 0x22,
    /// 'N': read the 12-byte drive configuration
    ReadConfiguration = 0x4E,
    /// 'O': write the 12-byte drive configuration
    WriteConfiguration = 0x4F,
    /// 'P': put sector
    Put = 0x50,
    /// 'R': read sector
    Read = 0x52,
    /// 'S': drive status
    Status = 0x53,
    /// 'W': write sector with verify
    Write = 0x57,
}

impl TryFrom<u8> for CommandCode {
    type Error = AtrError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x01 => CommandCode::DebugInfo,
            0x21 => CommandCode::FormatSingle,
            0x22 => CommandCode::FormatEnhanced,
            0x4E => CommandCode::ReadConfiguration,
            0x4F => CommandCode::WriteConfiguration,
            0x50 => CommandCode::Put,
            0x52 => CommandCode::Read,
            0x53 => CommandCode::Status,
            0x57 => CommandCode::Write,
            other => return Err(AtrError::UnknownCommand(other)),
        })
    }
}

/// A decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the 4-byte status word
    Status {
        /// Drive index, 0 for D1
        drive: usize,
    },
    /// Send a 32-byte chunk of a sector, or ask whether it exists
    Read {
        /// Drive index
        drive: usize,
        /// Sector number
        sector: usize,
        /// Byte offset in the sector, or 0xFF to ask whether the sector exists
        offset: u8,
    },
    /// Replace a sector
    Write {
        /// Drive index
        drive: usize,
        /// Sector number
        sector: usize,
        /// New sector contents
        data: Vec<u8>,
        /// Sent as 'W' rather than 'P'
        verify: bool,
    },
    /// Lay down an empty filesystem
    Format {
        /// Drive index
        drive: usize,
        /// Requested density
        geometry: DiskGeometry,
    },
    /// Report the drive configuration block
    ReadConfiguration {
        /// Drive index
        drive: usize,
    },
    /// Accept a drive configuration block
    WriteConfiguration {
        /// Drive index
        drive: usize,
    },
    /// Firmware log text
    DebugInfo(String),
}

impl Command {
    /// Decode a checksum-verified frame payload
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let &code = frame.first().ok_or(AtrError::ShortFrame { command: 0, len: 0 })?;
        let code = CommandCode::try_from(code)?;

        let short = || AtrError::ShortFrame {
            command: code as u8,
            len: frame.len(),
        };
        let drive = || drive_index(*frame.get(1).ok_or_else(short)?);

        Ok(match code {
            CommandCode::DebugInfo => Command::DebugInfo(
                frame[1..]
                    .iter()
                    .map(|&b| if b.is_ascii() { b as char } else { '?' })
                    .collect(),
            ),
            CommandCode::Status => Command::Status { drive: drive()? },
            CommandCode::Read => {
                if frame.len() < 5 {
                    return Err(short());
                }
                Command::Read {
                    drive: drive()?,
                    sector: read_u16_le(frame, 2) as usize,
                    offset: frame[4],
                }
            }
            CommandCode::Write | CommandCode::Put => {
                if frame.len() < 4 {
                    return Err(short());
                }
                let sector = read_u16_le(frame, 2) as usize;
                if frame.len() != WRITE_FRAME_LEN {
                    return Err(AtrError::SectorSizeMismatch {
                        sector,
                        expected: SINGLE_DENSITY_SECTOR_SIZE,
                        actual: frame.len() - 4,
                    });
                }
                Command::Write {
                    drive: drive()?,
                    sector,
                    data: frame[4..].to_vec(),
                    verify: code == CommandCode::Write,
                }
            }
            CommandCode::FormatSingle => Command::Format {
                drive: drive()?,
                geometry: DiskGeometry::single_density(),
            },
            CommandCode::FormatEnhanced => Command::Format {
                drive: drive()?,
                geometry: DiskGeometry::enhanced_density(),
            },
            CommandCode::ReadConfiguration => Command::ReadConfiguration { drive: drive()? },
            CommandCode::WriteConfiguration => Command::WriteConfiguration { drive: drive()? },
        })
    }
}

/// Map a device ID (0x31..=0x38) to a drive index
pub fn drive_index(device_id: u8) -> Result<usize> {
    let drive = device_id.wrapping_sub(FIRST_DEVICE_ID) as usize;
    if drive < DRIVE_COUNT {
        Ok(drive)
    } else {
        Err(AtrError::InvalidDrive(device_id))
    }
}
