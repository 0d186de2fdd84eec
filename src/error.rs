use thiserror::Error;

/// Result type alias for ATR operations
pub type Result<T> = std::result::Result<T, AtrError>;

/// Errors that can occur when working with ATR images, DOS 2 filesystems and the SIO link
#[derive(Debug, Error)]
pub enum AtrError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Image header or size is invalid; the load is rejected
    #[error("Corrupt image: {0}")]
    CorruptImage(String),

    /// Frame checksum did not match its payload
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the payload
        expected: u8,
        /// Checksum byte received on the wire
        actual: u8,
    },

    /// Image is too large for the 16-bit paragraph count in the header
    #[error("Image too large: {0} bytes")]
    ImageTooLarge(usize),

    /// Drive selector outside D1..D8, or no disk in that drive
    #[error("Invalid drive: 0x{0:02X}")]
    InvalidDrive(u8),

    /// Sector number is 0 or beyond the end of the image
    #[error("Invalid sector: {0}")]
    InvalidSector(usize),

    /// Replacement data does not match the sector's size
    #[error("Sector {sector} is {expected} bytes, got {actual}")]
    SectorSizeMismatch {
        /// Sector number
        sector: usize,
        /// Size of the sector on the image
        expected: usize,
        /// Size of the data supplied
        actual: usize,
    },

    /// Read offset does not fall on a chunk inside the sector
    #[error("Invalid offset {offset} in sector {sector}")]
    InvalidOffset {
        /// Sector number
        sector: usize,
        /// Requested byte offset
        offset: u8,
    },

    /// Disk image is write-protected
    #[error("Disk is locked")]
    DiskLocked,

    /// Image does not carry a DOS 2.x VTOC
    #[error("Not a DOS 2.x disk")]
    NotDos2,

    /// All 64 directory slots are in use
    #[error("Directory full")]
    DirectoryFull,

    /// Not enough free sectors for the file contents
    #[error("Insufficient space: {needed} bytes needed, {available} available")]
    InsufficientSpace {
        /// Bytes required
        needed: usize,
        /// Bytes available on the disk
        available: usize,
    },

    /// A sector in a file chain is tagged with a different file number
    #[error("File number mismatch in sector {sector}: expected {expected}, found {found}")]
    FileNumberMismatch {
        /// Sector holding the bad tag
        sector: usize,
        /// File number of the directory entry
        expected: usize,
        /// File number found in the sector tail
        found: usize,
    },

    /// File not found in filesystem
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Directory entry is locked or not a plain in-use entry
    #[error("File is locked or invalid: {0}")]
    FileLocked(usize),

    /// Invalid filename
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// Command frame is too short for its command code
    #[error("Frame for command 0x{command:02X} too short: {len} bytes")]
    ShortFrame {
        /// Command code
        command: u8,
        /// Frame length received
        len: usize,
    },

    /// Command code not handled by the drive
    #[error("Unknown command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Outbound payload does not fit a length-prefixed frame
    #[error("Frame too long: {0} bytes")]
    FrameTooLong(usize),

    /// Serial transport is not open
    #[error("Transport closed")]
    TransportClosed,
}

impl AtrError {
    /// Create a corrupt image error
    pub fn corrupt<S: Into<String>>(message: S) -> Self {
        AtrError::CorruptImage(message.into())
    }

    /// Create an invalid filename error
    pub fn filename<S: Into<String>>(name: S) -> Self {
        AtrError::InvalidFilename(name.into())
    }
}
