/// Filesystem implementations

/// Sector chain tail codec and allocation planning
pub mod chain;
/// Directory entry codec and filename conversion
pub mod directory;
/// Atari DOS 2.0 / 2.5 filesystem
pub mod dos2;
/// Volume table of contents (free sector bitmap)
pub mod vtoc;

pub use dos2::{is_dos2, Dos2FileSystem, Dos2FileSystemMut};

use crate::error::Result;

/// File attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// Locked flag (directory bit 5)
    pub locked: bool,
    /// File was left open for output by DOS
    pub open_for_output: bool,
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Filename (8.3 format, e.g., "AUTORUN.SYS")
    pub name: String,
    /// Positional index in the directory, also the tag in each sector tail
    pub file_number: usize,
    /// Raw flag byte
    pub flags: u8,
    /// Length in sectors
    pub sectors: u16,
    /// First sector of the file chain
    pub start: u16,
    /// File attributes
    pub attributes: FileAttributes,
}

/// Filesystem information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemInfo {
    /// Filesystem type name
    pub fs_type: String,
    /// DOS version code from the VTOC
    pub dos_code: u8,
    /// Usable sectors according to the VTOC
    pub total_sectors: usize,
    /// Free sectors according to the VTOC free counts
    pub free_sectors: usize,
    /// Sector size in bytes
    pub sector_size: usize,
    /// Bytes of file data that fit in the free sectors
    pub bytes_available: usize,
}

/// Read access to the files on a disk image
pub trait FileSystem {
    /// List directory entries
    fn read_dir(&self) -> Result<Vec<DirEntry>>;

    /// Read a file's contents by name
    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Get filesystem information
    fn info(&self) -> FileSystemInfo;
}
