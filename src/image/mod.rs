/// ATR image data structures

/// Sector definition and status
pub mod sector;

pub use sector::{Sector, SectorStatus};

use crate::error::{AtrError, Result};
use crate::format::DiskGeometry;
use log::warn;
use std::path::Path;

/// An Atari disk image: an ordered run of 1-indexed sectors
///
/// The first three sectors are always 128 bytes; the rest share
/// `sector_size`, fixed when the image is created or loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    /// Main sector size (128 or 256)
    pub(crate) sector_size: usize,
    /// Sectors in order; sector 1 is at index 0
    pub(crate) sectors: Vec<Sector>,
    /// Write-protect flag
    pub(crate) locked: bool,
    /// Has the image been modified?
    pub(crate) changed: bool,
    /// Original filename if loaded from disk
    pub(crate) filename: Option<String>,
}

impl DiskImage {
    /// Create an unformatted single density image (720 zeroed 128-byte sectors)
    pub fn new() -> Self {
        Self::with_geometry(DiskGeometry::single_density())
    }

    /// Create a zeroed image with the given geometry
    pub fn with_geometry(geometry: DiskGeometry) -> Self {
        let sectors = (1..=geometry.sector_count)
            .map(|number| Sector::new(geometry.size_of(number)))
            .collect();

        Self {
            sector_size: geometry.sector_size,
            sectors,
            locked: false,
            changed: false,
            filename: None,
        }
    }

    /// Build an image from already-sliced sectors
    pub(crate) fn from_sectors(sector_size: usize, sectors: Vec<Sector>) -> Self {
        Self {
            sector_size,
            sectors,
            locked: false,
            changed: false,
            filename: None,
        }
    }

    /// Open an ATR file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::io::read_atr(path)
    }

    /// Decode an image from the bytes of an ATR file
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        crate::io::decode(data)
    }

    /// Encode the image as the bytes of an ATR file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::io::encode(self)
    }

    /// Save the image to an ATR file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        crate::io::write_atr(self, &path)?;
        self.filename = Some(path.as_ref().display().to_string());
        self.changed = false;
        Ok(())
    }

    /// Get the original filename if loaded from disk
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Main sector size in bytes
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Number of sectors, boot sectors included
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Geometry of this image
    pub fn geometry(&self) -> DiskGeometry {
        DiskGeometry::new(self.sectors.len(), self.sector_size)
    }

    /// Get all sectors in order
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Check that a 1-based sector number is on the image
    pub fn is_valid_sector(&self, number: usize) -> bool {
        number != 0 && number <= self.sectors.len()
    }

    /// Read a 1-based sector
    pub fn sector(&self, number: usize) -> Option<&[u8]> {
        if !self.is_valid_sector(number) {
            warn!("Invalid disk sector number {}", number);
            return None;
        }
        Some(self.sectors[number - 1].data())
    }

    /// Replace a 1-based sector
    ///
    /// An invalid number leaves the image untouched. The data must be
    /// exactly as long as the sector it replaces.
    pub fn write_sector(&mut self, number: usize, data: &[u8]) -> Result<()> {
        if !self.is_valid_sector(number) {
            warn!("Invalid disk sector number {}", number);
            return Err(AtrError::InvalidSector(number));
        }

        let sector = &mut self.sectors[number - 1];
        if sector.len() != data.len() {
            return Err(AtrError::SectorSizeMismatch {
                sector: number,
                expected: sector.len(),
                actual: data.len(),
            });
        }

        sector.set_data(data.to_vec());
        self.changed = true;
        Ok(())
    }

    /// Total bytes of sector data
    pub fn size(&self) -> usize {
        self.sectors.iter().map(|s| s.len()).sum()
    }

    /// Check if the image is write-protected
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Set or clear write protection
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Check if the image has been modified
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Mark the image as unchanged
    pub fn mark_unchanged(&mut self) {
        self.changed = false;
    }

    /// Reset every sector to zero with a new geometry
    pub(crate) fn reset(&mut self, geometry: DiskGeometry) {
        let filename = self.filename.take();
        let locked = self.locked;
        *self = Self::with_geometry(geometry);
        self.filename = filename;
        self.locked = locked;
        self.changed = true;
    }
}

impl Default for DiskImage {
    fn default() -> Self {
        Self::new()
    }
}
