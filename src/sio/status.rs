/// Drive status word and configuration block
///
/// The first status byte mirrors the flags a 1050 drive reports; the
/// remaining bytes carry the controller status, the format timeout and a
/// reserved byte.

use crate::format::DiskGeometry;
use crate::image::DiskImage;
use std::fmt;

/// Seconds the host should allow for a format
pub const FORMAT_TIMEOUT: u8 = 5;

/// Drive status byte (first byte of the status word)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveStatus(pub u8);

impl DriveStatus {
    /// Enhanced density (1050) - Bit 7
    pub const ENHANCED: u8 = 0x80;

    /// Double density - Bit 5
    pub const DOUBLE: u8 = 0x20;

    /// Motor on / active - Bit 4
    pub const ACTIVE: u8 = 0x10;

    /// Write protected - Bit 3
    pub const WRITE_PROTECT: u8 = 0x08;

    /// Status of a drive holding this disk
    pub fn for_disk(image: &DiskImage) -> Self {
        let mut status = Self::ACTIVE;
        if image.is_locked() {
            status |= Self::WRITE_PROTECT;
        }
        if image.sector_size() > 128 {
            status |= Self::DOUBLE;
        } else if image.geometry().has_vtoc2() {
            status |= Self::ENHANCED;
        }
        DriveStatus(status)
    }

    /// Check if the enhanced density bit is set
    #[inline]
    pub fn enhanced(&self) -> bool {
        (self.0 & Self::ENHANCED) != 0
    }

    /// Check if the double density bit is set
    #[inline]
    pub fn double(&self) -> bool {
        (self.0 & Self::DOUBLE) != 0
    }

    /// Check if the active bit is set
    #[inline]
    pub fn active(&self) -> bool {
        (self.0 & Self::ACTIVE) != 0
    }

    /// Check if the write protect bit is set
    #[inline]
    pub fn write_protected(&self) -> bool {
        (self.0 & Self::WRITE_PROTECT) != 0
    }

    /// Full 4-byte status word
    pub fn to_bytes(self) -> [u8; 4] {
        [self.0, 0x00, FORMAT_TIMEOUT, 0x00]
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "EMPTY");
        }

        let mut flags = Vec::new();
        if self.enhanced() {
            flags.push("ED");
        }
        if self.double() {
            flags.push("DD");
        }
        if self.active() {
            flags.push("ACTIVE");
        }
        if self.write_protected() {
            flags.push("WP");
        }
        write!(f, "{}", flags.join("|"))
    }
}

/// 12-byte percom-style configuration block
pub fn configuration_block(geometry: DiskGeometry) -> [u8; 12] {
    let sectors_per_track: u16 = if geometry.has_vtoc2() { 26 } else { 18 };
    let density = if geometry.has_vtoc2() || geometry.sector_size > 128 { 4 } else { 0 };
    let [spt_hi, spt_lo] = sectors_per_track.to_be_bytes();
    let [size_hi, size_lo] = (geometry.sector_size as u16).to_be_bytes();

    [
        40, // tracks
        0,  // step rate
        spt_hi,
        spt_lo,
        0, // sides minus one
        density,
        size_hi,
        size_lo,
        0xFF, // drive present
        0,
        0,
        0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_density_status() {
        let image = DiskImage::new();
        let status = DriveStatus::for_disk(&image);
        assert_eq!(status.0, 0x10);
        assert!(status.active());
        assert!(!status.write_protected());
        assert_eq!(status.to_bytes(), [0x10, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn test_locked_enhanced_status() {
        let mut image = DiskImage::with_geometry(DiskGeometry::enhanced_density());
        image.set_locked(true);
        let status = DriveStatus::for_disk(&image);
        assert_eq!(status.0, 0x98);
        assert_eq!(status.to_string(), "ED|ACTIVE|WP");
    }

    #[test]
    fn test_double_density_status() {
        let image = DiskImage::with_geometry(DiskGeometry::double_density());
        assert_eq!(DriveStatus::for_disk(&image).0, 0x30);
        assert_eq!(DriveStatus(0).to_string(), "EMPTY");
    }

    #[test]
    fn test_configuration_block() {
        assert_eq!(
            configuration_block(DiskGeometry::single_density()),
            [40, 0, 0, 18, 0, 0, 0, 128, 0xFF, 0, 0, 0]
        );
        assert_eq!(
            configuration_block(DiskGeometry::enhanced_density()),
            [40, 0, 0, 26, 0, 4, 0, 128, 0xFF, 0, 0, 0]
        );
        assert_eq!(
            configuration_block(DiskGeometry::double_density())[5..8],
            [4, 1, 0]
        );
    }
}
