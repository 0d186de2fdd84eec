/// Disk geometry presets

use crate::format::constants::*;

/// Number and size of sectors on a disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// Total number of sectors, boot sectors included
    pub sector_count: usize,
    /// Size of the main (non-boot) sectors in bytes
    pub sector_size: usize,
}

impl DiskGeometry {
    /// Create a new geometry
    pub fn new(sector_count: usize, sector_size: usize) -> Self {
        Self {
            sector_count,
            sector_size,
        }
    }

    /// 810 single density (720 sectors, 128 bytes)
    pub fn single_density() -> Self {
        Self::new(SINGLE_DENSITY_SECTORS, SINGLE_DENSITY_SECTOR_SIZE)
    }

    /// 1050 enhanced density (1040 sectors, 128 bytes)
    pub fn enhanced_density() -> Self {
        Self::new(ENHANCED_DENSITY_SECTORS, SINGLE_DENSITY_SECTOR_SIZE)
    }

    /// Double density (720 sectors, 256 bytes)
    pub fn double_density() -> Self {
        Self::new(SINGLE_DENSITY_SECTORS, 256)
    }

    /// Look up a preset by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "single" | "sd" => Some(Self::single_density()),
            "enhanced" | "ed" => Some(Self::enhanced_density()),
            "double" | "dd" => Some(Self::double_density()),
            _ => None,
        }
    }

    /// Does this geometry need the DOS 2.5 second VTOC?
    pub fn has_vtoc2(&self) -> bool {
        self.sector_count >= VTOC2_SECTOR
    }

    /// Size in bytes of a given 1-based sector
    pub fn size_of(&self, number: usize) -> usize {
        if number <= BOOT_SECTOR_COUNT {
            BOOT_SECTOR_SIZE
        } else {
            self.sector_size
        }
    }

    /// Total bytes of sector data
    pub fn total_size(&self) -> usize {
        let boot = self.sector_count.min(BOOT_SECTOR_COUNT);
        boot * BOOT_SECTOR_SIZE + (self.sector_count - boot) * self.sector_size
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match (self.sector_count, self.sector_size) {
            (SINGLE_DENSITY_SECTORS, SINGLE_DENSITY_SECTOR_SIZE) => "Single density",
            (ENHANCED_DENSITY_SECTORS, SINGLE_DENSITY_SECTOR_SIZE) => "Enhanced density",
            (SINGLE_DENSITY_SECTORS, 256) => "Double density",
            _ => "Custom",
        }
    }
}

impl Default for DiskGeometry {
    fn default() -> Self {
        Self::single_density()
    }
}
