/// ATR format constants and disk geometries

/// Format constants
pub mod constants;
/// Disk geometry presets
pub mod geometry;

pub use constants::*;
pub use geometry::DiskGeometry;

/// Parse a 16-bit little-endian value at an offset
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Store a 16-bit little-endian value at an offset
#[inline]
pub fn write_u16_le(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
