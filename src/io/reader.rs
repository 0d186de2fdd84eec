/// ATR file reader

use crate::error::{AtrError, Result};
use crate::format::*;
use crate::image::{DiskImage, Sector};
use log::info;
use std::path::Path;

/// Read an ATR file from disk
pub fn read_atr<P: AsRef<Path>>(path: P) -> Result<DiskImage> {
    let data = std::fs::read(&path)?;
    let mut image = decode(&data)?;
    image.filename = Some(path.as_ref().display().to_string());
    Ok(image)
}

/// Decode the bytes of an ATR file
///
/// Trailing bytes shorter than one main sector are dropped.
pub fn decode(data: &[u8]) -> Result<DiskImage> {
    if data.len() <= ATR_HEADER_SIZE {
        return Err(AtrError::corrupt("File is too small for an ATR header"));
    }

    let magic = read_u16_le(data, 0);
    if magic != ATR_MAGIC {
        return Err(AtrError::corrupt(format!("Bad magic word 0x{:04X}", magic)));
    }

    let paragraphs = read_u16_le(data, ATR_HEADER_SIZE_OFFSET) as usize;
    let disk_size = paragraphs * ATR_PARAGRAPH_SIZE;
    if disk_size + ATR_HEADER_SIZE > data.len() {
        return Err(AtrError::corrupt(format!(
            "Header declares {} bytes but only {} present",
            disk_size,
            data.len() - ATR_HEADER_SIZE
        )));
    }

    let sector_size = read_u16_le(data, ATR_HEADER_SECTOR_SIZE_OFFSET) as usize;
    if sector_size == 0 {
        return Err(AtrError::corrupt("Sector size is zero"));
    }

    let boot_end = ATR_HEADER_SIZE + BOOT_SECTOR_COUNT * BOOT_SECTOR_SIZE;
    if data.len() < boot_end {
        return Err(AtrError::corrupt("File is too small for the boot sectors"));
    }

    let mut sectors: Vec<Sector> = data[ATR_HEADER_SIZE..boot_end]
        .chunks_exact(BOOT_SECTOR_SIZE)
        .map(|chunk| Sector::with_data(chunk.to_vec()))
        .collect();

    sectors.extend(
        data[boot_end..]
            .chunks_exact(sector_size)
            .map(|chunk| Sector::with_data(chunk.to_vec())),
    );

    info!("Read {} sectors of {} bytes", sectors.len(), sector_size);

    Ok(DiskImage::from_sectors(sector_size, sectors))
}
