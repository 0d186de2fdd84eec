/// ATR file writer

use crate::error::{AtrError, Result};
use crate::format::*;
use crate::image::DiskImage;
use std::path::Path;

/// Write an ATR file to disk
pub fn write_atr<P: AsRef<Path>>(image: &DiskImage, path: P) -> Result<()> {
    std::fs::write(path, encode(image)?)?;
    Ok(())
}

/// Encode an image as the bytes of an ATR file
///
/// The size and sector size header fields are recomputed from the image;
/// the remaining header bytes are zero. Images whose size does not fit the
/// 16-bit paragraph count are rejected rather than written with a wrong
/// header.
pub fn encode(image: &DiskImage) -> Result<Vec<u8>> {
    let size = image.size();
    let paragraphs = u16::try_from(size / ATR_PARAGRAPH_SIZE)
        .map_err(|_| AtrError::ImageTooLarge(size))?;
    let mut data = Vec::with_capacity(ATR_HEADER_SIZE + size);

    let mut header = [0u8; ATR_HEADER_SIZE];
    write_u16_le(&mut header, 0, ATR_MAGIC);
    write_u16_le(&mut header, ATR_HEADER_SIZE_OFFSET, paragraphs);
    write_u16_le(
        &mut header,
        ATR_HEADER_SECTOR_SIZE_OFFSET,
        image.sector_size() as u16,
    );
    data.extend_from_slice(&header);

    for sector in image.sectors() {
        data.extend_from_slice(sector.data());
    }

    Ok(data)
}
