/// File sector chains
///
/// The last three bytes of every file sector link it to the next one:
/// the file number sits in the upper 6 bits of the first byte, the next
/// sector number is split across the low 2 bits of that byte and all of
/// the second, and the final byte counts the data bytes in the sector.

use crate::format::SECTOR_TAIL_SIZE;

/// Decoded sector tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorTail {
    /// File number tag
    pub file_number: usize,
    /// Next sector in the chain, 0 at the end
    pub next: usize,
    /// Data bytes used in this sector
    pub length: usize,
}

impl SectorTail {
    /// Read the tail from a full sector
    pub fn parse(sector: &[u8]) -> Self {
        let end = sector.len();
        let link = sector[end - 3];
        Self {
            file_number: (link >> 2) as usize,
            next: ((link & 0x03) as usize) << 8 | sector[end - 2] as usize,
            length: sector[end - 1] as usize,
        }
    }

    /// Encode the tail as three bytes
    pub fn to_bytes(&self) -> [u8; SECTOR_TAIL_SIZE] {
        [
            ((self.file_number as u8) << 2) | ((self.next >> 8) as u8 & 0x03),
            (self.next & 0xFF) as u8,
            self.length as u8,
        ]
    }
}

/// Data bytes a sector of the given size can hold
pub fn capacity(sector_size: usize) -> usize {
    sector_size.saturating_sub(SECTOR_TAIL_SIZE)
}

/// Sectors needed to hold `len` bytes; an empty file still takes one
pub fn sectors_needed(len: usize, sector_size: usize) -> usize {
    len.div_ceil(capacity(sector_size)).max(1)
}

/// Lay out file contents over the given sectors
///
/// Sectors are used strictly in the order supplied. Returns one
/// `(sector number, sector data)` pair per sector used, or `None` if
/// there are too few sectors.
pub fn plan_chain(
    contents: &[u8],
    sectors: &[usize],
    file_number: usize,
    sector_size: usize,
) -> Option<Vec<(usize, Vec<u8>)>> {
    let needed = sectors_needed(contents.len(), sector_size);
    if sectors.len() < needed {
        return None;
    }

    let cap = capacity(sector_size);
    let chunks: Vec<&[u8]> = if contents.is_empty() {
        vec![contents]
    } else {
        contents.chunks(cap).collect()
    };

    let plan = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let next = if i + 1 < needed { sectors[i + 1] } else { 0 };
            let tail = SectorTail {
                file_number,
                next,
                length: chunk.len(),
            };

            let mut data = vec![0u8; sector_size];
            data[..chunk.len()].copy_from_slice(chunk);
            data[cap..].copy_from_slice(&tail.to_bytes());
            (sectors[i], data)
        })
        .collect();

    Some(plan)
}
