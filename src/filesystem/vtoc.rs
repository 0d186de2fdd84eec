/// Volume table of contents
///
/// Sector 360 holds the DOS code, the free count and a bitmap for sectors
/// 0..=719 (bit set = free, most significant bit first). Enhanced density
/// disks under DOS 2.5 add sector 1024, whose bitmap mirrors sectors
/// 48..=1023 and whose free count covers sectors 720..=1023.
///
/// Everything here works on sector snapshots and returns new sector
/// contents; nothing touches a disk image directly.

use crate::format::*;
use std::collections::BTreeSet;

/// Set of free sector numbers read from the bitmaps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeMap {
    free: BTreeSet<usize>,
}

/// New VTOC sector contents produced from a free map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtocUpdate {
    /// Replacement for sector 360
    pub vtoc: Vec<u8>,
    /// Replacement for sector 1024, when the disk has one
    pub vtoc2: Option<Vec<u8>>,
}

impl FreeMap {
    /// Read the free bitmaps
    pub fn from_vtoc(vtoc: &[u8], vtoc2: Option<&[u8]>) -> Self {
        let mut free = BTreeSet::new();

        for index in 0..VTOC_BITMAP_LEN {
            collect_bits(vtoc[VTOC_BITMAP_OFFSET + index], index * 8, &mut free);
        }

        if let Some(vtoc2) = vtoc2 {
            let first = (VTOC_BITMAP_SECTORS - VTOC2_BITMAP_FIRST_SECTOR) / 8;
            for index in first..VTOC2_BITMAP_LEN {
                collect_bits(
                    vtoc2[index],
                    VTOC2_BITMAP_FIRST_SECTOR + index * 8,
                    &mut free,
                );
            }
        }

        Self { free }
    }

    /// Free map of a freshly formatted disk
    ///
    /// Boot sectors, the VTOC and the directory are in use. On DOS 2.5
    /// enhanced density, sector 720 is reserved as well.
    pub fn for_new_disk(geometry: DiskGeometry) -> Self {
        let directory_end = DIRECTORY_START_SECTOR + DIRECTORY_SECTORS;
        let limit = if geometry.has_vtoc2() {
            BITMAP_SECTOR_LIMIT
        } else {
            VTOC_BITMAP_SECTORS.min(geometry.sector_count + 1)
        };

        let free = (BOOT_SECTOR_COUNT + 1..limit)
            .filter(|&n| n < VTOC_SECTOR || n >= directory_end)
            .filter(|&n| !(geometry.has_vtoc2() && n == VTOC_BITMAP_SECTORS))
            .filter(|&n| n <= geometry.sector_count)
            .collect();

        Self { free }
    }

    /// Check whether a sector is free
    pub fn contains(&self, sector: usize) -> bool {
        self.free.contains(&sector)
    }

    /// Number of free sectors
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Check for a full disk
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Free sectors in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }

    /// Mark a sector as used
    pub fn allocate(&mut self, sector: usize) {
        self.free.remove(&sector);
    }

    /// Mark a sector as free
    pub fn release(&mut self, sector: usize) {
        self.free.insert(sector);
    }

    /// Free sectors covered by the first VTOC
    pub fn lower_count(&self) -> usize {
        self.free.range(..VTOC_BITMAP_SECTORS).count()
    }

    /// Free sectors covered only by the second VTOC
    pub fn upper_count(&self) -> usize {
        self.free
            .range(VTOC_BITMAP_SECTORS..BITMAP_SECTOR_LIMIT)
            .count()
    }

    /// Rewrite bitmaps and free counts from this map
    ///
    /// Both VTOCs are derived from the same set so their counts and
    /// bitmaps always agree.
    pub fn apply(&self, vtoc: &[u8], vtoc2: Option<&[u8]>) -> VtocUpdate {
        let mut new_vtoc = vtoc.to_vec();
        write_u16_le(&mut new_vtoc, VTOC_FREE_COUNT_OFFSET, self.lower_count() as u16);
        for index in 0..VTOC_BITMAP_LEN {
            new_vtoc[VTOC_BITMAP_OFFSET + index] = self.bitmap_byte(index * 8);
        }
        let used_end = VTOC_USED_LEN.min(new_vtoc.len());
        new_vtoc[VTOC_BITMAP_OFFSET + VTOC_BITMAP_LEN..used_end].fill(0);

        let new_vtoc2 = vtoc2.map(|vtoc2| {
            let mut data = vtoc2.to_vec();
            for index in 0..VTOC2_BITMAP_LEN {
                data[index] = self.bitmap_byte(VTOC2_BITMAP_FIRST_SECTOR + index * 8);
            }
            write_u16_le(&mut data, VTOC2_FREE_COUNT_OFFSET, self.upper_count() as u16);
            data
        });

        VtocUpdate {
            vtoc: new_vtoc,
            vtoc2: new_vtoc2,
        }
    }

    fn bitmap_byte(&self, first_sector: usize) -> u8 {
        (0..8)
            .filter(|bit| self.free.contains(&(first_sector + bit)))
            .fold(0u8, |byte, bit| byte | (0x80 >> bit))
    }
}

fn collect_bits(byte: u8, first_sector: usize, free: &mut BTreeSet<usize>) {
    for bit in 0..8 {
        if byte & (0x80 >> bit) != 0 {
            free.insert(first_sector + bit);
        }
    }
}

/// Free sector count as recorded in the VTOC header fields
pub fn recorded_free_count(vtoc: &[u8], vtoc2: Option<&[u8]>) -> usize {
    let mut count = read_u16_le(vtoc, VTOC_FREE_COUNT_OFFSET) as usize;
    if let Some(vtoc2) = vtoc2 {
        count += read_u16_le(vtoc2, VTOC2_FREE_COUNT_OFFSET) as usize;
    }
    count
}

/// Usable sector count as recorded in the VTOC
pub fn recorded_total_count(vtoc: &[u8]) -> usize {
    read_u16_le(vtoc, VTOC_TOTAL_COUNT_OFFSET) as usize
}

/// VTOC sectors for a freshly formatted disk
pub fn new_disk_vtoc(geometry: DiskGeometry) -> VtocUpdate {
    let map = FreeMap::for_new_disk(geometry);

    let mut vtoc = vec![0u8; geometry.size_of(VTOC_SECTOR)];
    vtoc[0] = DOS2_VERSION;
    write_u16_le(&mut vtoc, VTOC_TOTAL_COUNT_OFFSET, map.len() as u16);

    let vtoc2 = geometry
        .has_vtoc2()
        .then(|| vec![0u8; geometry.size_of(VTOC2_SECTOR)]);

    map.apply(&vtoc, vtoc2.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_vtoc() -> Vec<u8> {
        let mut vtoc = vec![0u8; 128];
        vtoc[0] = DOS2_VERSION;
        vtoc
    }

    #[test]
    fn test_bit_order() {
        let mut vtoc = blank_vtoc();
        vtoc[VTOC_BITMAP_OFFSET] = 0x80;
        vtoc[VTOC_BITMAP_OFFSET + 1] = 0x01;

        let map = FreeMap::from_vtoc(&vtoc, None);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![0, 15]);
    }

    #[test]
    fn test_single_density_new_disk() {
        let update = new_disk_vtoc(DiskGeometry::single_density());
        assert_eq!(update.vtoc[0], 2);
        assert_eq!(recorded_total_count(&update.vtoc), 707);
        assert_eq!(recorded_free_count(&update.vtoc, None), 707);
        assert!(update.vtoc2.is_none());

        let map = FreeMap::from_vtoc(&update.vtoc, None);
        assert!(!map.contains(3));
        assert!(map.contains(4));
        assert!(!map.contains(360));
        assert!(!map.contains(368));
        assert!(map.contains(369));
        assert!(map.contains(719));
    }

    #[test]
    fn test_enhanced_density_new_disk() {
        let update = new_disk_vtoc(DiskGeometry::enhanced_density());
        let vtoc2 = update.vtoc2.as_deref().unwrap();
        assert_eq!(recorded_total_count(&update.vtoc), 1010);
        assert_eq!(read_u16_le(vtoc2, VTOC2_FREE_COUNT_OFFSET), 303);
        assert_eq!(recorded_free_count(&update.vtoc, Some(vtoc2)), 1010);

        let map = FreeMap::from_vtoc(&update.vtoc, Some(vtoc2));
        assert!(!map.contains(720));
        assert!(map.contains(721));
        assert!(map.contains(1023));
        assert_eq!(map.len(), 1010);
    }

    #[test]
    fn test_apply_keeps_counts_consistent() {
        let update = new_disk_vtoc(DiskGeometry::enhanced_density());
        let mut map = FreeMap::from_vtoc(&update.vtoc, update.vtoc2.as_deref());

        map.allocate(4);
        map.allocate(800);
        let changed = map.apply(&update.vtoc, update.vtoc2.as_deref());
        let vtoc2 = changed.vtoc2.as_deref().unwrap();

        assert_eq!(read_u16_le(&changed.vtoc, VTOC_FREE_COUNT_OFFSET), 706);
        assert_eq!(read_u16_le(vtoc2, VTOC2_FREE_COUNT_OFFSET), 302);
        assert_eq!(FreeMap::from_vtoc(&changed.vtoc, Some(vtoc2)), map);
        // VTOC2 mirrors the low bitmap from sector 48 upward
        assert_eq!(vtoc2[0], changed.vtoc[VTOC_BITMAP_OFFSET + 6]);
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let vtoc = blank_vtoc();
        let mut map = FreeMap::default();
        map.release(10);
        let update = map.apply(&vtoc, None);

        assert_eq!(vtoc, blank_vtoc());
        assert_eq!(update.vtoc[VTOC_BITMAP_OFFSET + 1], 0x20);
        assert_eq!(recorded_free_count(&update.vtoc, None), 1);
    }
}
