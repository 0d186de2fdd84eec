/// Atari DOS 2.0 / 2.5 filesystem
///
/// All filesystem state lives in reserved sectors and is read on demand:
/// - Sector 360: VTOC (DOS code, free count, free bitmap)
/// - Sectors 361-368: directory, 8 entries of 16 bytes per sector
/// - Sector 1024: second VTOC on DOS 2.5 enhanced density disks
///
/// Mutating operations check every precondition and build every new
/// sector before the first write, so a rejected call leaves the disk as
/// it was.

use crate::error::{AtrError, Result};
use crate::filesystem::chain::{self, SectorTail};
use crate::filesystem::directory::{self, AtariName, RawDirEntry};
use crate::filesystem::vtoc::{self, FreeMap};
use crate::filesystem::{DirEntry, FileSystem, FileSystemInfo};
use crate::format::*;
use crate::image::DiskImage;
use log::{debug, info, warn};

/// DOS version code from the VTOC
///
/// 0 if the image is too small, or if any VTOC or directory sector is
/// shorter than a single density sector.
pub fn dos_code(image: &DiskImage) -> u8 {
    if image.sector_count() < DIRECTORY_START_SECTOR + DIRECTORY_SECTORS {
        return 0;
    }

    let mut reserved = (DIRECTORY_START_SECTOR..DIRECTORY_START_SECTOR + DIRECTORY_SECTORS)
        .chain([VTOC_SECTOR])
        .chain(has_vtoc2(image).then_some(VTOC2_SECTOR));
    let full_size = reserved.all(|number| {
        image
            .sector(number)
            .is_some_and(|data| data.len() >= SINGLE_DENSITY_SECTOR_SIZE)
    });
    if !full_size {
        debug!("Reserved sectors too short for DOS 2");
        return 0;
    }

    image.sector(VTOC_SECTOR).map(|vtoc| vtoc[0]).unwrap_or(0)
}

/// Check for a DOS 2.x layout
pub fn is_dos2(image: &DiskImage) -> bool {
    dos_code(image) == DOS2_VERSION
}

fn has_vtoc2(image: &DiskImage) -> bool {
    image.sector_count() >= VTOC2_SECTOR
}

fn vtoc_sectors(image: &DiskImage) -> Option<(&[u8], Option<&[u8]>)> {
    let vtoc = image.sector(VTOC_SECTOR)?;
    let vtoc2 = if has_vtoc2(image) {
        image.sector(VTOC2_SECTOR)
    } else {
        None
    };
    Some((vtoc, vtoc2))
}

fn read_entry(image: &DiskImage, file_number: usize) -> Option<RawDirEntry> {
    if file_number >= MAX_DIR_ENTRIES {
        return None;
    }
    let (sector, offset) = directory::entry_location(file_number);
    image
        .sector(sector)
        .and_then(|data| data.get(offset..))
        .and_then(RawDirEntry::parse)
}

/// All 64 slots in sector-then-slot order
fn entries(image: &DiskImage) -> Vec<(usize, RawDirEntry)> {
    (0..MAX_DIR_ENTRIES)
        .filter_map(|n| read_entry(image, n).map(|entry| (n, entry)))
        .collect()
}

fn find_raw(image: &DiskImage, name: &AtariName) -> Option<usize> {
    entries(image)
        .into_iter()
        .find(|(_, entry)| !entry.is_free_slot() && &entry.name == name)
        .map(|(n, _)| n)
}

/// Follow a chain, checking each tag before moving on
fn walk_chain(
    image: &DiskImage,
    start: usize,
    file_number: usize,
) -> Result<Vec<(usize, SectorTail)>> {
    let mut chain = Vec::new();
    let mut number = start;

    while number != 0 {
        if chain.len() >= image.sector_count() {
            warn!("File {} chain loops at sector {}", file_number, number);
            return Err(AtrError::InvalidSector(number));
        }

        let data = image.sector(number).ok_or(AtrError::InvalidSector(number))?;
        let tail = SectorTail::parse(data);
        if tail.file_number != file_number {
            warn!(
                "File number mismatch in sector {}: expected {}, found {}",
                number, file_number, tail.file_number
            );
            return Err(AtrError::FileNumberMismatch {
                sector: number,
                expected: file_number,
                found: tail.file_number,
            });
        }

        chain.push((number, tail));
        number = tail.next;
    }

    Ok(chain)
}

/// Read-only view of a DOS 2.x disk
pub struct Dos2FileSystem<'a> {
    image: &'a DiskImage,
}

impl<'a> Dos2FileSystem<'a> {
    /// Mount a filesystem view over an image
    ///
    /// Mounting never fails; operations on a disk without a DOS 2.x VTOC
    /// report an empty directory or `NotDos2`.
    pub fn from_image(image: &'a DiskImage) -> Self {
        Self { image }
    }

    /// Check for a DOS 2.x layout
    pub fn is_dos2(&self) -> bool {
        is_dos2(self.image)
    }

    /// DOS version code from the VTOC
    pub fn dos_code(&self) -> u8 {
        dos_code(self.image)
    }

    /// Live directory entries in positional order
    pub fn directory(&self) -> Vec<DirEntry> {
        if !self.is_dos2() {
            return Vec::new();
        }

        entries(self.image)
            .into_iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(n, entry)| entry.to_dir_entry(n))
            .collect()
    }

    /// Raw directory record at a position, live or not
    pub fn directory_entry(&self, file_number: usize) -> Option<RawDirEntry> {
        if !self.is_dos2() {
            return None;
        }
        read_entry(self.image, file_number)
    }

    /// Reassemble a file by following its sector chain
    pub fn file_contents(&self, start: usize, file_number: usize) -> Result<Vec<u8>> {
        if !self.is_dos2() {
            return Err(AtrError::NotDos2);
        }

        let cap = chain::capacity(self.image.sector_size());
        let mut contents = Vec::new();
        for (number, tail) in walk_chain(self.image, start, file_number)? {
            if let Some(data) = self.image.sector(number) {
                contents.extend_from_slice(&data[..tail.length.min(cap)]);
            }
        }
        Ok(contents)
    }

    /// Find a file by its host-style name, e.g. "a.txt"
    pub fn find_file(&self, name: &str) -> Option<usize> {
        if !self.is_dos2() {
            return None;
        }
        let name = directory::to_atari_name(name).ok()?;
        find_raw(self.image, &name)
    }

    /// Free sectors according to the bitmaps
    pub fn free_sectors(&self) -> FreeMap {
        if !self.is_dos2() {
            return FreeMap::default();
        }
        vtoc_sectors(self.image)
            .map(|(vtoc, vtoc2)| FreeMap::from_vtoc(vtoc, vtoc2))
            .unwrap_or_default()
    }

    /// Free sectors according to the VTOC free counts
    pub fn free_sector_count(&self) -> usize {
        if !self.is_dos2() {
            return 0;
        }
        vtoc_sectors(self.image)
            .map(|(vtoc, vtoc2)| vtoc::recorded_free_count(vtoc, vtoc2))
            .unwrap_or(0)
    }

    /// Bytes of file data that fit in the free sectors
    pub fn bytes_available(&self) -> usize {
        if !self.is_dos2() {
            return 0;
        }
        self.free_sector_count() * chain::capacity(self.image.sector_size())
    }
}

impl FileSystem for Dos2FileSystem<'_> {
    fn read_dir(&self) -> Result<Vec<DirEntry>> {
        Ok(self.directory())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let file_number = self
            .find_file(name)
            .ok_or_else(|| AtrError::FileNotFound(name.to_string()))?;
        let entry = read_entry(self.image, file_number)
            .ok_or_else(|| AtrError::FileNotFound(name.to_string()))?;
        self.file_contents(entry.start as usize, file_number)
    }

    fn info(&self) -> FileSystemInfo {
        let total_sectors = if self.is_dos2() {
            vtoc_sectors(self.image)
                .map(|(vtoc, _)| vtoc::recorded_total_count(vtoc))
                .unwrap_or(0)
        } else {
            0
        };

        FileSystemInfo {
            fs_type: (if self.is_dos2() { "Atari DOS 2" } else { "Unknown" }).to_string(),
            dos_code: self.dos_code(),
            total_sectors,
            free_sectors: self.free_sector_count(),
            sector_size: self.image.sector_size(),
            bytes_available: self.bytes_available(),
        }
    }
}

/// Read-write access to a DOS 2.x disk
pub struct Dos2FileSystemMut<'a> {
    image: &'a mut DiskImage,
}

impl<'a> Dos2FileSystemMut<'a> {
    /// Mount a writable filesystem over an image
    pub fn from_image_mut(image: &'a mut DiskImage) -> Self {
        Self { image }
    }

    /// Read-only view of the same disk
    pub fn view(&self) -> Dos2FileSystem<'_> {
        Dos2FileSystem::from_image(self.image)
    }

    /// Write a sector, refusing if the disk is locked
    pub fn write_sector(&mut self, number: usize, data: &[u8]) -> Result<()> {
        if self.image.is_locked() {
            warn!("Disk is locked, sector {} not written", number);
            return Err(AtrError::DiskLocked);
        }
        self.image.write_sector(number, data)
    }

    fn check_writable(&self) -> Result<()> {
        if self.image.is_locked() {
            return Err(AtrError::DiskLocked);
        }
        if !is_dos2(self.image) {
            return Err(AtrError::NotDos2);
        }
        Ok(())
    }

    fn directory_update(&self, file_number: usize, entry: &RawDirEntry) -> Result<(usize, Vec<u8>)> {
        let (sector, _) = directory::entry_location(file_number);
        let data = self
            .image
            .sector(sector)
            .ok_or(AtrError::InvalidSector(sector))?;
        let slot = file_number % ENTRIES_PER_SECTOR;
        Ok((sector, directory::with_entry(data, slot, entry)))
    }

    fn vtoc_update(&self, map: &FreeMap) -> Result<Vec<(usize, Vec<u8>)>> {
        let (vtoc, vtoc2) =
            vtoc_sectors(self.image).ok_or(AtrError::InvalidSector(VTOC_SECTOR))?;
        let update = map.apply(vtoc, vtoc2);

        let mut writes = vec![(VTOC_SECTOR, update.vtoc)];
        if let Some(vtoc2) = update.vtoc2 {
            writes.push((VTOC2_SECTOR, vtoc2));
        }
        Ok(writes)
    }

    fn commit(&mut self, writes: Vec<(usize, Vec<u8>)>) -> Result<()> {
        for (number, data) in writes {
            self.write_sector(number, &data)?;
        }
        Ok(())
    }

    fn live_entry(&self, file_number: usize) -> Result<RawDirEntry> {
        read_entry(self.image, file_number)
            .filter(|entry| entry.is_live())
            .ok_or_else(|| AtrError::FileNotFound(format!("#{}", file_number)))
    }

    /// Add a file, returning its new directory entry
    ///
    /// The name is converted to an uppercase 8.3 name; if it is taken, the
    /// extension is replaced by 001, 002, ... until it is unique. Sectors
    /// are taken from the free list in ascending order.
    pub fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<DirEntry> {
        self.check_writable()?;
        info!("Adding file {}, length {}", name, contents.len());

        let file_number = entries(self.image)
            .into_iter()
            .find(|(_, entry)| entry.is_free_slot())
            .map(|(n, _)| n)
            .ok_or_else(|| {
                warn!("Directory full");
                AtrError::DirectoryFull
            })?;

        let base_name = directory::to_atari_name(name)?;
        let mut atari_name = base_name;
        let mut suffix = 1;
        while find_raw(self.image, &atari_name).is_some() {
            atari_name = directory::with_numbered_extension(&base_name, suffix);
            suffix += 1;
        }

        let sector_size = self.image.sector_size();
        let mut map = self.view().free_sectors();
        let free: Vec<usize> = map
            .iter()
            .filter(|&n| self.image.is_valid_sector(n))
            .collect();
        let available = free.len() * chain::capacity(sector_size);
        let plan = match chain::plan_chain(contents, &free, file_number, sector_size) {
            Some(plan) if contents.len() <= available => plan,
            _ => {
                warn!("Insufficient space available");
                return Err(AtrError::InsufficientSpace {
                    needed: contents.len(),
                    available,
                });
            }
        };

        for (number, _) in &plan {
            map.allocate(*number);
        }

        let entry = RawDirEntry {
            flags: FLAGS_NEW_FILE,
            sectors: plan.len() as u16,
            start: plan[0].0 as u16,
            name: atari_name,
        };

        let mut writes = plan;
        writes.extend(self.vtoc_update(&map)?);
        writes.push(self.directory_update(file_number, &entry)?);
        self.commit(writes)?;

        debug!(
            "File {} stored as #{} in {} sectors from {}",
            entry.display_name(),
            file_number,
            entry.sectors,
            entry.start
        );
        Ok(entry.to_dir_entry(file_number))
    }

    /// Delete a file, returning the number of sectors freed
    ///
    /// The whole chain is validated before the directory or VTOC is
    /// touched.
    pub fn delete(&mut self, file_number: usize) -> Result<usize> {
        self.check_writable()?;

        let mut entry = read_entry(self.image, file_number)
            .ok_or_else(|| AtrError::FileNotFound(format!("#{}", file_number)))?;
        if entry.flags != FLAGS_NEW_FILE && entry.flags != FLAGS_OPEN_FILE {
            warn!("File {} is not valid for deletion", file_number);
            return Err(if entry.is_live() && entry.is_locked() {
                AtrError::FileLocked(file_number)
            } else {
                AtrError::FileNotFound(format!("#{}", file_number))
            });
        }

        let sectors = walk_chain(self.image, entry.start as usize, file_number)?;

        entry.flags = FLAG_DELETED;
        let mut map = self.view().free_sectors();
        for (number, _) in &sectors {
            map.release(*number);
        }

        let mut writes = vec![self.directory_update(file_number, &entry)?];
        writes.extend(self.vtoc_update(&map)?);
        self.commit(writes)?;

        info!("Freed {} sectors", sectors.len());
        Ok(sectors.len())
    }

    /// Rename a file in place
    pub fn rename(&mut self, file_number: usize, new_name: &str) -> Result<()> {
        self.check_writable()?;

        let mut entry = self.live_entry(file_number)?;
        if entry.is_locked() {
            return Err(AtrError::FileLocked(file_number));
        }

        let atari_name = directory::to_atari_name(new_name)?;
        if let Some(other) = find_raw(self.image, &atari_name) {
            if other != file_number {
                return Err(AtrError::filename(format!(
                    "{} already exists",
                    directory::display_name(&atari_name)
                )));
            }
        }

        entry.name = atari_name;
        let write = self.directory_update(file_number, &entry)?;
        self.commit(vec![write])
    }

    /// Set or clear a file's lock bit
    pub fn set_file_locked(&mut self, file_number: usize, locked: bool) -> Result<()> {
        self.check_writable()?;

        let mut entry = self.live_entry(file_number)?;
        entry.set_locked(locked);
        let write = self.directory_update(file_number, &entry)?;
        self.commit(vec![write])
    }

    /// Erase the disk and lay down an empty DOS 2 filesystem
    ///
    /// Enhanced density geometries get the DOS 2.5 second VTOC.
    pub fn format(&mut self, geometry: DiskGeometry) -> Result<()> {
        if self.image.is_locked() {
            return Err(AtrError::DiskLocked);
        }
        if geometry.sector_count < DIRECTORY_START_SECTOR + DIRECTORY_SECTORS {
            return Err(AtrError::InvalidSector(geometry.sector_count));
        }

        self.image.reset(geometry);
        let update = vtoc::new_disk_vtoc(geometry);
        let mut writes = vec![(VTOC_SECTOR, update.vtoc)];
        if let Some(vtoc2) = update.vtoc2 {
            writes.push((VTOC2_SECTOR, vtoc2));
        }
        self.commit(writes)?;

        info!("Formatted {} DOS 2 disk", geometry.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(geometry: DiskGeometry) -> DiskImage {
        let mut image = DiskImage::with_geometry(geometry);
        Dos2FileSystemMut::from_image_mut(&mut image)
            .format(geometry)
            .unwrap();
        image
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_blank_image_is_not_dos2() {
        let image = DiskImage::new();
        let fs = Dos2FileSystem::from_image(&image);
        assert!(!fs.is_dos2());
        assert!(fs.directory().is_empty());
        assert_eq!(fs.free_sector_count(), 0);
        assert!(matches!(fs.file_contents(4, 0), Err(AtrError::NotDos2)));
    }

    #[test]
    fn test_tiny_sectors_are_not_dos2() {
        // 3 boot sectors then 400 two-byte sectors, VTOC code set to 2
        let mut data = vec![0u8; ATR_HEADER_SIZE];
        write_u16_le(&mut data, 0, ATR_MAGIC);
        write_u16_le(&mut data, ATR_HEADER_SIZE_OFFSET, ((384 + 800) / 16) as u16);
        write_u16_le(&mut data, ATR_HEADER_SECTOR_SIZE_OFFSET, 2);
        data.extend(vec![0u8; 384 + 800]);
        data[ATR_HEADER_SIZE + 384 + (VTOC_SECTOR - 4) * 2] = DOS2_VERSION;

        let mut image = DiskImage::from_bytes(&data).unwrap();
        assert_eq!(image.sector(VTOC_SECTOR).unwrap(), &[DOS2_VERSION, 0]);
        assert_eq!(dos_code(&image), 0);

        let fs = Dos2FileSystem::from_image(&image);
        assert!(fs.directory().is_empty());
        assert_eq!(fs.bytes_available(), 0);
        assert_eq!(fs.info().fs_type, "Unknown");

        let result = Dos2FileSystemMut::from_image_mut(&mut image).add_file("A", b"data");
        assert!(matches!(result, Err(AtrError::NotDos2)));
    }

    #[test]
    fn test_add_file_to_blank_image_fails() {
        let mut image = DiskImage::new();
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        assert!(matches!(fs.add_file("A.TXT", b"hi"), Err(AtrError::NotDos2)));
        assert!(!image.is_changed());
    }

    #[test]
    fn test_format() {
        let image = formatted(DiskGeometry::single_density());
        let fs = Dos2FileSystem::from_image(&image);
        assert!(fs.is_dos2());
        assert!(fs.directory().is_empty());
        assert_eq!(fs.free_sector_count(), 707);
        assert_eq!(fs.bytes_available(), 707 * 125);
        assert_eq!(fs.free_sectors().len(), 707);
    }

    #[test]
    fn test_add_and_read_file() {
        let mut image = formatted(DiskGeometry::single_density());
        let contents = pattern(300);

        let entry = Dos2FileSystemMut::from_image_mut(&mut image)
            .add_file("a.txt", &contents)
            .unwrap();
        assert_eq!(entry.name, "A.TXT");
        assert_eq!(entry.file_number, 0);
        assert_eq!(entry.flags, 0x42);
        assert_eq!(entry.sectors, 3);
        assert_eq!(entry.start, 4);

        let fs = Dos2FileSystem::from_image(&image);
        let dir = fs.directory();
        assert_eq!(dir, vec![entry.clone()]);
        assert_eq!(fs.file_contents(4, 0).unwrap(), contents);
        assert_eq!(fs.read_file("A.TXT").unwrap(), contents);
        assert_eq!(fs.free_sector_count(), 704);
    }

    #[test]
    fn test_allocation_is_ascending_not_contiguous() {
        let mut image = formatted(DiskGeometry::single_density());
        {
            let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
            fs.add_file("ONE", &pattern(125)).unwrap();
            fs.add_file("TWO", &pattern(125)).unwrap();
            fs.add_file("THREE", &pattern(125)).unwrap();
            fs.delete(1).unwrap();
        }

        // Sector 5 is free again; the new file takes it, then jumps to 7
        let entry = Dos2FileSystemMut::from_image_mut(&mut image)
            .add_file("FOUR", &pattern(200))
            .unwrap();
        assert_eq!(entry.file_number, 1);
        assert_eq!(entry.start, 5);

        let sector = image.sector(5).unwrap();
        assert_eq!(SectorTail::parse(sector).next, 7);
    }

    #[test]
    fn test_duplicate_names_get_numbered_extension() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        fs.add_file("a.txt", b"first").unwrap();
        let second = fs.add_file("A.TXT", b"second").unwrap();
        let third = fs.add_file("a.txt", b"third").unwrap();

        assert_eq!(second.name, "A.001");
        assert_eq!(third.name, "A.002");

        let view = fs.view();
        assert_eq!(view.read_file("A.TXT").unwrap(), b"first");
        assert_eq!(view.read_file("A.001").unwrap(), b"second");
        assert_eq!(view.find_file("a.002"), Some(2));
    }

    #[test]
    fn test_insufficient_space() {
        let mut image = formatted(DiskGeometry::single_density());
        let before = image.clone();
        let result =
            Dos2FileSystemMut::from_image_mut(&mut image).add_file("BIG", &vec![0; 707 * 125 + 1]);

        assert!(matches!(result, Err(AtrError::InsufficientSpace { .. })));
        assert_eq!(image.sectors(), before.sectors());
    }

    #[test]
    fn test_fill_disk_exactly() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        fs.add_file("BIG", &vec![0x55; 707 * 125]).unwrap();
        assert_eq!(fs.view().free_sector_count(), 0);
        assert!(matches!(
            fs.add_file("EMPTY", &[]),
            Err(AtrError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn test_directory_full() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        for i in 0..MAX_DIR_ENTRIES {
            fs.add_file(&format!("F{}", i), b"x").unwrap();
        }
        assert!(matches!(fs.add_file("LAST", b"x"), Err(AtrError::DirectoryFull)));
        assert_eq!(fs.view().directory().len(), 64);
    }

    #[test]
    fn test_delete_returns_sectors() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        let entry = fs.add_file("GAME.BAS", &pattern(1000)).unwrap();
        assert_eq!(fs.view().free_sector_count(), 707 - 8);

        assert_eq!(fs.delete(entry.file_number).unwrap(), 8);
        let view = fs.view();
        assert_eq!(view.free_sector_count(), 707);
        assert!(view.directory().is_empty());
        assert_eq!(view.directory_entry(0).unwrap().flags, FLAG_DELETED);
    }

    #[test]
    fn test_delete_corrupt_chain_changes_nothing() {
        let mut image = formatted(DiskGeometry::single_density());
        Dos2FileSystemMut::from_image_mut(&mut image)
            .add_file("A", &pattern(125))
            .unwrap();
        Dos2FileSystemMut::from_image_mut(&mut image)
            .add_file("B", &pattern(300))
            .unwrap();

        // Point the second sector of file 1 at a sector tagged for file 0
        let mut sector = image.sector(6).unwrap().to_vec();
        sector[125..].copy_from_slice(
            &SectorTail {
                file_number: 1,
                next: 4,
                length: 125,
            }
            .to_bytes(),
        );
        image.write_sector(6, &sector).unwrap();
        let before = image.clone();

        let result = Dos2FileSystemMut::from_image_mut(&mut image).delete(1);
        assert!(matches!(
            result,
            Err(AtrError::FileNumberMismatch {
                sector: 4,
                expected: 1,
                found: 0
            })
        ));
        assert_eq!(image.sectors(), before.sectors());
        assert!(Dos2FileSystem::from_image(&image).file_contents(5, 1).is_err());
    }

    #[test]
    fn test_link_outside_disk() {
        let mut image = formatted(DiskGeometry::single_density());
        Dos2FileSystemMut::from_image_mut(&mut image)
            .add_file("A", &pattern(10))
            .unwrap();
        // Next sector 1000 does not exist on a 720 sector disk
        let mut sector = image.sector(4).unwrap().to_vec();
        sector[125] = 0x03;
        sector[126] = 0xE8;
        image.write_sector(4, &sector).unwrap();

        let fs = Dos2FileSystem::from_image(&image);
        assert!(matches!(fs.file_contents(4, 0), Err(AtrError::InvalidSector(1000))));
    }

    #[test]
    fn test_locked_file_cannot_be_deleted_or_renamed() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        fs.add_file("KEEP.ME", b"data").unwrap();
        fs.set_file_locked(0, true).unwrap();

        assert!(matches!(fs.delete(0), Err(AtrError::FileLocked(0))));
        assert!(matches!(fs.rename(0, "OTHER"), Err(AtrError::FileLocked(0))));
        assert!(fs.view().directory()[0].attributes.locked);
        assert_eq!(fs.view().read_file("KEEP.ME").unwrap(), b"data");

        fs.set_file_locked(0, false).unwrap();
        fs.rename(0, "other.dat").unwrap();
        assert_eq!(fs.view().directory()[0].name, "OTHER.DAT");
    }

    #[test]
    fn test_rename_to_existing_name() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        fs.add_file("ONE", b"1").unwrap();
        fs.add_file("TWO", b"2").unwrap();
        assert!(matches!(fs.rename(1, "one"), Err(AtrError::InvalidFilename(_))));
    }

    #[test]
    fn test_locked_disk_rejects_writes() {
        let mut image = formatted(DiskGeometry::single_density());
        image.set_locked(true);
        let before = image.clone();

        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        assert!(matches!(fs.add_file("A", b"x"), Err(AtrError::DiskLocked)));
        assert!(matches!(fs.write_sector(10, &[1; 128]), Err(AtrError::DiskLocked)));
        assert!(matches!(
            fs.format(DiskGeometry::single_density()),
            Err(AtrError::DiskLocked)
        ));
        assert_eq!(image.sectors(), before.sectors());
    }

    #[test]
    fn test_enhanced_density_uses_vtoc2() {
        let mut image = formatted(DiskGeometry::enhanced_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        assert_eq!(fs.view().free_sector_count(), 1010);

        // Fill everything below 720, then spill into the upper bitmap
        fs.add_file("LOW", &vec![1; 707 * 125]).unwrap();
        let high = fs.add_file("HIGH", &pattern(250)).unwrap();
        assert_eq!(high.start, 721);

        let view = fs.view();
        assert_eq!(view.free_sector_count(), 1010 - 709);
        assert_eq!(view.read_file("HIGH").unwrap(), pattern(250));

        let vtoc2 = image.sector(VTOC2_SECTOR).unwrap();
        assert_eq!(read_u16_le(vtoc2, VTOC2_FREE_COUNT_OFFSET), 301);
    }

    #[test]
    fn test_double_density_capacity() {
        let mut image = formatted(DiskGeometry::double_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        let entry = fs.add_file("DD.DAT", &pattern(600)).unwrap();
        assert_eq!(entry.sectors, 3);
        assert_eq!(fs.view().read_file("DD.DAT").unwrap(), pattern(600));
        assert_eq!(fs.view().bytes_available(), 704 * 253);
    }

    #[test]
    fn test_empty_file() {
        let mut image = formatted(DiskGeometry::single_density());
        let mut fs = Dos2FileSystemMut::from_image_mut(&mut image);
        let entry = fs.add_file("EMPTY", &[]).unwrap();
        assert_eq!(entry.sectors, 1);
        assert!(fs.view().read_file("EMPTY").unwrap().is_empty());
        assert_eq!(fs.delete(0).unwrap(), 1);
    }

    #[test]
    fn test_info() {
        let image = formatted(DiskGeometry::single_density());
        let info = Dos2FileSystem::from_image(&image).info();
        assert_eq!(info.fs_type, "Atari DOS 2");
        assert_eq!(info.dos_code, 2);
        assert_eq!(info.total_sectors, 707);
        assert_eq!(info.free_sectors, 707);
    }
}
