/// DOS 2.x directory entries
///
/// Each of the 8 directory sectors starting at 361 holds 8 entries of 16 bytes:
///
/// | bytes | field |
/// |---|---|
/// | 0 | flags |
/// | 1-2 | length in sectors (LE) |
/// | 3-4 | start sector (LE) |
/// | 5-12 | filename, space padded |
/// | 13-15 | extension, space padded |

use crate::error::{AtrError, Result};
use crate::filesystem::{DirEntry, FileAttributes};
use crate::format::*;

/// Raw 8.3 name as stored on disk
pub type AtariName = [u8; FILENAME_LEN + EXTENSION_LEN];

/// A 16-byte directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDirEntry {
    /// Flag byte
    pub flags: u8,
    /// Length in sectors
    pub sectors: u16,
    /// First sector
    pub start: u16,
    /// Space padded name and extension
    pub name: AtariName,
}

impl RawDirEntry {
    /// Parse a directory entry from 16 bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DIR_ENTRY_SIZE {
            return None;
        }

        let mut name = [0u8; FILENAME_LEN + EXTENSION_LEN];
        name.copy_from_slice(&data[5..DIR_ENTRY_SIZE]);

        Some(Self {
            flags: data[0],
            sectors: read_u16_le(data, 1),
            start: read_u16_le(data, 3),
            name,
        })
    }

    /// Encode to 16 bytes
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut data = [0u8; DIR_ENTRY_SIZE];
        data[0] = self.flags;
        write_u16_le(&mut data, 1, self.sectors);
        write_u16_le(&mut data, 3, self.start);
        data[5..].copy_from_slice(&self.name);
        data
    }

    /// Live entries are in use and not deleted
    pub fn is_live(&self) -> bool {
        self.flags & FLAG_DELETED == 0 && self.flags & FLAG_IN_USE != 0
    }

    /// Free slots are never-used (0x00) or deleted (0x80)
    pub fn is_free_slot(&self) -> bool {
        self.flags == 0 || self.flags == FLAG_DELETED
    }

    /// Check the per-file lock bit
    pub fn is_locked(&self) -> bool {
        self.flags & FLAG_LOCKED != 0
    }

    /// Set or clear the per-file lock bit
    pub fn set_locked(&mut self, locked: bool) {
        if locked {
            self.flags |= FLAG_LOCKED;
        } else {
            self.flags &= !FLAG_LOCKED;
        }
    }

    /// Display form of the name, e.g. "DOS.SYS"
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }

    /// Convert to the public entry type, tagged with its position
    pub fn to_dir_entry(&self, file_number: usize) -> DirEntry {
        DirEntry {
            name: self.display_name(),
            file_number,
            flags: self.flags,
            sectors: self.sectors,
            start: self.start,
            attributes: FileAttributes {
                locked: self.is_locked(),
                open_for_output: self.flags & FLAG_OPEN_OUTPUT != 0,
            },
        }
    }
}

/// Directory sector and byte offset of an entry
pub fn entry_location(file_number: usize) -> (usize, usize) {
    (
        DIRECTORY_START_SECTOR + file_number / ENTRIES_PER_SECTOR,
        (file_number % ENTRIES_PER_SECTOR) * DIR_ENTRY_SIZE,
    )
}

/// Return a copy of a directory sector with one slot replaced
pub fn with_entry(sector: &[u8], slot: usize, entry: &RawDirEntry) -> Vec<u8> {
    let mut data = sector.to_vec();
    let offset = slot * DIR_ENTRY_SIZE;
    data[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    data
}

/// Convert a host filename into a space padded, uppercase 8.3 name
///
/// The base name is everything before the first dot, the extension
/// everything after the last one. Both are truncated to fit.
pub fn to_atari_name(filename: &str) -> Result<AtariName> {
    let upper: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_uppercase();

    let mut parts = upper.split('.');
    let base = parts.next().unwrap_or("");
    let ext = if upper.contains('.') {
        upper.rsplit('.').next().unwrap_or("")
    } else {
        ""
    };

    if base.trim().is_empty() {
        return Err(AtrError::filename(filename));
    }

    let mut name = [b' '; FILENAME_LEN + EXTENSION_LEN];
    pad_into(&mut name[..FILENAME_LEN], base);
    pad_into(&mut name[FILENAME_LEN..], ext);
    Ok(name)
}

/// Replace the extension with a zero padded 3-digit number
pub fn with_numbered_extension(name: &AtariName, number: usize) -> AtariName {
    let mut numbered = *name;
    pad_into(&mut numbered[FILENAME_LEN..], &format!("{:03}", number % 1000));
    numbered
}

/// Display form of a raw 8.3 name
pub fn display_name(name: &AtariName) -> String {
    let trim = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .trim_matches(|c| c == ' ' || c == '\0')
            .to_string()
    };
    let base = trim(&name[..FILENAME_LEN]);
    let ext = trim(&name[FILENAME_LEN..]);

    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}

fn pad_into(field: &mut [u8], text: &str) {
    field.fill(b' ');
    for (dst, src) in field.iter_mut().zip(text.bytes()) {
        *dst = src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        let mut data = [0u8; 16];
        data[0] = 0x42;
        data[1] = 0x03;
        data[3] = 0x71;
        data[4] = 0x01;
        data[5..16].copy_from_slice(b"DOS     SYS");

        let entry = RawDirEntry::parse(&data).unwrap();
        assert_eq!(entry.sectors, 3);
        assert_eq!(entry.start, 369);
        assert_eq!(entry.display_name(), "DOS.SYS");
        assert!(entry.is_live());
        assert!(!entry.is_locked());
        assert_eq!(entry.to_bytes(), data);
    }

    #[test]
    fn test_live_and_free() {
        let mut entry = RawDirEntry::parse(&[0u8; 16]).unwrap();
        assert!(entry.is_free_slot());
        assert!(!entry.is_live());

        entry.flags = 0xC2;
        assert!(!entry.is_live());

        entry.flags = FLAG_DELETED;
        assert!(entry.is_free_slot());
    }

    #[test]
    fn test_lock_bit() {
        let mut entry = RawDirEntry::parse(&[0x42; 16]).unwrap();
        entry.set_locked(true);
        assert_eq!(entry.flags, 0x62);
        assert!(entry.to_dir_entry(0).attributes.locked);
        entry.set_locked(false);
        assert_eq!(entry.flags, 0x42);
    }

    #[test]
    fn test_to_atari_name() {
        assert_eq!(&to_atari_name("a.txt").unwrap(), b"A       TXT");
        assert_eq!(&to_atari_name("autorun.sys").unwrap(), b"AUTORUN SYS");
        assert_eq!(&to_atari_name("verylongname.text").unwrap(), b"VERYLONGTEX");
        assert_eq!(&to_atari_name("README").unwrap(), b"README     ");
        assert_eq!(&to_atari_name("game.v1.bas").unwrap(), b"GAME    BAS");
        assert!(to_atari_name(".hidden").is_err());
        assert!(to_atari_name("").is_err());
    }

    #[test]
    fn test_numbered_extension() {
        let name = to_atari_name("a.txt").unwrap();
        assert_eq!(&with_numbered_extension(&name, 1), b"A       001");
        assert_eq!(display_name(&with_numbered_extension(&name, 12)), "A.012");
    }

    #[test]
    fn test_entry_location() {
        assert_eq!(entry_location(0), (361, 0));
        assert_eq!(entry_location(9), (362, 16));
        assert_eq!(entry_location(63), (368, 112));
    }

    #[test]
    fn test_with_entry_leaves_other_slots() {
        let sector = vec![0xEE; 128];
        let entry = RawDirEntry::parse(&[0u8; 16]).unwrap();
        let updated = with_entry(&sector, 2, &entry);

        assert!(updated[32..48].iter().all(|&b| b == 0));
        assert!(updated[..32].iter().all(|&b| b == 0xEE));
        assert!(updated[48..].iter().all(|&b| b == 0xEE));
    }
}
