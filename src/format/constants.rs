/// ATR header and DOS 2.x on-disk layout constants

/// ATR magic word (stored little-endian as 0x96 0x02)
pub const ATR_MAGIC: u16 = 0x0296;

/// Size of the ATR file header
pub const ATR_HEADER_SIZE: usize = 16;

/// Disk size in the header is counted in 16-byte paragraphs
pub const ATR_PARAGRAPH_SIZE: usize = 16;

/// Header offset of the little-endian paragraph count
pub const ATR_HEADER_SIZE_OFFSET: usize = 2;

/// Header offset of the little-endian main sector size
pub const ATR_HEADER_SECTOR_SIZE_OFFSET: usize = 4;

/// Number of boot sectors at the start of every image
pub const BOOT_SECTOR_COUNT: usize = 3;

/// Boot sectors are always 128 bytes, whatever the main sector size
pub const BOOT_SECTOR_SIZE: usize = 128;

/// Sector size used by single and enhanced density
pub const SINGLE_DENSITY_SECTOR_SIZE: usize = 128;

/// Sectors on a single density disk
pub const SINGLE_DENSITY_SECTORS: usize = 720;

/// Sectors on an Atari 1050 enhanced density disk
pub const ENHANCED_DENSITY_SECTORS: usize = 1040;

/// Volume table of contents
pub const VTOC_SECTOR: usize = 360;

/// DOS 2.5 second VTOC for enhanced density
pub const VTOC2_SECTOR: usize = 1024;

/// DOS version code for DOS 2.0 and 2.5
pub const DOS2_VERSION: u8 = 2;

/// VTOC offset of the little-endian total usable sector count
pub const VTOC_TOTAL_COUNT_OFFSET: usize = 1;

/// VTOC offset of the little-endian free sector count
pub const VTOC_FREE_COUNT_OFFSET: usize = 3;

/// VTOC offset of the free sector bitmap
pub const VTOC_BITMAP_OFFSET: usize = 10;

/// VTOC bitmap length in bytes (sectors 0..=719)
pub const VTOC_BITMAP_LEN: usize = 90;

/// First sector not covered by the VTOC bitmap
pub const VTOC_BITMAP_SECTORS: usize = VTOC_BITMAP_LEN * 8;

/// End of the VTOC bytes rewritten on update (the rest of a 128-byte sector)
pub const VTOC_USED_LEN: usize = 128;

/// First sector mirrored by the VTOC2 bitmap
pub const VTOC2_BITMAP_FIRST_SECTOR: usize = 48;

/// VTOC2 bitmap length in bytes (sectors 48..=1023)
pub const VTOC2_BITMAP_LEN: usize = 122;

/// VTOC2 offset of the little-endian free count for sectors 720..=1023
pub const VTOC2_FREE_COUNT_OFFSET: usize = 122;

/// One past the last sector addressable through the bitmaps
pub const BITMAP_SECTOR_LIMIT: usize = 1024;

/// First directory sector
pub const DIRECTORY_START_SECTOR: usize = 361;

/// Number of directory sectors
pub const DIRECTORY_SECTORS: usize = 8;

/// Directory entries per sector
pub const ENTRIES_PER_SECTOR: usize = 8;

/// Size of one directory entry
pub const DIR_ENTRY_SIZE: usize = 16;

/// Maximum number of directory entries
pub const MAX_DIR_ENTRIES: usize = DIRECTORY_SECTORS * ENTRIES_PER_SECTOR;

/// Filename length in a directory entry
pub const FILENAME_LEN: usize = 8;

/// Extension length in a directory entry
pub const EXTENSION_LEN: usize = 3;

/// Bytes reserved at the end of every file sector for the chain link
pub const SECTOR_TAIL_SIZE: usize = 3;

/// Directory flag: entry deleted
pub const FLAG_DELETED: u8 = 0x80;

/// Directory flag: entry in use
pub const FLAG_IN_USE: u8 = 0x40;

/// Directory flag: file locked
pub const FLAG_LOCKED: u8 = 0x20;

/// Directory flag: created by DOS 2
pub const FLAG_DOS2: u8 = 0x02;

/// Directory flag: file opened for output
pub const FLAG_OPEN_OUTPUT: u8 = 0x01;

/// Flags written for a newly created file
pub const FLAGS_NEW_FILE: u8 = FLAG_IN_USE | FLAG_DOS2;

/// Flags of a file left open for output by DOS
pub const FLAGS_OPEN_FILE: u8 = FLAG_DOS2 | FLAG_OPEN_OUTPUT;
