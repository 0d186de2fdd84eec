/// Sector map visualization

use crate::filesystem::Dos2FileSystem;
use crate::format::*;
use crate::image::{DiskImage, SectorStatus};
use std::fmt::Write;

/// ANSI color codes for sector map
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
    pub const BRIGHT_RED: &str = "\x1b[91m";
    pub const DARK_YELLOW: &str = "\x1b[2;33m";
}

const BLOCK_NO_DATA: &str = "\u{2591}"; // ░ - Light shade (empty)
const BLOCK_HAS_DATA: &str = "\u{2593}"; // ▓ - Dark shade (in-use)

/// Sectors per track for the drive that wrote this geometry
pub fn sectors_per_track(geometry: DiskGeometry) -> usize {
    if geometry.has_vtoc2() {
        26
    } else {
        18
    }
}

fn is_system_sector(number: usize) -> bool {
    number <= BOOT_SECTOR_COUNT
        || (VTOC_SECTOR..DIRECTORY_START_SECTOR + DIRECTORY_SECTORS).contains(&number)
        || number == VTOC2_SECTOR
}

/// Render the free/used map as text, one column per track
pub fn render_free_map(image: &DiskImage) -> String {
    let fs = Dos2FileSystem::from_image(image);
    let dos2 = fs.is_dos2();
    let free = fs.free_sectors();

    let per_track = sectors_per_track(image.geometry());
    let num_tracks = image.sector_count().div_ceil(per_track);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "=== Sector Map ({}) ===",
        if dos2 { "DOS 2 VTOC" } else { "contents only" }
    );
    let _ = writeln!(
        out,
        "Legend: {}Used{} {}Free{} {}System{} {}Free with data{}",
        colors::BRIGHT_WHITE,
        colors::RESET,
        colors::DARK_WHITE,
        colors::RESET,
        colors::BRIGHT_RED,
        colors::RESET,
        colors::DARK_YELLOW,
        colors::RESET
    );
    let _ = writeln!(out);

    // Rows are sector positions within a track, last position at the top
    for position in (0..per_track).rev() {
        let _ = write!(out, "{:>2} ", position + 1);

        for track in 0..num_tracks {
            let number = track * per_track + position + 1;
            let Some(sector) = image.sectors().get(number - 1) else {
                out.push(' ');
                continue;
            };

            let has_data = sector.status() != SectorStatus::Blank;
            let block = if has_data { BLOCK_HAS_DATA } else { BLOCK_NO_DATA };
            let color = if !dos2 {
                if has_data {
                    colors::BRIGHT_WHITE
                } else {
                    colors::DARK_WHITE
                }
            } else if is_system_sector(number) {
                colors::BRIGHT_RED
            } else if !free.contains(number) {
                colors::BRIGHT_WHITE
            } else if has_data {
                colors::DARK_YELLOW
            } else {
                colors::DARK_WHITE
            };

            let _ = write!(out, "{}{}{}", color, block, colors::RESET);
        }
        out.push('\n');
    }

    // Track number axis, a label every 5 tracks
    out.push_str("   ");
    let mut printed_cols = vec![false; num_tracks];
    for track in 0..num_tracks {
        if track % 5 == 0 && !printed_cols[track] {
            for (i, digit) in track.to_string().chars().enumerate() {
                let col = track + i;
                if col < num_tracks {
                    out.push(digit);
                    printed_cols[col] = true;
                }
            }
        } else if !printed_cols[track] {
            out.push(' ');
        }
    }
    out.push('\n');

    if dos2 {
        let _ = writeln!(
            out,
            "{} free sectors, {} bytes available",
            fs.free_sector_count(),
            fs.bytes_available()
        );
    }
    out
}

/// Draw the free/used map to stdout
pub fn draw_free_map(image: &DiskImage) {
    print!("{}", render_free_map(image));
}
