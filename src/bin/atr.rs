/// Interactive ATR console application

use atrmanager::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::sync::mpsc::Receiver;
use tokio::runtime::Runtime;
use tokio::sync::mpsc as tokio_mpsc;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "create",
                "dir",
                "drives",
                "exit",
                "format",
                "fs-add",
                "fs-delete",
                "fs-export",
                "fs-info",
                "fs-lock",
                "fs-read",
                "fs-rename",
                "fs-unlock",
                "help",
                "info",
                "load",
                "lock",
                "ls",
                "map",
                "mount",
                "open",
                "quit",
                "read-sector",
                "save",
                "serve",
                "stop",
                "unlock",
                "unmount",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the first word (command name)
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".atrmanager_history");
        p
    })
}

/// A device serving the drive table in the background
struct Server {
    runtime: Runtime,
    shutdown: tokio_mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
    device: String,
}

impl Server {
    fn start(target: &str, variant: ProtocolVariant, drives: &DriveTable) -> Result<Self> {
        let config = DeviceConfig::new().variant(variant);
        let device = if target == "auto" {
            find_device(&config.device_prefix)
                .ok_or_else(|| AtrError::FileNotFound(format!("/dev/{}*", config.device_prefix)))?
        } else {
            target.to_string()
        };

        let runtime = Runtime::new()?;
        let transport = TtyTransport::new(config.bitrate);
        let mut sio = SioDevice::new(transport, drives.clone(), config);
        let inbound = sio.open(&device)?;

        let (shutdown, shutdown_rx) = tokio_mpsc::channel::<()>(1);
        let task = runtime.spawn(async move {
            sio.run(inbound, shutdown_rx).await;
        });

        Ok(Self {
            runtime,
            shutdown,
            task,
            device,
        })
    }

    fn stop(self) {
        let _ = self.shutdown.try_send(());
        let _ = self.runtime.block_on(self.task);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== ATRManager ===");
    println!("Interactive console for Atari ATR disk images and SIO drive emulation.");
    println!("Type 'help' for available commands\n");

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            return;
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    // Load history if available
    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut image: Option<SharedDisk> = None;
    let drives = DriveTable::new();
    let events = drives.subscribe();
    let mut server: Option<Server> = None;

    loop {
        report_events(&events);

        let readline = rl.readline("> ");
        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => {
                print_help();
            }
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            "open" | "load" => {
                if parts.len() < 2 {
                    println!("Usage: open <path>");
                    continue;
                }
                match DiskImage::open(&parts[1]) {
                    Ok(img) => {
                        println!(
                            "Opened: {} ({} sectors of {} bytes)",
                            parts[1],
                            img.sector_count(),
                            img.sector_size()
                        );
                        image = Some(share(img));
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "create" => {
                let name = parts.get(1).map(String::as_str).unwrap_or("single");
                match DiskGeometry::from_name(name) {
                    Some(geometry) => {
                        println!("Created new {} image (unformatted)", geometry.name());
                        image = Some(share(DiskImage::with_geometry(geometry)));
                    }
                    None => println!("Usage: create [single|enhanced|double]"),
                }
            }
            _ => {
                let Some(disk) = image.clone() else {
                    if is_image_command(&command) {
                        println!("No image loaded. Use 'open <path>' or 'create' first.");
                    } else {
                        run_device_command(&command, &parts, &drives, &mut server, None);
                    }
                    continue;
                };

                if is_image_command(&command) {
                    run_image_command(&command, &parts, &disk);
                } else {
                    run_device_command(&command, &parts, &drives, &mut server, Some(&disk));
                }
            }
        }
    }

    if let Some(server) = server.take() {
        server.stop();
    }
}

fn is_image_command(command: &str) -> bool {
    matches!(
        command,
        "info"
            | "format"
            | "read-sector"
            | "fs-info"
            | "dir"
            | "ls"
            | "fs-read"
            | "fs-export"
            | "fs-add"
            | "fs-delete"
            | "fs-rename"
            | "fs-lock"
            | "fs-unlock"
            | "lock"
            | "unlock"
            | "map"
            | "save"
    )
}

/// Commands working on the current image
fn run_image_command(command: &str, parts: &[String], disk: &SharedDisk) {
    let mut img = lock_disk(disk);

    match command {
        "info" => print_info(&img),
        "format" => {
            let geometry = match parts.get(1) {
                Some(name) => match DiskGeometry::from_name(name) {
                    Some(geometry) => geometry,
                    None => {
                        println!("Usage: format [single|enhanced|double]");
                        return;
                    }
                },
                None => img.geometry(),
            };
            match Dos2FileSystemMut::from_image_mut(&mut img).format(geometry) {
                Ok(()) => println!("Formatted as {} DOS 2", geometry.name()),
                Err(e) => println!("Error: {}", e),
            }
        }
        "read-sector" => {
            let Some(number) = parts.get(1).and_then(|s| parse_number(s)) else {
                println!("Usage: read-sector <number>");
                return;
            };
            match img.sector(number) {
                Some(data) => {
                    println!("Sector {} ({} bytes):", number, data.len());
                    print_hex_dump(data, 256);
                }
                None => println!("Error: {}", AtrError::InvalidSector(number)),
            }
        }
        "fs-info" => {
            let info = Dos2FileSystem::from_image(&img).info();
            println!("{} filesystem (DOS code {})", info.fs_type, info.dos_code);
            println!("Sector size: {} bytes", info.sector_size);
            println!("Total sectors: {}", info.total_sectors);
            println!("Free sectors: {}", info.free_sectors);
            println!("Free space: {} bytes", info.bytes_available);
        }
        "dir" | "ls" => list_directory(&img),
        "fs-read" => {
            let Some(name) = parts.get(1) else {
                println!("Usage: fs-read <filename>");
                return;
            };
            match Dos2FileSystem::from_image(&img).read_file(name) {
                Ok(data) => {
                    println!("File: {} ({} bytes)", name, data.len());
                    print_hex_dump(&data, 256);
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        "fs-export" => {
            let Some(name) = parts.get(1) else {
                println!("Usage: fs-export <filename> [output_path]");
                return;
            };
            let output_path = parts.get(2).unwrap_or(name);
            match Dos2FileSystem::from_image(&img).read_file(name) {
                Ok(data) => match std::fs::write(output_path, &data) {
                    Ok(()) => println!("Exported {} ({} bytes) to {}", name, data.len(), output_path),
                    Err(e) => println!("Error writing file: {}", e),
                },
                Err(e) => println!("Error: {}", e),
            }
        }
        "fs-add" => {
            let Some(path) = parts.get(1) else {
                println!("Usage: fs-add <host_path> [name]");
                return;
            };
            let name = parts.get(2).cloned().unwrap_or_else(|| {
                std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.clone())
            });
            let contents = match std::fs::read(path) {
                Ok(contents) => contents,
                Err(e) => {
                    println!("Error reading file: {}", e);
                    return;
                }
            };
            match Dos2FileSystemMut::from_image_mut(&mut img).add_file(&name, &contents) {
                Ok(entry) => println!(
                    "Added {} as #{} ({} sectors from {})",
                    entry.name, entry.file_number, entry.sectors, entry.start
                ),
                Err(e) => println!("Error: {}", e),
            }
        }
        "fs-delete" | "fs-rename" | "fs-lock" | "fs-unlock" => {
            let Some(name) = parts.get(1) else {
                println!("Usage: {} <filename>{}", command, if command == "fs-rename" { " <new_name>" } else { "" });
                return;
            };
            let Some(file_number) = Dos2FileSystem::from_image(&img).find_file(name) else {
                println!("Error: {}", AtrError::FileNotFound(name.clone()));
                return;
            };

            let mut fs = Dos2FileSystemMut::from_image_mut(&mut img);
            let result = match command {
                "fs-delete" => fs
                    .delete(file_number)
                    .map(|freed| format!("Deleted {} ({} sectors freed)", name, freed)),
                "fs-rename" => match parts.get(2) {
                    Some(new_name) => fs
                        .rename(file_number, new_name)
                        .map(|_| format!("Renamed {} to {}", name, new_name)),
                    None => Ok("Usage: fs-rename <filename> <new_name>".to_string()),
                },
                "fs-lock" => fs
                    .set_file_locked(file_number, true)
                    .map(|_| format!("Locked {}", name)),
                _ => fs
                    .set_file_locked(file_number, false)
                    .map(|_| format!("Unlocked {}", name)),
            };
            match result {
                Ok(message) => println!("{}", message),
                Err(e) => println!("Error: {}", e),
            }
        }
        "lock" => {
            img.set_locked(true);
            println!("Disk locked");
        }
        "unlock" => {
            img.set_locked(false);
            println!("Disk unlocked");
        }
        "map" => draw_free_map(&img),
        "save" => {
            let path = match parts.get(1).cloned().or_else(|| img.filename().map(String::from)) {
                Some(path) => path,
                None => {
                    println!("Usage: save <path>");
                    return;
                }
            };
            match img.save(&path) {
                Ok(()) => println!("Saved: {}", path),
                Err(e) => println!("Error: {}", e),
            }
        }
        _ => {}
    }
}

/// Commands working on the drive table and serial device
fn run_device_command(
    command: &str,
    parts: &[String],
    drives: &DriveTable,
    server: &mut Option<Server>,
    disk: Option<&SharedDisk>,
) {
    match command {
        "mount" => {
            let Some(disk) = disk else {
                println!("No image loaded. Use 'open <path>' or 'create' first.");
                return;
            };
            let drive = match parts.get(1).and_then(|s| parse_drive(s)) {
                Some(drive) => drive,
                None => {
                    println!("Usage: mount <1-{}>", DRIVE_COUNT);
                    return;
                }
            };
            match drives.mount(disk.clone(), drive) {
                Ok(()) => println!("Mounted in D{}", drive + 1),
                Err(e) => println!("Error: {}", e),
            }
        }
        "unmount" => {
            let unmounted = match parts.get(1).and_then(|s| parse_drive(s)) {
                Some(drive) => drives.disk(drive).and_then(|d| drives.unmount(&d)),
                None => disk.and_then(|d| drives.unmount(d)),
            };
            match unmounted {
                Some(drive) => println!("Unmounted D{}", drive + 1),
                None => println!("Nothing to unmount"),
            }
        }
        "drives" => list_drives(drives),
        "serve" => {
            if let Some(running) = server {
                println!("Already serving on {}. Use 'stop' first.", running.device);
                return;
            }
            let Some(target) = parts.get(1) else {
                println!("Usage: serve <device|auto> [length|status]");
                return;
            };
            let variant = match parts.get(2) {
                Some(name) => match ProtocolVariant::from_name(name) {
                    Some(variant) => variant,
                    None => {
                        println!("Unknown protocol variant: {}", name);
                        return;
                    }
                },
                None => ProtocolVariant::default(),
            };
            match Server::start(target, variant, drives) {
                Ok(started) => {
                    println!("Serving drives on {} ({})", started.device, variant);
                    *server = Some(started);
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        "stop" => match server.take() {
            Some(running) => {
                let device = running.device.clone();
                running.stop();
                println!("Stopped serving on {}", device);
            }
            None => println!("Not serving."),
        },
        _ => {
            println!("Unknown command: {}. Type 'help' for available commands.", command);
        }
    }
}

/// Print mount and disk changes published since the last prompt
fn report_events(events: &Receiver<DeviceEvent>) {
    for event in events.try_iter() {
        match event {
            DeviceEvent::MountChanged => {}
            DeviceEvent::DiskChanged {
                drive,
                sector: Some(sector),
            } => println!("[D{}] sector {} written", drive + 1, sector),
            DeviceEvent::DiskChanged { drive, sector: None } => {
                println!("[D{}] disk formatted", drive + 1)
            }
        }
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  open <path>                    - Open an ATR image file (use quotes for paths with spaces)");
    println!("  create [single|enhanced|double] - Create a new blank image");
    println!("  format [single|enhanced|double] - Write an empty DOS 2 filesystem");
    println!("  info                           - Show image information");
    println!("  read-sector <number>           - Read and display a sector");
    println!("  fs-info                        - Show filesystem information");
    println!("  dir                            - List files on disk (ls)");
    println!("  fs-read <filename>             - Read and hex dump file from disk");
    println!("  fs-export <file> [output_path] - Export file from disk to host filesystem");
    println!("  fs-add <host_path> [name]      - Add a host file to the disk");
    println!("  fs-delete <file>               - Delete a file");
    println!("  fs-rename <file> <new_name>    - Rename a file");
    println!("  fs-lock / fs-unlock <file>     - Set or clear a file's lock flag");
    println!("  lock / unlock                  - Write-protect the whole image");
    println!("  map                            - Visual sector map (white=used, red=system, yellow=free with data)");
    println!("  save [path]                    - Save image to file");
    println!("  mount <1-8>                    - Put the current image in drive D1-D8");
    println!("  unmount [1-8]                  - Remove the current image, or a drive's image");
    println!("  drives                         - List mounted drives");
    println!("  serve <device|auto> [length|status] - Serve the drives on a serial device");
    println!("  stop                           - Stop serving");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(image: &DiskImage) {
    println!("File: {}", image.filename().unwrap_or("(unsaved)"));
    println!("Geometry: {}", image.geometry().name());
    println!("Sectors: {} x {} bytes", image.sector_count(), image.sector_size());
    println!("Size: {} bytes", image.size());
    println!("Locked: {}", if image.is_locked() { "Yes" } else { "No" });
    println!("Modified: {}", if image.is_changed() { "Yes" } else { "No" });

    let fs = Dos2FileSystem::from_image(image);
    if fs.is_dos2() {
        println!(
            "Filesystem: DOS 2 ({} files, {} free sectors)",
            fs.directory().len(),
            fs.free_sector_count()
        );
    } else {
        println!("Filesystem: none detected");
    }
}

fn list_directory(image: &DiskImage) {
    let fs = Dos2FileSystem::from_image(image);
    if !fs.is_dos2() {
        println!("Error: {}", AtrError::NotDos2);
        return;
    }

    let entries = fs.directory();
    if entries.is_empty() {
        println!("No files found.");
    } else {
        println!(
            "{:<12} {:>3} {:>5} {:>4} {:>5} {:>3}",
            "Name", "Idx", "Flags", "Secs", "Start", "Lck"
        );
        println!("{}", "-".repeat(38));
        for entry in entries {
            println!(
                "{:<12} {:>3} {:>5} {:>4} {:>5} {:>3}",
                entry.name,
                entry.file_number,
                format!("{:02X}", entry.flags),
                entry.sectors,
                entry.start,
                if entry.attributes.locked { "*" } else { "" }
            );
        }
    }
    println!("{} free sectors", fs.free_sector_count());
}

fn list_drives(drives: &DriveTable) {
    for drive in 0..DRIVE_COUNT {
        match drives.disk(drive) {
            Some(disk) => {
                let img = lock_disk(&disk);
                println!(
                    "D{}: {} [{}]",
                    drive + 1,
                    img.filename().unwrap_or("(unsaved)"),
                    DriveStatus::for_disk(&img)
                );
            }
            None => println!("D{}: -", drive + 1),
        }
    }
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        // Pad if less than 16 bytes
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");

        // Atari inverse video characters print as their normal form
        for byte in chunk {
            let b = byte & 0x7F;
            let c = if (32..127).contains(&b) { b as char } else { '.' };
            print!("{}", c);
        }

        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}

fn parse_number(s: &str) -> Option<usize> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Parse "1".."8" or "D1".."D8" into a drive index
fn parse_drive(s: &str) -> Option<usize> {
    let digits = s.trim_start_matches(['D', 'd']).trim_end_matches(':');
    let number: usize = digits.parse().ok()?;
    (1..=DRIVE_COUNT).contains(&number).then(|| number - 1)
}
