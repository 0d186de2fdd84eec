/// Command dispatcher
///
/// Turns a verified frame into sector operations on the mounted disks and
/// a plan of replies. Nothing here touches the transport, so every command
/// can be exercised directly.

use crate::error::{AtrError, Result};
use crate::filesystem::Dos2FileSystemMut;
use crate::format::SINGLE_DENSITY_SECTOR_SIZE;
use crate::sio::command::{Command, OFFSET_QUERY, READ_CHUNK_SIZE};
use crate::sio::drives::{lock_disk, DeviceEvent, DriveTable, SharedDisk};
use crate::sio::reply::{ReplyCode, ReplyPlan, ReplyTiming};
use crate::sio::status::{configuration_block, DriveStatus};
use log::{debug, info, warn};

/// Executes commands against a drive table
#[derive(Clone)]
pub struct Dispatcher {
    drives: DriveTable,
    timing: ReplyTiming,
}

impl Dispatcher {
    /// Create a dispatcher over a drive table
    pub fn new(drives: DriveTable, timing: ReplyTiming) -> Self {
        Self { drives, timing }
    }

    /// The drive table
    pub fn drives(&self) -> &DriveTable {
        &self.drives
    }

    /// Handle one frame payload
    ///
    /// Every failure becomes an error reply; nothing propagates.
    pub fn dispatch(&self, frame: &[u8]) -> ReplyPlan {
        let result = Command::decode(frame).and_then(|command| self.execute(command));
        match result {
            Ok(plan) => plan,
            Err(e) => {
                warn!("{}", e);
                ReplyPlan::code(ReplyCode::Error)
            }
        }
    }

    /// Run a decoded command
    pub fn execute(&self, command: Command) -> Result<ReplyPlan> {
        match command {
            Command::Status { drive } => {
                let disk = self.mounted(drive)?;
                let status = DriveStatus::for_disk(&lock_disk(&disk));
                debug!("Sent drive {} status {}", drive, status);
                Ok(ReplyPlan::data(status.to_bytes().to_vec()))
            }
            Command::Read {
                drive,
                sector,
                offset,
            } => self.read(drive, sector, offset),
            Command::Write {
                drive,
                sector,
                data,
                verify,
            } => self.write(drive, sector, &data, verify),
            Command::Format { drive, geometry } => {
                let disk = self.mounted(drive)?;
                Dos2FileSystemMut::from_image_mut(&mut lock_disk(&disk)).format(geometry)?;
                self.drives.notify(DeviceEvent::DiskChanged {
                    drive,
                    sector: None,
                });
                info!("Formatted disk {} as {}", drive, geometry.name());
                Ok(ReplyPlan::acknowledge_then_complete(self.timing))
            }
            Command::ReadConfiguration { drive } => {
                let disk = self.mounted(drive)?;
                let geometry = lock_disk(&disk).geometry();
                Ok(ReplyPlan::data(configuration_block(geometry).to_vec()))
            }
            Command::WriteConfiguration { drive } => {
                self.mounted(drive)?;
                Ok(ReplyPlan::acknowledge_then_complete(self.timing))
            }
            Command::DebugInfo(text) => {
                info!("[firmware] {}", text.trim_end());
                Ok(ReplyPlan::none())
            }
        }
    }

    fn mounted(&self, drive: usize) -> Result<SharedDisk> {
        self.drives
            .disk(drive)
            .ok_or(AtrError::InvalidDrive(drive as u8))
    }

    fn read(&self, drive: usize, sector: usize, offset: u8) -> Result<ReplyPlan> {
        let disk = self.mounted(drive)?;
        let image = lock_disk(&disk);
        let data = image.sector(sector).ok_or(AtrError::InvalidSector(sector))?;
        if data.len() != SINGLE_DENSITY_SECTOR_SIZE {
            return Err(AtrError::SectorSizeMismatch {
                sector,
                expected: SINGLE_DENSITY_SECTOR_SIZE,
                actual: data.len(),
            });
        }

        if offset == OFFSET_QUERY {
            return Ok(ReplyPlan::code(ReplyCode::Acknowledge));
        }

        let start = offset as usize;
        let chunk = data
            .get(start..start + READ_CHUNK_SIZE)
            .ok_or(AtrError::InvalidOffset { sector, offset })?;
        Ok(ReplyPlan::data(chunk.to_vec()))
    }

    fn write(&self, drive: usize, sector: usize, data: &[u8], verify: bool) -> Result<ReplyPlan> {
        let disk = self.mounted(drive)?;
        {
            let mut image = lock_disk(&disk);
            if image.is_locked() {
                warn!("Disk {} is locked", drive);
                return Err(AtrError::DiskLocked);
            }
            if sector > image.sector_count() {
                warn!("Sector {} is beyond end of disk", sector);
                return Err(AtrError::InvalidSector(sector));
            }
            image.write_sector(sector, data)?;
        }

        self.drives.notify(DeviceEvent::DiskChanged {
            drive,
            sector: Some(sector),
        });
        if verify {
            info!("Wrote disk {}, sector {} with verify", drive, sector);
        } else {
            info!("Put disk {}, sector {}", drive, sector);
        }
        Ok(ReplyPlan::acknowledge_then_complete(self.timing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::is_dos2;
    use crate::format::DiskGeometry;
    use crate::image::DiskImage;
    use crate::sio::drives::share;
    use crate::sio::reply::Reply;

    fn setup() -> (Dispatcher, SharedDisk) {
        let drives = DriveTable::new();
        let mut image = DiskImage::new();
        let mut sector = vec![0u8; 128];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = i as u8;
        }
        image.write_sector(4, &sector).unwrap();
        image.mark_unchanged();

        let disk = share(image);
        drives.mount(disk.clone(), 0).unwrap();
        (Dispatcher::new(drives, ReplyTiming::default()), disk)
    }

    fn single(plan: &ReplyPlan) -> &Reply {
        assert_eq!(plan.steps().len(), 1);
        &plan.steps()[0].reply
    }

    fn write_frame(drive: u8, sector: u16, fill: u8, len: usize) -> Vec<u8> {
        let mut frame = vec![b'W', drive, (sector & 0xFF) as u8, (sector >> 8) as u8];
        frame.extend(std::iter::repeat(fill).take(len));
        frame
    }

    const ERROR: Reply = Reply::Code(ReplyCode::Error);

    #[test]
    fn test_status() {
        let (dispatcher, disk) = setup();
        let plan = dispatcher.dispatch(&[b'S', 0x31, 0, 0]);
        assert_eq!(single(&plan), &Reply::Data(vec![0x10, 0, 5, 0]));

        lock_disk(&disk).set_locked(true);
        let plan = dispatcher.dispatch(&[b'S', 0x31, 0, 0]);
        assert_eq!(single(&plan), &Reply::Data(vec![0x18, 0, 5, 0]));
    }

    #[test]
    fn test_status_empty_drive() {
        let (dispatcher, _) = setup();
        assert_eq!(single(&dispatcher.dispatch(&[b'S', 0x32, 0, 0])), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&[b'S', 0x39, 0, 0])), &ERROR);
    }

    #[test]
    fn test_read_chunks() {
        let (dispatcher, _) = setup();
        let plan = dispatcher.dispatch(&[b'R', 0x31, 4, 0, 0x20]);
        let expected: Vec<u8> = (0x20..0x40).collect();
        assert_eq!(single(&plan), &Reply::Data(expected));

        let plan = dispatcher.dispatch(&[b'R', 0x31, 4, 0, 0x60]);
        assert_eq!(single(&plan), &Reply::Data((0x60..0x80).collect()));
    }

    #[test]
    fn test_read_offset_query() {
        let (dispatcher, _) = setup();
        let plan = dispatcher.dispatch(&[b'R', 0x31, 0xD0, 0x02, 0xFF]);
        assert_eq!(single(&plan), &Reply::Code(ReplyCode::Acknowledge));

        // Sector 721 does not exist
        let plan = dispatcher.dispatch(&[b'R', 0x31, 0xD1, 0x02, 0xFF]);
        assert_eq!(single(&plan), &ERROR);
    }

    #[test]
    fn test_read_errors() {
        let (dispatcher, _) = setup();
        assert_eq!(single(&dispatcher.dispatch(&[b'R', 0x31, 0, 0, 0])), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&[b'R', 0x31, 4, 0, 0x61])), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&[b'R', 0x33, 4, 0, 0])), &ERROR);
    }

    #[test]
    fn test_read_double_density_sector() {
        let drives = DriveTable::new();
        drives
            .mount(share(DiskImage::with_geometry(DiskGeometry::double_density())), 0)
            .unwrap();
        let dispatcher = Dispatcher::new(drives, ReplyTiming::default());

        // Boot sectors are 128 bytes, the rest are not
        assert_ne!(single(&dispatcher.dispatch(&[b'R', 0x31, 1, 0, 0])), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&[b'R', 0x31, 4, 0, 0])), &ERROR);
    }

    #[test]
    fn test_write_sector() {
        let (dispatcher, disk) = setup();
        let events = dispatcher.drives().subscribe();

        let plan = dispatcher.dispatch(&write_frame(0x31, 10, 0x5A, 128));
        let steps = plan.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].reply, Reply::Code(ReplyCode::Acknowledge));
        assert_eq!(steps[1].reply, Reply::Code(ReplyCode::Complete));
        assert!(steps[1].delay > std::time::Duration::ZERO);

        let image = lock_disk(&disk);
        assert!(image.sector(10).unwrap().iter().all(|&b| b == 0x5A));
        assert!(image.is_changed());
        assert_eq!(
            events.try_recv().unwrap(),
            DeviceEvent::DiskChanged {
                drive: 0,
                sector: Some(10)
            }
        );
    }

    #[test]
    fn test_write_wrong_length_leaves_sector() {
        let (dispatcher, disk) = setup();
        for len in [127, 129, 0] {
            let plan = dispatcher.dispatch(&write_frame(0x31, 4, 0xEE, len));
            assert_eq!(single(&plan), &ERROR);
        }
        let image = lock_disk(&disk);
        assert_eq!(image.sector(4).unwrap()[5], 5);
        assert!(!image.is_changed());
    }

    #[test]
    fn test_write_rejections() {
        let (dispatcher, disk) = setup();
        assert_eq!(single(&dispatcher.dispatch(&write_frame(0x31, 721, 1, 128))), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&write_frame(0x31, 0, 1, 128))), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&write_frame(0x32, 5, 1, 128))), &ERROR);

        lock_disk(&disk).set_locked(true);
        assert_eq!(single(&dispatcher.dispatch(&write_frame(0x31, 5, 1, 128))), &ERROR);
        assert!(!lock_disk(&disk).is_changed());
    }

    #[test]
    fn test_put_sector() {
        let (dispatcher, disk) = setup();
        let events = dispatcher.drives().subscribe();
        let mut put = write_frame(0x31, 7, 0x11, 128);
        put[0] = b'P';

        let put_plan = dispatcher.dispatch(&put);
        let write_plan = dispatcher.dispatch(&write_frame(0x31, 8, 0x22, 128));
        assert_eq!(put_plan, write_plan);

        assert_eq!(lock_disk(&disk).sector(7).unwrap()[0], 0x11);
        assert_eq!(lock_disk(&disk).sector(8).unwrap()[0], 0x22);
        assert_eq!(events.try_iter().count(), 2);
    }

    #[test]
    fn test_format_commands() {
        let (dispatcher, disk) = setup();
        let plan = dispatcher.dispatch(&[b'"', 0x31, 0, 0]);
        assert_eq!(plan.steps().len(), 2);

        let image = lock_disk(&disk);
        assert_eq!(image.sector_count(), 1040);
        assert!(is_dos2(&image));
    }

    #[test]
    fn test_configuration() {
        let (dispatcher, _) = setup();
        let plan = dispatcher.dispatch(&[b'N', 0x31, 0, 0]);
        match single(&plan) {
            Reply::Data(block) => {
                assert_eq!(block.len(), 12);
                assert_eq!(block[3], 18);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dispatcher.dispatch(&[b'O', 0x31, 0, 0]).steps().len(), 2);
    }

    #[test]
    fn test_debug_and_unknown() {
        let (dispatcher, _) = setup();
        assert!(dispatcher.dispatch(b"\x01hello").is_empty());
        assert_eq!(single(&dispatcher.dispatch(&[b'?', 0x31, 0, 0])), &ERROR);
        assert_eq!(single(&dispatcher.dispatch(&[])), &ERROR);
    }
}
