/// Drive slot table
///
/// Eight slots, D1 to D8, each holding at most one disk. A disk may sit
/// in only one slot at a time; identity is the shared handle, not the
/// image contents. The table is cheap to clone and every clone sees the
/// same slots, so the console and a running device can share it.

use crate::error::{AtrError, Result};
use crate::image::DiskImage;
use log::{debug, info};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Number of drive slots
pub const DRIVE_COUNT: usize = 8;

/// A disk image shared between the console and the drive table
pub type SharedDisk = Arc<Mutex<DiskImage>>;

/// Wrap an image for mounting
pub fn share(image: DiskImage) -> SharedDisk {
    Arc::new(Mutex::new(image))
}

/// Lock a shared disk, recovering the image if a holder panicked
pub fn lock_disk(disk: &SharedDisk) -> MutexGuard<'_, DiskImage> {
    disk.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Notifications published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A slot was filled or emptied
    MountChanged,
    /// The host changed a mounted disk
    DiskChanged {
        /// Drive index
        drive: usize,
        /// Sector written, or `None` for a format
        sector: Option<usize>,
    },
}

#[derive(Default)]
struct Slots {
    disks: [Option<SharedDisk>; DRIVE_COUNT],
    listeners: Vec<Sender<DeviceEvent>>,
}

impl Slots {
    fn index_of(&self, disk: &SharedDisk) -> Option<usize> {
        self.disks
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|d| Arc::ptr_eq(d, disk)))
    }

    fn notify(&mut self, event: DeviceEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }
}

/// Shared table of mounted disks
#[derive(Clone, Default)]
pub struct DriveTable {
    slots: Arc<Mutex<Slots>>,
}

impl DriveTable {
    /// Create a table with all drives empty
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put a disk in a drive
    ///
    /// The disk is first removed from any other drive. Mounting a disk
    /// where it already is does nothing.
    pub fn mount(&self, disk: SharedDisk, drive: usize) -> Result<()> {
        if drive >= DRIVE_COUNT {
            return Err(AtrError::InvalidDrive(drive as u8));
        }

        let mut slots = self.lock();
        match slots.index_of(&disk) {
            Some(existing) if existing == drive => return Ok(()),
            Some(existing) => slots.disks[existing] = None,
            None => {}
        }

        slots.disks[drive] = Some(disk);
        info!("Mounted disk in D{}", drive + 1);
        slots.notify(DeviceEvent::MountChanged);
        Ok(())
    }

    /// Remove a disk from whichever drive holds it
    ///
    /// Returns the drive it was in.
    pub fn unmount(&self, disk: &SharedDisk) -> Option<usize> {
        let mut slots = self.lock();
        let drive = slots.index_of(disk)?;
        slots.disks[drive] = None;
        info!("Unmounted disk from D{}", drive + 1);
        slots.notify(DeviceEvent::MountChanged);
        Some(drive)
    }

    /// Disk in a drive
    pub fn disk(&self, drive: usize) -> Option<SharedDisk> {
        self.lock().disks.get(drive).cloned().flatten()
    }

    /// Drive holding a disk
    pub fn drive_of(&self, disk: &SharedDisk) -> Option<usize> {
        self.lock().index_of(disk)
    }

    /// All occupied drives in order
    pub fn mounted(&self) -> Vec<(usize, SharedDisk)> {
        self.lock()
            .disks
            .iter()
            .enumerate()
            .filter_map(|(drive, slot)| slot.clone().map(|disk| (drive, disk)))
            .collect()
    }

    /// Receive mount and disk change events from now on
    pub fn subscribe(&self) -> Receiver<DeviceEvent> {
        let (sender, receiver) = channel();
        self.lock().listeners.push(sender);
        receiver
    }

    /// Publish an event to subscribers
    pub(crate) fn notify(&self, event: DeviceEvent) {
        debug!("{:?}", event);
        self.lock().notify(event);
    }
}
