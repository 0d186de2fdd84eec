/// Serial transports
///
/// Inbound bytes are delivered on a channel handed out by `subscribe`,
/// in chunks as the transport sees them.

use crate::error::{AtrError, Result};
use log::{debug, info, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A duplex byte link to the drive adapter
pub trait SerialTransport: Send + 'static {
    /// Open the named device
    fn open(&mut self, device: &str) -> Result<()>;

    /// Close the link; further sends fail
    fn close(&mut self);

    /// Check whether the link is open
    fn is_open(&self) -> bool;

    /// Send bytes, failing with `TransportClosed` when not open
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Channel of inbound chunks, replacing any earlier subscriber
    fn subscribe(&mut self) -> UnboundedReceiver<Vec<u8>>;
}

/// Find a device node under /dev whose name starts with `prefix`
pub fn find_device(prefix: &str) -> Option<String> {
    find_device_in(Path::new("/dev"), prefix)
}

fn find_device_in(dir: &Path, prefix: &str) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();
    names
        .first()
        .map(|name| dir.join(name).display().to_string())
}

#[derive(Default)]
struct MemoryState {
    open: bool,
    device: Option<String>,
    sent: Vec<u8>,
    inbound: Option<UnboundedSender<Vec<u8>>>,
}

/// In-process loopback transport
///
/// Clones share state, so a test can keep one handle to inject bytes and
/// inspect what was sent while the device owns another.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Create a closed transport
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver bytes as if they arrived from the wire
    ///
    /// Returns false if nobody is listening or the transport is closed.
    pub fn inject(&self, data: &[u8]) -> bool {
        let state = self.state();
        match (&state.inbound, state.open) {
            (Some(sender), true) => sender.send(data.to_vec()).is_ok(),
            _ => false,
        }
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<u8> {
        self.state().sent.clone()
    }

    /// Take and clear everything sent so far
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().sent)
    }

    /// Name passed to the last `open`
    pub fn device(&self) -> Option<String> {
        self.state().device.clone()
    }
}

impl SerialTransport for MemoryTransport {
    fn open(&mut self, device: &str) -> Result<()> {
        let mut state = self.state();
        state.open = true;
        state.device = Some(device.to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.open = false;
        state.inbound = None;
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(AtrError::TransportClosed);
        }
        state.sent.extend_from_slice(data);
        Ok(())
    }

    fn subscribe(&mut self) -> UnboundedReceiver<Vec<u8>> {
        let (sender, receiver) = unbounded_channel();
        self.state().inbound = Some(sender);
        receiver
    }
}

/// Read timeout, bounding how long `close` waits for the reader thread
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Reader thread for one open port
struct Reader {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Reader {
    fn spawn(
        mut port: Box<dyn SerialPort>,
        inbound: Arc<Mutex<Option<UnboundedSender<Vec<u8>>>>>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            let mut buffer = [0u8; 256];
            while !stopped.load(Ordering::SeqCst) {
                match port.read(&mut buffer) {
                    Ok(0) => {
                        info!("Serial device hung up");
                        break;
                    }
                    Ok(n) => {
                        let guard = inbound.lock().unwrap_or_else(|p| p.into_inner());
                        if let Some(sender) = guard.as_ref() {
                            let _ = sender.send(buffer[..n].to_vec());
                        }
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                        ) =>
                    {
                        continue
                    }
                    Err(e) => {
                        warn!("Serial read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Serial reader stopped");
        });

        Self { stop, thread }
    }

    /// Stop the thread and wait for it to let go of the port
    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if self.thread.join().is_err() {
            warn!("Serial reader panicked");
        }
    }
}

/// A serial device opened at a fixed bitrate, 8N1, no flow control
///
/// Each open gets its own reader thread forwarding inbound chunks to the
/// subscriber; `close` stops it before returning.
pub struct TtyTransport {
    bitrate: u32,
    port: Option<Box<dyn SerialPort>>,
    device: Option<String>,
    reader: Option<Reader>,
    inbound: Arc<Mutex<Option<UnboundedSender<Vec<u8>>>>>,
}

impl TtyTransport {
    /// Create a closed transport for the given bitrate
    pub fn new(bitrate: u32) -> Self {
        Self {
            bitrate,
            port: None,
            device: None,
            reader: None,
            inbound: Arc::new(Mutex::new(None)),
        }
    }

    /// Path of the open device
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Bitrate used when opening
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Take over an already opened port
    fn attach(&mut self, port: Box<dyn SerialPort>, device: String) -> Result<()> {
        if self.is_open() {
            self.close();
        }

        let mut reader = port.try_clone()?;
        reader.set_timeout(READ_TIMEOUT)?;
        self.reader = Some(Reader::spawn(reader, Arc::clone(&self.inbound)));
        self.port = Some(port);
        self.device = Some(device);
        Ok(())
    }
}

impl SerialTransport for TtyTransport {
    fn open(&mut self, device: &str) -> Result<()> {
        let path = if device.starts_with('/') {
            device.to_string()
        } else {
            format!("/dev/{}", device)
        };

        let port = serialport::new(path.as_str(), self.bitrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        self.attach(port, path)?;

        info!(
            "Opened {} at {} baud",
            self.device.as_deref().unwrap_or(device),
            self.bitrate
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop();
        }
        if self.port.take().is_some() {
            info!("Closed {}", self.device.as_deref().unwrap_or("serial device"));
        }
        *self.inbound.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(AtrError::TransportClosed)?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn subscribe(&mut self) -> UnboundedReceiver<Vec<u8>> {
        let (sender, receiver) = unbounded_channel();
        *self.inbound.lock().unwrap_or_else(|p| p.into_inner()) = Some(sender);
        receiver
    }
}

impl Drop for TtyTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_send_requires_open() {
        let mut transport = MemoryTransport::new();
        assert!(matches!(transport.send(b"A"), Err(AtrError::TransportClosed)));

        transport.open("loop").unwrap();
        transport.send(b"AC").unwrap();
        assert_eq!(transport.sent(), b"AC");
        assert_eq!(transport.take_sent(), b"AC");
        assert!(transport.sent().is_empty());
        assert_eq!(transport.device().as_deref(), Some("loop"));
    }

    #[test]
    fn test_memory_inject() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();
        let mut inbound = transport.subscribe();

        assert!(!handle.inject(b"closed"));
        transport.open("loop").unwrap();
        assert!(handle.inject(&[1, 2, 3]));
        assert_eq!(inbound.try_recv().unwrap(), vec![1, 2, 3]);

        transport.close();
        assert!(!handle.inject(&[4]));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_find_device_in() {
        let dir = std::env::temp_dir().join(format!("atr-dev-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cu.usbmodem1461"), b"").unwrap();
        std::fs::write(dir.join("cu.usbmodem1401"), b"").unwrap();
        std::fs::write(dir.join("ttyS0"), b"").unwrap();

        let found = find_device_in(&dir, "cu.usbmodem").unwrap();
        assert!(found.ends_with("cu.usbmodem1401"));
        assert!(find_device_in(&dir, "ttyACM").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_tty_closed() {
        let mut transport = TtyTransport::new(19200);
        assert!(!transport.is_open());
        assert_eq!(transport.bitrate(), 19200);
        assert!(matches!(transport.send(b"A"), Err(AtrError::TransportClosed)));
        assert!(transport.open("/nonexistent/tty").is_err());
    }

    #[cfg(unix)]
    fn read_line(inbound: &mut UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
        let mut line = Vec::new();
        while !line.ends_with(b"\n") {
            line.extend(inbound.blocking_recv().unwrap());
        }
        line
    }

    #[cfg(unix)]
    #[test]
    fn test_tty_reopen_has_one_reader() {
        use serialport::TTYPort;

        let mut transport = TtyTransport::new(19200);
        let (mut first_host, first) = TTYPort::pair().unwrap();
        transport.attach(Box::new(first), "pty1".to_string()).unwrap();
        let mut inbound = transport.subscribe();

        first_host.write_all(b"one\n").unwrap();
        assert_eq!(read_line(&mut inbound), b"one\n");

        transport.close();
        assert!(!transport.is_open());
        assert!(transport.reader.is_none());
        assert!(inbound.blocking_recv().is_none());

        let (mut second_host, second) = TTYPort::pair().unwrap();
        transport.attach(Box::new(second), "pty2".to_string()).unwrap();
        let mut inbound = transport.subscribe();

        // Only the second port has a reader now
        let _ = first_host.write_all(b"stale\n");
        second_host.write_all(b"two\n").unwrap();
        assert_eq!(read_line(&mut inbound), b"two\n");
        assert_eq!(transport.device(), Some("pty2"));

        transport.close();
        assert!(transport.reader.is_none());
    }
}
