/// SIO drive device
///
/// Owns one serial link, the frame decoder and a dispatcher. Frames are
/// handled strictly in arrival order and so are their replies. Replies due
/// straight away are sent before `receive` returns, unless earlier delayed
/// replies are still waiting; then they queue up behind them. Delayed
/// replies are sent by a writer task with its own tokio runtime, so
/// `receive` works from plain threads and never waits on a delay.

use crate::error::{AtrError, Result};
use crate::sio::config::DeviceConfig;
use crate::sio::dispatcher::Dispatcher;
use crate::sio::drives::DriveTable;
use crate::sio::frame::FrameDecoder;
use crate::sio::reply::ReplyPlan;
use crate::sio::transport::SerialTransport;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, Receiver, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// An emulated drive bank on a serial link
pub struct SioDevice<T: SerialTransport> {
    transport: Arc<Mutex<T>>,
    decoder: FrameDecoder,
    dispatcher: Dispatcher,
    config: DeviceConfig,
    replies: Option<ReplyQueue>,
}

fn lock_transport<T>(transport: &Mutex<T>) -> MutexGuard<'_, T> {
    transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outbound replies waiting on a delay, sent one after another
///
/// Each step's delay counts from the send before it. Dropping the queue
/// discards whatever has not gone out yet.
struct ReplyQueue {
    steps: UnboundedSender<(Duration, Vec<u8>)>,
    pending: Arc<AtomicUsize>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ReplyQueue {
    fn start<T: SerialTransport>(transport: Arc<Mutex<T>>) -> Result<Self> {
        let (steps, mut queued) = unbounded_channel::<(Duration, Vec<u8>)>();
        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let pending = Arc::new(AtomicUsize::new(0));
        let sent = Arc::clone(&pending);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        thread::Builder::new()
            .name("sio-replies".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        let (delay, bytes) = tokio::select! {
                            _ = &mut cancelled => break,
                            step = queued.recv() => match step {
                                Some(step) => step,
                                None => break,
                            },
                        };
                        tokio::select! {
                            _ = &mut cancelled => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        let result = lock_transport(&transport).send(&bytes);
                        match result {
                            Ok(()) => {}
                            Err(AtrError::TransportClosed) => debug!("Dropped delayed reply"),
                            Err(e) => warn!("Delayed reply failed: {}", e),
                        }
                        sent.fetch_sub(1, Ordering::SeqCst);
                    }
                    debug!("Reply writer stopped");
                });
            })?;

        Ok(Self {
            steps,
            pending,
            cancel: Some(cancel),
        })
    }

    /// Nothing queued or in flight
    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    fn push(&self, delay: Duration, bytes: Vec<u8>) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.steps.send((delay, bytes)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ReplyQueue {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl<T: SerialTransport> SioDevice<T> {
    /// Create a closed device serving the given drive table
    pub fn new(transport: T, drives: DriveTable, config: DeviceConfig) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            decoder: FrameDecoder::new(config.idle_timeout),
            dispatcher: Dispatcher::new(drives, config.timing),
            config,
            replies: None,
        }
    }

    /// The drive table being served
    pub fn drives(&self) -> &DriveTable {
        self.dispatcher.drives()
    }

    /// Settings in use
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Open the link and start listening
    ///
    /// Returns the channel of inbound chunks to pass to [`SioDevice::run`].
    pub fn open(&mut self, device: &str) -> Result<UnboundedReceiver<Vec<u8>>> {
        self.replies = None;
        let inbound = {
            let mut transport = lock_transport(&self.transport);
            transport.open(device)?;
            transport.subscribe()
        };
        self.replies = Some(ReplyQueue::start(Arc::clone(&self.transport))?);
        self.decoder.reset();
        info!("Serving drives on {} ({})", device, self.config.variant);
        Ok(inbound)
    }

    /// Close the link, dropping any partial frame and pending replies
    pub fn close(&mut self) {
        self.replies = None;
        self.decoder.reset();

        let mut transport = lock_transport(&self.transport);
        if transport.is_open() {
            transport.close();
            info!("Serial link closed");
        }
    }

    /// Check whether the link is open
    pub fn is_open(&self) -> bool {
        lock_transport(&self.transport).is_open()
    }

    /// Process a chunk of inbound bytes received at `now`
    ///
    /// Bad frames and bad commands are answered or dropped; the only
    /// error returned is a closed transport.
    pub fn receive(&mut self, data: &[u8], now: Instant) -> Result<()> {
        for frame in self.decoder.receive(data, now) {
            match frame {
                Ok(payload) => {
                    let plan = self.dispatcher.dispatch(&payload);
                    self.send_plan(plan)?;
                }
                Err(e) => debug!("Frame dropped: {}", e),
            }
        }
        Ok(())
    }

    /// Serve inbound chunks until the channel closes or `shutdown` fires
    pub async fn run(
        &mut self,
        mut inbound: UnboundedReceiver<Vec<u8>>,
        mut shutdown: Receiver<()>,
    ) {
        loop {
            tokio::select! {
                chunk = inbound.recv() => match chunk {
                    Some(data) => {
                        if let Err(e) = self.receive(&data, Instant::now()) {
                            warn!("{}", e);
                            break;
                        }
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        self.close();
    }

    fn send_plan(&mut self, plan: ReplyPlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let variant = self.config.variant;
        let mut steps = Vec::new();
        for step in plan.into_steps() {
            match variant.encode(&step.reply) {
                Ok(bytes) => steps.push((step.delay, bytes)),
                Err(e) => {
                    warn!("{}", e);
                    return Ok(());
                }
            }
        }

        let replies = self.replies.as_ref().ok_or(AtrError::TransportClosed)?;
        let mut steps = steps.into_iter().peekable();
        if replies.is_idle() {
            let mut transport = lock_transport(&self.transport);
            while let Some((_, bytes)) = steps.next_if(|(delay, _)| delay.is_zero()) {
                transport.send(&bytes)?;
            }
        }
        for (delay, bytes) in steps {
            replies.push(delay, bytes);
        }
        Ok(())
    }
}
