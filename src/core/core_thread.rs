//=========================================================================
// Core Thread
//=========================================================================
//
// Dedicated render thread. Owns the renderer for the lifetime of a
// session and executes one FramePacket at a time.
//
// Architecture:
// ```text
//  Main Thread                         Core Thread
//  ┌────────────────────┐              ┌──────────────────────────┐
//  │ CommandQueue       │              │ recv CoreMessage         │
//  │  └─ queue(cmd)     │   bounded    │  ├─ Frame(packet)        │
//  │ dispatch()         │ ───────────> │  │   ├─ run commands     │
//  │  └─ FramePacket    │              │  │   ├─ render_frame()   │
//  └────────────────────┘              │  │   └─ signal.notify()  │
//           ↑                          │  └─ Shutdown → exit      │
//           └──── FrameSignal ──────── └──────────────────────────┘
// ```
//
// A frame that fails or panics still notifies the FrameSignal; it counts
// as completed for pipelining purposes.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, trace};

//=== Internal Dependencies ===============================================

use super::{FrameSignal, Renderer};

//=== Render Work =========================================================

/// A deferred call executed on the core thread with the renderer.
pub type RenderCommand = Box<dyn FnOnce(&mut dyn Renderer) + Send>;

/// Render work for one frame.
pub struct FramePacket {
    pub index: u64,
    pub commands: Vec<RenderCommand>,
}

impl fmt::Debug for FramePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePacket")
            .field("index", &self.index)
            .field("commands", &self.commands.len())
            .finish()
    }
}

//=== CommandQueue ========================================================

/// Main-thread handle for queuing render commands into the current frame.
///
/// Cloning shares the queue. Commands queued before a frame is dispatched
/// run on the core thread before that frame's `render_frame`.
#[derive(Clone, Default)]
pub struct CommandQueue {
    pending: Arc<Mutex<Vec<RenderCommand>>>,
}

impl CommandQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a command for the frame currently being built.
    pub fn queue<F>(&self, command: F)
    where
        F: FnOnce(&mut dyn Renderer) + Send + 'static,
    {
        self.lock().push(Box::new(command));
    }

    /// Takes every pending command, leaving the queue empty.
    pub(crate) fn take(&self) -> Vec<RenderCommand> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of commands waiting for the next frame.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RenderCommand>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//=== FrameStats ==========================================================

/// Frame counters maintained around each frame on the core thread.
#[derive(Debug, Default)]
pub struct FrameStats {
    submitted: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
    last_frame_nanos: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub frames_submitted: u64,
    pub frames_rendered: u64,
    pub frames_failed: u64,
    pub last_frame_time: Duration,
}

impl FrameStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a frame about to be sent to the core thread. Called before
    /// the send so `rendered` never runs ahead of `submitted`.
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes back a [`FrameStats::record_submitted`] whose send failed.
    pub(crate) fn retract_submitted(&self) {
        self.submitted.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_rendered(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.last_frame_nanos.store(nanos, Ordering::Relaxed);
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the current counters.
    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            frames_submitted: self.submitted.load(Ordering::Relaxed),
            frames_rendered: self.rendered.load(Ordering::Relaxed),
            frames_failed: self.failed.load(Ordering::Relaxed),
            last_frame_time: Duration::from_nanos(self.last_frame_nanos.load(Ordering::Relaxed)),
        }
    }
}

//=== CoreThreadError =====================================================

/// Core thread lifecycle errors.
#[derive(Debug)]
pub enum CoreThreadError {
    /// The OS refused to create the thread.
    Spawn(std::io::Error),

    /// The core thread is no longer receiving work.
    Disconnected,

    /// The core thread panicked outside of frame rendering.
    Panicked,
}

impl fmt::Display for CoreThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "Core thread spawn failed: {}", e),
            Self::Disconnected => write!(f, "Core thread is not accepting work"),
            Self::Panicked => write!(f, "Core thread panicked"),
        }
    }
}

impl std::error::Error for CoreThreadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

//=== CoreThread ==========================================================

enum CoreMessage {
    Frame(FramePacket),
    Shutdown,
}

// One frame in flight plus the shutdown message.
const CHANNEL_CAPACITY: usize = 2;

/// Handle to the running core thread.
pub(crate) struct CoreThread {
    sender: Sender<CoreMessage>,
    handle: JoinHandle<Box<dyn Renderer>>,
}

impl CoreThread {
    //--- Construction -----------------------------------------------------

    /// Spawns the core thread, moving the renderer onto it.
    pub(crate) fn spawn(
        renderer: Box<dyn Renderer>,
        signal: FrameSignal,
        stats: Arc<FrameStats>,
    ) -> Result<Self, CoreThreadError> {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);

        let handle = thread::Builder::new()
            .name("core".into())
            .spawn(move || Self::run(renderer, receiver, signal, stats))
            .map_err(CoreThreadError::Spawn)?;

        info!(target: "core", "Core thread spawned");
        Ok(Self { sender, handle })
    }

    //--- Main Thread API --------------------------------------------------

    /// Hands a frame to the core thread without waiting for it.
    pub(crate) fn submit(&self, packet: FramePacket) -> Result<(), CoreThreadError> {
        self.sender
            .send(CoreMessage::Frame(packet))
            .map_err(|_| CoreThreadError::Disconnected)
    }

    /// Stops the thread after queued frames and returns the renderer.
    pub(crate) fn shut_down(self) -> Result<Box<dyn Renderer>, CoreThreadError> {
        if self.sender.send(CoreMessage::Shutdown).is_err() {
            debug!(target: "core", "Core thread already stopped");
        }

        self.handle.join().map_err(|_| CoreThreadError::Panicked)
    }

    //--- Core Thread ------------------------------------------------------

    fn run(
        mut renderer: Box<dyn Renderer>,
        receiver: Receiver<CoreMessage>,
        signal: FrameSignal,
        stats: Arc<FrameStats>,
    ) -> Box<dyn Renderer> {
        debug!(target: "core", "Core thread running");

        while let Ok(message) = receiver.recv() {
            match message {
                CoreMessage::Frame(packet) => {
                    Self::render(renderer.as_mut(), packet, &stats);
                    signal.notify();
                }
                CoreMessage::Shutdown => break,
            }
        }

        renderer.shut_down();
        info!(target: "core", "Core thread exiting");
        renderer
    }

    fn render(renderer: &mut dyn Renderer, packet: FramePacket, stats: &FrameStats) {
        let FramePacket { index, commands } = packet;
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for command in commands {
                command(&mut *renderer);
            }
            renderer.render_frame(index)
        }));

        match outcome {
            Ok(Ok(())) => {
                let elapsed = started.elapsed();
                trace!(target: "core", "Frame {} rendered in {:?}", index, elapsed);
                stats.record_rendered(elapsed);
            }
            Ok(Err(e)) => {
                error!(target: "core", "Frame {} failed: {}", index, e);
                stats.record_failed();
            }
            Err(_) => {
                error!(target: "core", "Frame {} panicked", index);
                stats.record_failed();
            }
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
