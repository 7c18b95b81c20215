//=========================================================================
// Frame Signal
//=========================================================================
//
// Single-slot "frame rendering finished" token shared by the main thread
// (consumer) and the core thread (producer).
//
// Architecture:
//   Core thread ──notify()──> [ () ] ──wait()──> Main thread
//                            bounded(1)
//
// Token present  = previous frame finished.
// Token consumed = a frame is (about to be) outstanding.
//
// The signal starts finished so the first frame can be dispatched without
// waiting.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{error, warn};

//=== FrameSignal =========================================================

/// Single-producer/single-consumer frame completion signal.
///
/// Cloning shares the same slot. Both channel ends live inside the signal,
/// so it can never become disconnected.
#[derive(Debug, Clone)]
pub struct FrameSignal {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl FrameSignal {
    /// Creates a signal in the finished state.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        let signal = Self { sender, receiver };
        signal.notify();
        signal
    }

    //--- Producer ---------------------------------------------------------

    /// Marks the outstanding frame as finished and wakes the waiter.
    ///
    /// Returns `false` if the signal was already finished, which means a
    /// frame was signalled twice.
    pub fn notify(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                warn!(target: "core", "Frame signalled while already finished");
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }

    //--- Consumer ---------------------------------------------------------

    /// Blocks until the outstanding frame has finished, then resets the
    /// signal.
    ///
    /// Blocks forever if nobody ever calls [`FrameSignal::notify`].
    pub fn wait(&self) {
        if self.receiver.recv().is_err() {
            error!(target: "core", "Frame signal disconnected");
        }
    }

    /// Like [`FrameSignal::wait`] but gives up after `timeout`.
    ///
    /// Returns `true` if the frame finished (and the signal was reset).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.receiver.recv_timeout(timeout).is_ok()
    }

    /// Waits for the outstanding frame and leaves the signal finished.
    ///
    /// Used when the main loop exits so no render work is left in flight.
    pub fn wait_idle(&self) {
        self.wait();
        self.notify();
    }

    /// Returns true if no frame is outstanding.
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
