//=========================================================================
// Core
//
// Main-thread / core-thread coordination for the application shell.
//
// Responsibilities:
// - Pace the main loop (simulate → callback → dispatch)
// - Run render work on a dedicated core thread, one frame in flight
// - Signal frame completion from the core thread back to the main loop
// - Define the collaborator interfaces the shell drives
//
// Notes:
// Only two threads matter here: the main thread running `MainLoop` and
// the core thread owning the `Renderer`. They share exactly two things:
// the `RunState` flag (atomic) and the `FrameSignal` (single-slot
// channel). Render work crosses over as `FramePacket`s.
//
//=========================================================================

//=== Module Declarations =================================================

mod core_thread;
mod frame_event;
mod frame_signal;
mod main_loop;
mod subsystems;

//=== Public API ==========================================================

pub use core_thread::{
    CommandQueue, CoreThreadError, FramePacket, FrameStats, FrameStatsSnapshot, RenderCommand,
};
pub use frame_event::{CallbackError, CallbackId, CallbackResult, FrameEvent};
pub use frame_signal::FrameSignal;
pub use main_loop::{FrameHooks, LoopState, MainLoop, RunState, StopHandle};
pub use subsystems::{
    InputBackend, PrimaryWindow, RenderWindow, Renderer, SceneManager, SubsystemError,
    WindowError, WindowFactory,
};

//=== Internal API ========================================================

pub(crate) use core_thread::CoreThread;
