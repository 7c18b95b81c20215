//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_app::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Application shell
pub use crate::application::{AppError, Application, Subsystems};
pub use crate::config::{StartupConfig, StartupConfigBuilder, WindowDesc};

// Collaborator interfaces
pub use crate::core::{
    InputBackend, PrimaryWindow, RenderWindow, Renderer, SceneManager, SubsystemError,
    WindowError, WindowFactory,
};

// Main loop control
pub use crate::core::{CommandQueue, FrameEvent, LoopState, StopHandle};

// Plugins
pub use crate::plugin::{PluginEntry, PluginError, PluginHandle, PluginRegistry};
