//=========================================================================
// Subsystem Interfaces
//=========================================================================
//
// Contracts for the collaborators the application drives but does not
// implement: renderer, input backend, scene manager, window factory.
//
// Thread placement:
//   Renderer      → moved to the core thread at start-up (must be Send)
//   InputBackend  → main thread, polled once per simulation step
//   SceneManager  → main thread, advanced once per simulation step
//   WindowFactory → main thread, used once during start-up
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::Arc;

//=== Internal Dependencies ===============================================

use crate::config::{StartupConfig, WindowDesc};
use crate::plugin::PluginEntry;

//=== Windows =============================================================

/// A render target surface usable as the primary window.
pub trait RenderWindow: Send + Sync {
    /// Stable identifier used by windowing and input integration.
    fn id(&self) -> u64;

    /// Descriptor the window was created from.
    fn desc(&self) -> &WindowDesc;
}

/// Shared handle to the primary window.
///
/// Held by the application and the renderer; the window is destroyed when
/// the last holder releases it.
pub type PrimaryWindow = Arc<dyn RenderWindow>;

/// Creates windows from descriptors.
pub trait WindowFactory {
    fn open_window(&self, desc: &WindowDesc) -> Result<PrimaryWindow, WindowError>;
}

//=== Renderer ============================================================

/// Renderer running on the core thread.
pub trait Renderer: Send {
    /// Called on the main thread once the primary window exists, before
    /// the renderer is moved to the core thread.
    fn start_up(
        &mut self,
        _config: &StartupConfig,
        _window: &PrimaryWindow,
    ) -> Result<(), SubsystemError> {
        Ok(())
    }

    /// Renders one frame. Called on the core thread after that frame's
    /// queued render commands have run.
    fn render_frame(&mut self, frame: u64) -> Result<(), SubsystemError>;

    /// Called on the core thread when it shuts down.
    fn shut_down(&mut self) {}
}

//=== InputBackend ========================================================

/// Input backend polled once per simulation step.
pub trait InputBackend {
    fn start_up(&mut self, _backend: &str) -> Result<(), SubsystemError> {
        Ok(())
    }

    fn poll(&mut self);

    fn shut_down(&mut self) {}
}

//=== SceneManager ========================================================

/// Scene manager advanced once per simulation step.
///
/// Bound at start-up to the entry point of the scene-manager plugin.
pub trait SceneManager {
    fn start_up(&mut self, _plugin: &str, _entry: PluginEntry) -> Result<(), SubsystemError> {
        Ok(())
    }

    fn update(&mut self);

    fn shut_down(&mut self) {}
}

//=== Errors ==============================================================

/// Failure reported by a collaborator subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemError {
    subsystem: String,
    message: String,
}

impl SubsystemError {
    /// Creates an error for the named subsystem.
    pub fn new(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }

    /// Name of the failing subsystem.
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SubsystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subsystem, self.message)
    }
}

impl std::error::Error for SubsystemError {}

/// Window creation failure reported by a [`WindowFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowError {
    message: String,
}

impl WindowError {
    /// Creates a window error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Window creation failed: {}", self.message)
    }
}

impl std::error::Error for WindowError {}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsystem_error_display_format() {
        let err = SubsystemError::new("renderer", "device lost");
        assert_eq!(err.to_string(), "renderer: device lost");
        assert_eq!(err.subsystem(), "renderer");
        assert_eq!(err.message(), "device lost");
    }

    #[test]
    fn window_error_display_format() {
        let err = WindowError::new("no display");
        assert_eq!(err.to_string(), "Window creation failed: no display");
    }

    #[test]
    fn errors_are_error_trait() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<SubsystemError>();
        assert_error::<WindowError>();
    }
}
