//=========================================================================
// Platform Subsystem
//
// Winit binding for the primary window.
//
// Architecture:
// ```text
//  Application::start_up(config, event_loop)
//        │
//        ↓  WindowFactory::open_window(&WindowDesc)
//  ActiveEventLoop ──create_window(WindowAttributes)──> winit::Window
//        │
//        ↓
//  Arc<WinitWindow>  (PrimaryWindow, id = winit WindowId as u64)
// ```
//
// Notes:
// Winit only hands out an `ActiveEventLoop` inside its callbacks, so the
// application is started from `ApplicationHandler::resumed` (or another
// callback) with the event loop passed as the window factory.
//
//=========================================================================

//=== External Crates =====================================================

use std::sync::Arc;

use log::{error, info};
use winit::{
    dpi::LogicalSize,
    event_loop::ActiveEventLoop,
    window::{Fullscreen, Window, WindowAttributes},
};

//=== Internal Imports ====================================================

use crate::config::WindowDesc;
use crate::core::{PrimaryWindow, RenderWindow, WindowError, WindowFactory};

//=== WindowDesc → WindowAttributes =======================================

impl WindowDesc {
    /// Maps the descriptor onto winit window attributes.
    ///
    /// Fullscreen uses borderless mode on the current monitor.
    pub fn to_window_attributes(&self) -> WindowAttributes {
        let attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height));

        if self.fullscreen {
            attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
        } else {
            attrs
        }
    }
}

//=== WinitWindow =========================================================

/// Primary window backed by a winit window.
pub struct WinitWindow {
    window: Window,
    desc: WindowDesc,
}

impl WinitWindow {
    /// Wraps a window created from `desc`.
    pub fn new(window: Window, desc: WindowDesc) -> Self {
        Self { window, desc }
    }

    /// Underlying winit window, e.g. for surface creation.
    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl RenderWindow for WinitWindow {
    fn id(&self) -> u64 {
        u64::from(self.window.id())
    }

    fn desc(&self) -> &WindowDesc {
        &self.desc
    }
}

//=== Winit Integration ===================================================

impl WindowFactory for ActiveEventLoop {
    fn open_window(&self, desc: &WindowDesc) -> Result<PrimaryWindow, WindowError> {
        let window = self.create_window(desc.to_window_attributes()).map_err(|e| {
            error!(target: "platform", "Window creation failed: {}", e);
            WindowError::new(e.to_string())
        })?;

        info!(
            target: "platform",
            "Window created: {}x{} @ {}x DPI",
            window.inner_size().width,
            window.inner_size().height,
            window.scale_factor()
        );

        Ok(Arc::new(WinitWindow::new(window, desc.clone())))
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
