//=========================================================================
// Startup Configuration
//=========================================================================
//
// Immutable bundle describing what the application starts with.
//
// Architecture:
// ```text
//     StartupConfigBuilder  ──build()──>  StartupConfig  ──start_up()──>  Application
//         │
//         ├─ with_render_system() / with_renderer()
//         ├─ with_input() / with_scene_manager()
//         ├─ with_primary_window()
//         └─ with_importer() (ordered)
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== WindowDesc ==========================================================

/// Descriptor of the primary window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDesc {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub title: String,
}

impl WindowDesc {
    /// Windowed descriptor of the given size with the default title.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Sets the window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Requests a borderless fullscreen window.
    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            title: "Aetheric".to_string(),
        }
    }
}

//=== StartupConfig =======================================================

/// Configuration consumed once by [`crate::Application::start_up`].
///
/// Built with [`StartupConfigBuilder`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    render_system: String,
    renderer: String,
    input: String,
    scene_manager: String,
    primary_window: WindowDesc,
    importers: Vec<String>,
}

impl StartupConfig {
    /// Shorthand for [`StartupConfigBuilder::new`].
    pub fn builder() -> StartupConfigBuilder {
        StartupConfigBuilder::new()
    }

    /// Name of the render system.
    pub fn render_system(&self) -> &str {
        &self.render_system
    }

    /// Name of the renderer within the render system.
    pub fn renderer(&self) -> &str {
        &self.renderer
    }

    /// Name of the input backend.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Name of the scene-manager plugin, without extension.
    pub fn scene_manager(&self) -> &str {
        &self.scene_manager
    }

    /// Descriptor of the primary window.
    pub fn primary_window(&self) -> &WindowDesc {
        &self.primary_window
    }

    /// Importer plugin names, in load order.
    pub fn importers(&self) -> &[String] {
        &self.importers
    }
}

//=== StartupConfigBuilder ================================================

/// Builder for [`StartupConfig`].
///
/// # Default Values
///
/// - **Primary window**: 1280x720, windowed, titled "Aetheric"
/// - **Importers**: none
/// - **Subsystem names**: empty; the scene manager must be set
///
/// # Examples
///
/// ```
/// use aetheric_app::{StartupConfig, WindowDesc};
///
/// let config = StartupConfig::builder()
///     .with_render_system("VulkanRenderSystem")
///     .with_renderer("ForwardRenderer")
///     .with_input("WinitInput")
///     .with_scene_manager("SceneOctree")
///     .with_primary_window(WindowDesc::new(1920, 1080).with_title("Editor"))
///     .with_importer("FreeImgImporter")
///     .with_importer("FbxImporter")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.importers(), ["FreeImgImporter", "FbxImporter"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StartupConfigBuilder {
    render_system: String,
    renderer: String,
    input: String,
    scene_manager: String,
    primary_window: WindowDesc,
    importers: Vec<String>,
}

impl StartupConfigBuilder {
    /// Creates a builder with default window settings and no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the render system name.
    pub fn with_render_system(mut self, name: impl Into<String>) -> Self {
        self.render_system = name.into();
        self
    }

    /// Sets the renderer name.
    pub fn with_renderer(mut self, name: impl Into<String>) -> Self {
        self.renderer = name.into();
        self
    }

    /// Sets the input backend name.
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.input = name.into();
        self
    }

    /// Sets the scene-manager plugin name. Required.
    pub fn with_scene_manager(mut self, name: impl Into<String>) -> Self {
        self.scene_manager = name.into();
        self
    }

    /// Sets the primary window descriptor.
    pub fn with_primary_window(mut self, desc: WindowDesc) -> Self {
        self.primary_window = desc;
        self
    }

    /// Appends an importer plugin. Importers load in the order added.
    pub fn with_importer(mut self, name: impl Into<String>) -> Self {
        self.importers.push(name.into());
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingSceneManager`] if no scene manager was named
    /// - [`ConfigError::EmptyWindow`] if the window has a zero dimension
    pub fn build(self) -> Result<StartupConfig, ConfigError> {
        if self.scene_manager.trim().is_empty() {
            return Err(ConfigError::MissingSceneManager);
        }

        let window = &self.primary_window;
        if window.width == 0 || window.height == 0 {
            return Err(ConfigError::EmptyWindow {
                width: window.width,
                height: window.height,
            });
        }

        Ok(StartupConfig {
            render_system: self.render_system,
            renderer: self.renderer,
            input: self.input,
            scene_manager: self.scene_manager,
            primary_window: self.primary_window,
            importers: self.importers,
        })
    }
}

//=== ConfigError =========================================================

/// Rejected startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No scene-manager plugin was named.
    MissingSceneManager,

    /// The primary window has a zero dimension.
    EmptyWindow { width: u32, height: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSceneManager => write!(f, "No scene manager plugin configured"),
            Self::EmptyWindow { width, height } => {
                write!(f, "Primary window size {}x{} is empty", width, height)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

//=========================================================================
// Unit Tests
//=========================================================================
