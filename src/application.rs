//=========================================================================
// Application
//
// Lifecycle shell: composes plugins, the primary window, the core thread
// and the main loop.
//
// Architecture:
// ```text
//   Application::new(subsystems, plugins)
//         │
//         ├─ start_up(config, windows) ── all-or-nothing
//         │     ├─ load scene-manager plugin
//         │     ├─ load importer plugins (config order)
//         │     ├─ open primary window
//         │     ├─ start input / scene manager / renderer
//         │     └─ spawn core thread (renderer moves there)
//         │
//         ├─ run_main_loop() ── blocks until stop_main_loop()
//         │
//         └─ shut_down()
//               ├─ join core thread (renderer comes back)
//               ├─ stop scene manager / input
//               ├─ release primary window
//               └─ unload importers, then scene-manager plugin
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};

//=== Internal Dependencies ===============================================

use crate::config::StartupConfig;
use crate::core::{
    CallbackError, CommandQueue, CoreThread, CoreThreadError, FrameEvent, FrameHooks,
    FramePacket, FrameSignal, FrameStats, FrameStatsSnapshot, InputBackend, LoopState, MainLoop,
    PrimaryWindow, Renderer, SceneManager, StopHandle, SubsystemError, WindowError,
    WindowFactory,
};
use crate::plugin::{PluginEntry, PluginError, PluginHandle, PluginRegistry};

//=== AppError ============================================================

/// Application lifecycle errors.
#[derive(Debug)]
pub enum AppError {
    /// `start_up` was called on a started application.
    AlreadyStarted,

    /// The operation needs a started application.
    NotStarted,

    /// The renderer was lost (core thread panicked during a previous run).
    RendererUnavailable,

    /// Plugin load/unload failure.
    Plugin(PluginError),

    /// Primary window creation failure.
    Window(WindowError),

    /// A collaborator subsystem failed to start.
    Subsystem(SubsystemError),

    /// The per-frame callback failed; the main loop was terminated.
    Callback(CallbackError),

    /// The core thread could not be started or stopped accepting work.
    CoreThread(CoreThreadError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyStarted => write!(f, "Application already started"),
            Self::NotStarted => write!(f, "Application not started"),
            Self::RendererUnavailable => write!(f, "Renderer unavailable"),
            Self::Plugin(e) => write!(f, "Plugin error: {}", e),
            Self::Window(e) => write!(f, "{}", e),
            Self::Subsystem(e) => write!(f, "Subsystem error: {}", e),
            Self::Callback(e) => write!(f, "Main loop callback failed: {}", e),
            Self::CoreThread(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Plugin(e) => Some(e),
            Self::Window(e) => Some(e),
            Self::Subsystem(e) => Some(e),
            Self::Callback(e) => Some(&**e),
            Self::CoreThread(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PluginError> for AppError {
    fn from(e: PluginError) -> Self {
        Self::Plugin(e)
    }
}

impl From<WindowError> for AppError {
    fn from(e: WindowError) -> Self {
        Self::Window(e)
    }
}

impl From<SubsystemError> for AppError {
    fn from(e: SubsystemError) -> Self {
        Self::Subsystem(e)
    }
}

impl From<CoreThreadError> for AppError {
    fn from(e: CoreThreadError) -> Self {
        Self::CoreThread(e)
    }
}

//=== Subsystems ==========================================================

/// External collaborators driven by the application.
pub struct Subsystems {
    pub renderer: Box<dyn Renderer>,
    pub input: Box<dyn InputBackend>,
    pub scene_manager: Box<dyn SceneManager>,
}

//=== Session =============================================================

/// Everything that exists only between `start_up` and `shut_down`.
struct Session {
    primary_window: PrimaryWindow,
    scene_manager_plugin: PluginHandle,
    importer_plugins: Vec<PluginHandle>,
    core: CoreThread,
    frame_signal: FrameSignal,
    next_frame: u64,
}

/// What a partially completed `start_up` has to undo.
#[derive(Default)]
struct StartupProgress {
    plugins: Vec<PluginHandle>,
    input_started: bool,
    scene_started: bool,
}

//=== Application =========================================================

/// Engine application shell.
///
/// # Examples
///
/// ```no_run
/// use aetheric_app::prelude::*;
/// use aetheric_app::plugin::SharedLibrarySource;
/// # struct NullRenderer;
/// # impl Renderer for NullRenderer {
/// #     fn render_frame(&mut self, _: u64) -> Result<(), SubsystemError> { Ok(()) }
/// # }
/// # struct NullInput;
/// # impl InputBackend for NullInput { fn poll(&mut self) {} }
/// # struct NullScene;
/// # impl SceneManager for NullScene { fn update(&mut self) {} }
/// # fn run(event_loop: &winit::event_loop::ActiveEventLoop) -> Result<(), AppError> {
///
/// let plugins = PluginRegistry::new(SharedLibrarySource::new().with_search_dir("plugins"));
/// let mut app = Application::new(
///     Subsystems {
///         renderer: Box::new(NullRenderer),
///         input: Box::new(NullInput),
///         scene_manager: Box::new(NullScene),
///     },
///     plugins,
/// );
///
/// let config = StartupConfig::builder()
///     .with_scene_manager("SceneOctree")
///     .build()
///     .expect("valid config");
///
/// app.start_up(config, event_loop)?;
///
/// let stop = app.stop_handle();
/// app.main_loop_callback().connect(move || {
///     stop.stop_main_loop();
///     Ok(())
/// });
///
/// app.run_main_loop()?;
/// app.shut_down();
/// # Ok(())
/// # }
/// ```
pub struct Application {
    plugins: PluginRegistry,
    renderer: Option<Box<dyn Renderer>>,
    input: Box<dyn InputBackend>,
    scene_manager: Box<dyn SceneManager>,
    session: Option<Session>,
    main_loop: MainLoop,
    main_loop_callback: FrameEvent,
    commands: CommandQueue,
    stats: Arc<FrameStats>,
}

impl Application {
    //--- Construction -----------------------------------------------------

    /// Creates a stopped application. Nothing is loaded until
    /// [`Application::start_up`].
    pub fn new(subsystems: Subsystems, plugins: PluginRegistry) -> Self {
        let Subsystems {
            renderer,
            input,
            scene_manager,
        } = subsystems;

        Self {
            plugins,
            renderer: Some(renderer),
            input,
            scene_manager,
            session: None,
            main_loop: MainLoop::new(),
            main_loop_callback: FrameEvent::new(),
            commands: CommandQueue::new(),
            stats: Arc::new(FrameStats::new()),
        }
    }

    //--- Lifecycle --------------------------------------------------------

    /// Starts the application.
    ///
    /// All-or-nothing: on failure every plugin loaded by this call is
    /// unloaded, no window is kept, and started subsystems are shut down.
    ///
    /// # Errors
    ///
    /// - [`AppError::AlreadyStarted`] if already started (state unchanged)
    /// - [`AppError::Plugin`] if the scene manager or an importer fails to load
    /// - [`AppError::Window`] propagated from the window factory
    /// - [`AppError::Subsystem`] if a collaborator refuses to start
    /// - [`AppError::RendererUnavailable`] if the renderer was lost earlier
    pub fn start_up(
        &mut self,
        config: StartupConfig,
        windows: &dyn WindowFactory,
    ) -> Result<(), AppError> {
        if self.session.is_some() {
            warn!(target: "app", "start_up called while already started");
            return Err(AppError::AlreadyStarted);
        }

        info!(target: "app", "Starting application (scene manager: {})", config.scene_manager());

        self.discard_pending_commands();

        let mut renderer = self.renderer.take().ok_or(AppError::RendererUnavailable)?;
        let mut progress = StartupProgress::default();

        let acquired = self.bring_up(&config, windows, renderer.as_mut(), &mut progress);
        let (window, scene_manager_plugin) = match acquired {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(target: "app", "Start-up failed: {}", e);
                self.roll_back(progress);
                self.renderer = Some(renderer);
                return Err(e);
            }
        };

        let frame_signal = FrameSignal::new();
        self.stats = Arc::new(FrameStats::new());

        let core = match CoreThread::spawn(renderer, frame_signal.clone(), Arc::clone(&self.stats)) {
            Ok(core) => core,
            Err(e) => {
                error!(target: "app", "Start-up failed, renderer lost: {}", e);
                self.roll_back(progress);
                return Err(e.into());
            }
        };

        // bring_up loads the scene manager first, importers after it
        let importer_plugins = progress.plugins.split_off(1);

        self.session = Some(Session {
            primary_window: window,
            scene_manager_plugin,
            importer_plugins,
            core,
            frame_signal,
            next_frame: 0,
        });

        info!(target: "app", "Application started");
        Ok(())
    }

    /// Releases everything acquired by [`Application::start_up`] and while
    /// running, including render commands that were never dispatched.
    ///
    /// Does nothing if the application is not started.
    pub fn shut_down(&mut self) {
        let Some(session) = self.session.take() else {
            debug!(target: "app", "shut_down called while not started");
            return;
        };

        info!(target: "app", "Shutting down application");

        match session.core.shut_down() {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => error!(target: "app", "Renderer lost during shutdown: {}", e),
        }
        self.discard_pending_commands();

        self.scene_manager.shut_down();
        self.input.shut_down();

        let holders = Arc::strong_count(&session.primary_window);
        if holders > 1 {
            debug!(target: "app", "Primary window still held by {} other owner(s)", holders - 1);
        }
        drop(session.primary_window);

        for handle in session.importer_plugins.into_iter().rev() {
            self.unload_or_warn(handle);
        }
        self.unload_or_warn(session.scene_manager_plugin);

        info!(target: "app", "Application shut down");
    }

    //--- Main Loop --------------------------------------------------------

    /// Runs the main loop until [`Application::stop_main_loop`] is called.
    ///
    /// Each iteration polls input, updates the scene manager, fires the
    /// main loop callback, waits for the previous frame to finish rendering,
    /// then dispatches this frame's render work to the core thread.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotStarted`] if called before `start_up`
    /// - [`AppError::Callback`] if a callback fails; the loop ends after the
    ///   outstanding frame has rendered
    /// - [`AppError::CoreThread`] if the core thread stopped accepting work
    pub fn run_main_loop(&mut self) -> Result<(), AppError> {
        let session = self.session.as_mut().ok_or(AppError::NotStarted)?;

        let mut driver = FrameDriver {
            input: self.input.as_mut(),
            scene_manager: self.scene_manager.as_mut(),
            callbacks: &mut self.main_loop_callback,
            core: &session.core,
            commands: &self.commands,
            stats: &self.stats,
            next_frame: &mut session.next_frame,
        };

        self.main_loop.run(&mut driver, &session.frame_signal)?;
        Ok(())
    }

    /// Stops the main loop after its current iteration.
    ///
    /// Use [`Application::stop_handle`] to stop from another thread or from
    /// inside a callback.
    pub fn stop_main_loop(&self) {
        self.main_loop.stop();
    }

    /// Thread-safe handle equivalent to [`Application::stop_main_loop`].
    pub fn stop_handle(&self) -> StopHandle {
        self.main_loop.stop_handle()
    }

    /// Current state of the main loop.
    pub fn loop_state(&self) -> LoopState {
        self.main_loop.state()
    }

    /// Per-frame callback fired after simulation and before render dispatch.
    pub fn main_loop_callback(&mut self) -> &mut FrameEvent {
        &mut self.main_loop_callback
    }

    /// Queue for render commands executed on the core thread with the
    /// next dispatched frame.
    pub fn command_queue(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Frame counters of the current (or last) session.
    pub fn frame_stats(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    //--- Window -----------------------------------------------------------

    /// Returns `true` between a successful `start_up` and `shut_down`.
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Primary window, or `None` outside a started session.
    pub fn primary_window(&self) -> Option<PrimaryWindow> {
        self.session
            .as_ref()
            .map(|session| Arc::clone(&session.primary_window))
    }

    /// Identifier of the primary window, or `None` outside a started session.
    pub fn app_window_id(&self) -> Option<u64> {
        self.session
            .as_ref()
            .map(|session| session.primary_window.id())
    }

    //--- Plugins ----------------------------------------------------------

    /// Loads a plugin on behalf of another subsystem, which owns the handle.
    pub fn load_plugin(&mut self, name: &str) -> Result<(PluginEntry, PluginHandle), PluginError> {
        self.plugins.load(name)
    }

    /// Unloads a plugin loaded through [`Application::load_plugin`].
    pub fn unload_plugin(&mut self, handle: PluginHandle) -> Result<(), PluginError> {
        self.plugins.unload(handle)
    }

    /// Read-only view of the plugin registry.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    //--- Internal Helpers -------------------------------------------------

    fn bring_up(
        &mut self,
        config: &StartupConfig,
        windows: &dyn WindowFactory,
        renderer: &mut dyn Renderer,
        progress: &mut StartupProgress,
    ) -> Result<(PrimaryWindow, PluginHandle), AppError> {
        let (scene_entry, scene_plugin) = self.plugins.load(config.scene_manager())?;
        progress.plugins.push(scene_plugin);

        for importer in config.importers() {
            let (_, handle) = self.plugins.load(importer)?;
            progress.plugins.push(handle);
        }

        let window = windows.open_window(config.primary_window())?;
        debug!(target: "app", "Primary window {} opened", window.id());

        self.input.start_up(config.input())?;
        progress.input_started = true;

        self.scene_manager.start_up(config.scene_manager(), scene_entry)?;
        progress.scene_started = true;

        renderer.start_up(config, &window)?;

        Ok((window, scene_plugin))
    }

    fn roll_back(&mut self, progress: StartupProgress) {
        if progress.scene_started {
            self.scene_manager.shut_down();
        }
        if progress.input_started {
            self.input.shut_down();
        }
        for handle in progress.plugins.into_iter().rev() {
            self.unload_or_warn(handle);
        }
    }

    /// Render commands never outlive the session they were queued for.
    fn discard_pending_commands(&self) {
        let dropped = self.commands.take().len();
        if dropped > 0 {
            debug!(target: "app", "Dropped {} pending render command(s)", dropped);
        }
    }

    fn unload_or_warn(&mut self, handle: PluginHandle) {
        if let Err(e) = self.plugins.unload(handle) {
            warn!(target: "app", "{}", e);
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shut_down();
    }
}

//=== FrameDriver =========================================================

/// Binds the main loop hooks to the application's collaborators.
struct FrameDriver<'a> {
    input: &'a mut dyn InputBackend,
    scene_manager: &'a mut dyn SceneManager,
    callbacks: &'a mut FrameEvent,
    core: &'a CoreThread,
    commands: &'a CommandQueue,
    stats: &'a FrameStats,
    next_frame: &'a mut u64,
}

impl FrameHooks for FrameDriver<'_> {
    type Error = AppError;

    fn simulate(&mut self) -> Result<(), AppError> {
        self.input.poll();
        self.scene_manager.update();
        Ok(())
    }

    fn frame_callback(&mut self) -> Result<(), AppError> {
        self.callbacks.invoke().map_err(AppError::Callback)
    }

    fn dispatch(&mut self) -> Result<(), AppError> {
        let packet = FramePacket {
            index: *self.next_frame,
            commands: self.commands.take(),
        };
        trace!(target: "app", "Dispatching {:?}", packet);

        self.stats.record_submitted();
        if let Err(e) = self.core.submit(packet) {
            self.stats.retract_submitted();
            return Err(e.into());
        }
        *self.next_frame += 1;
        Ok(())
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
