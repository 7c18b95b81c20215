//=========================================================================
// Aetheric App — Library Root
//
// Application lifecycle shell for the Aetheric engine.
//
// Responsibilities:
// - Load subsystem plugins by name and keep them for the session
// - Create the primary window through a window factory (winit by default)
// - Run a pipelined main loop: simulate frame N+1 while the core thread
//   renders frame N, never more than one frame in flight
// - Tear everything down again on shutdown
//
// Typical usage:
// ```no_run
// let mut app = Application::new(subsystems, plugins);
// app.start_up(config, event_loop)?;
// app.run_main_loop()?;
// app.shut_down();
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the main loop, the core (render) thread and the frame
// signal they synchronize on, plus the collaborator traits.
//
// `plugin` holds the plugin registry and module sources.
//
pub mod core;
pub mod plugin;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `platform` binds windows to winit. Its types are re-exported below.
//
// `application` and `config` define the shell and its start-up bundle.
//
mod application;
mod config;
mod platform;

//--- Public Exports ------------------------------------------------------

pub use application::{AppError, Application, Subsystems};
pub use config::{ConfigError, StartupConfig, StartupConfigBuilder, WindowDesc};
pub use platform::WinitWindow;
