//=========================================================================
// Plugin Loader
//=========================================================================
//
// Loads and unloads dynamically linked engine subsystems by name.
//
// Architecture:
//   PluginRegistry ──load(name)──> ModuleSource ──open()──> LoadedModule
//         │                                                      │
//         └─ HashMap<PluginHandle, LoadedPlugin> <───────────────┘
//
// Every plugin exports a single well-known entry point
// (`aetheric_plugin_entry`). The registry resolves it after loading and
// hands it back together with an opaque handle used for unloading.
//
// Thread model: load/unload take `&mut self`. The OS loader mutates
// process-wide state and is not serialized any further than that.
//
//=========================================================================

//=== Module Declarations =================================================

mod registry;
mod source;

//=== Public API ==========================================================

pub use registry::PluginRegistry;
pub use source::{LoadedModule, ModuleSource, SharedLibrarySource, StaticModules};

//=== External Dependencies ===============================================

use std::ffi::c_void;
use std::fmt;

//=== Entry Point =========================================================

/// Name of the symbol every plugin module must export.
///
/// Includes the trailing NUL so it can be passed straight to the OS loader.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"aetheric_plugin_entry\0";

/// Signature of the exported plugin entry point.
pub type PluginEntryFn = unsafe extern "C" fn() -> *mut c_void;

/// Resolved entry point of a loaded plugin.
///
/// The function pointer is only valid while the module it came from stays
/// loaded, which is why calling it is `unsafe`.
#[derive(Debug, Clone, Copy)]
pub struct PluginEntry {
    func: PluginEntryFn,
}

impl PluginEntry {
    /// Wraps a raw entry point function pointer.
    pub fn new(func: PluginEntryFn) -> Self {
        Self { func }
    }

    /// Calls the plugin entry point and returns whatever it produced.
    ///
    /// # Safety
    ///
    /// The module that exported this entry point must still be loaded, and
    /// the caller must know how to interpret the returned pointer.
    pub unsafe fn invoke(&self) -> *mut c_void {
        (self.func)()
    }

    /// Returns the raw function pointer.
    pub fn as_raw(&self) -> PluginEntryFn {
        self.func
    }
}

//=== PluginHandle ========================================================

/// Opaque identifier of one loaded plugin instance.
///
/// Handles are never reused by a registry, so a stale handle is always
/// reported as [`PluginError::InvalidHandle`] rather than aliasing a newer
/// plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginHandle(u64);

impl PluginHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value of the handle, mostly useful for logging.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin#{}", self.0)
    }
}

//=== PluginError =========================================================

/// Plugin lifecycle errors.
#[derive(Debug)]
pub enum PluginError {
    /// No module with this name could be located.
    NotFound(String),

    /// The module was found but could not be opened or has no entry point.
    LoadFailed { name: String, reason: String },

    /// The handle does not refer to a currently loaded plugin.
    InvalidHandle(PluginHandle),
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "Plugin not found: {}", name),
            Self::LoadFailed { name, reason } => {
                write!(f, "Plugin {} failed to load: {}", name, reason)
            }
            Self::InvalidHandle(handle) => write!(f, "Invalid plugin handle: {}", handle),
        }
    }
}

impl std::error::Error for PluginError {}

//=========================================================================
// Unit Tests
//=========================================================================
