//=========================================================================
// Module Sources
//=========================================================================
//
// Where plugin modules come from.
//
// - `SharedLibrarySource`: OS dynamic libraries, searched in an ordered
//   list of directories. The platform extension (.dll/.so/.dylib) is
//   appended to the plugin name.
// - `StaticModules`: entry points linked into the executable and
//   registered by name.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, trace};

//=== Internal Dependencies ===============================================

use super::{PluginEntry, PluginEntryFn, PluginError, PLUGIN_ENTRY_SYMBOL};

//=== LoadedModule ========================================================

/// An opened module together with its resolved entry point.
///
/// Dropping the value releases the OS-level binding (if any).
pub struct LoadedModule {
    entry: PluginEntry,
    // Field order matters: the entry must not outlive the library.
    _library: Option<Library>,
}

impl LoadedModule {
    /// Module backed by an OS dynamic library.
    pub fn from_library(entry: PluginEntry, library: Library) -> Self {
        Self {
            entry,
            _library: Some(library),
        }
    }

    /// Module whose code is linked into the executable.
    pub fn linked(entry: PluginEntry) -> Self {
        Self {
            entry,
            _library: None,
        }
    }

    /// Resolved entry point of the module.
    pub fn entry(&self) -> PluginEntry {
        self.entry
    }
}

//=== ModuleSource ========================================================

/// Locates and opens plugin modules by name.
pub trait ModuleSource: Send {
    /// Opens the module called `name` (no extension) and resolves its
    /// entry point.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotFound`] if no such module exists
    /// - [`PluginError::LoadFailed`] if it exists but cannot be opened or
    ///   does not export the entry point
    fn open(&self, name: &str) -> Result<LoadedModule, PluginError>;
}

//=== SharedLibrarySource =================================================

/// Loads plugins from dynamic libraries on disk.
#[derive(Debug, Clone, Default)]
pub struct SharedLibrarySource {
    search_dirs: Vec<PathBuf>,
}

impl SharedLibrarySource {
    /// Creates a source with no search directories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to search, after the ones already added.
    pub fn with_search_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    /// File name of the plugin on this platform.
    pub fn file_name(name: &str) -> String {
        format!("{}.{}", name, DLL_EXTENSION)
    }

    /// Returns the first matching file in the search directories.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let file_name = Self::file_name(name);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }
}

impl ModuleSource for SharedLibrarySource {
    fn open(&self, name: &str) -> Result<LoadedModule, PluginError> {
        let path = self
            .locate(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        debug!(target: "plugin", "Opening {} from {}", name, path.display());

        let load_failed = |reason: String| PluginError::LoadFailed {
            name: name.to_string(),
            reason,
        };

        // Running foreign initialisers is inherent to loading a plugin.
        let library = unsafe { Library::new(&path) }.map_err(|e| load_failed(e.to_string()))?;

        let func: PluginEntryFn = {
            let symbol: Symbol<PluginEntryFn> = unsafe { library.get(PLUGIN_ENTRY_SYMBOL) }
                .map_err(|e| load_failed(format!("missing entry point: {}", e)))?;
            *symbol
        };

        Ok(LoadedModule::from_library(PluginEntry::new(func), library))
    }
}

//=== StaticModules =======================================================

/// Plugins linked into the executable, registered by name.
#[derive(Debug, Clone, Default)]
pub struct StaticModules {
    entries: HashMap<String, PluginEntryFn>,
}

impl StaticModules {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry point under `name`, replacing any previous one.
    pub fn with_module(mut self, name: impl Into<String>, entry: PluginEntryFn) -> Self {
        self.register(name, entry);
        self
    }

    /// In-place form of [`StaticModules::with_module`].
    pub fn register(&mut self, name: impl Into<String>, entry: PluginEntryFn) {
        let name = name.into();
        trace!(target: "plugin", "Registered linked module {}", name);
        self.entries.insert(name, entry);
    }

    /// Returns `true` if a module is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl ModuleSource for StaticModules {
    fn open(&self, name: &str) -> Result<LoadedModule, PluginError> {
        self.entries
            .get(name)
            .map(|func| LoadedModule::linked(PluginEntry::new(*func)))
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
