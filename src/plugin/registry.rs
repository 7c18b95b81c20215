//=========================================================================
// Plugin Registry
//=========================================================================
//
// Owns every module loaded through it and maps handles to modules.
//
// No reference counting: loading the same name twice produces two
// independent handles, each of which must be unloaded on its own.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;

use log::{debug, info, warn};

//=== Internal Dependencies ===============================================

use super::{LoadedModule, ModuleSource, PluginEntry, PluginError, PluginHandle};

//=== LoadedPlugin ========================================================

struct LoadedPlugin {
    name: String,
    module: LoadedModule,
}

//=== PluginRegistry ======================================================

/// Explicit plugin table owned by the application.
///
/// # Examples
///
/// ```
/// use aetheric_app::plugin::{PluginError, PluginRegistry, StaticModules};
/// # use std::ffi::c_void;
/// # extern "C" fn entry() -> *mut c_void { std::ptr::null_mut() }
///
/// let mut plugins = PluginRegistry::new(StaticModules::new().with_module("SceneOctree", entry));
///
/// let (_entry, handle) = plugins.load("SceneOctree")?;
/// plugins.unload(handle)?;
///
/// assert!(matches!(plugins.unload(handle), Err(PluginError::InvalidHandle(_))));
/// # Ok::<(), PluginError>(())
/// ```
pub struct PluginRegistry {
    source: Box<dyn ModuleSource>,
    loaded: HashMap<PluginHandle, LoadedPlugin>,
    next_id: u64,
}

impl PluginRegistry {
    //--- Construction -----------------------------------------------------

    /// Creates an empty registry that opens modules through `source`.
    pub fn new(source: impl ModuleSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: HashMap::new(),
            next_id: 1,
        }
    }

    //--- Lifecycle --------------------------------------------------------

    /// Loads the plugin called `name` (without extension).
    ///
    /// Returns the resolved entry point and the handle needed to unload it.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotFound`] if the module cannot be located
    /// - [`PluginError::LoadFailed`] if it was found but could not be opened
    pub fn load(&mut self, name: &str) -> Result<(PluginEntry, PluginHandle), PluginError> {
        let module = self.source.open(name).map_err(|e| {
            warn!(target: "plugin", "Loading {} failed: {}", name, e);
            e
        })?;

        let handle = PluginHandle::new(self.next_id);
        self.next_id += 1;

        let entry = module.entry();
        self.loaded.insert(
            handle,
            LoadedPlugin {
                name: name.to_string(),
                module,
            },
        );

        info!(target: "plugin", "Loaded {} as {}", name, handle);
        Ok((entry, handle))
    }

    /// Unloads a plugin, releasing its OS-level binding.
    ///
    /// Entry points obtained from this plugin must not be called afterwards.
    ///
    /// # Errors
    ///
    /// [`PluginError::InvalidHandle`] if the handle is not currently loaded.
    pub fn unload(&mut self, handle: PluginHandle) -> Result<(), PluginError> {
        let plugin = self
            .loaded
            .remove(&handle)
            .ok_or(PluginError::InvalidHandle(handle))?;

        info!(target: "plugin", "Unloaded {} ({})", plugin.name, handle);
        drop(plugin.module);
        Ok(())
    }

    /// Unloads every plugin still loaded, newest first.
    pub fn unload_all(&mut self) {
        let mut handles: Vec<PluginHandle> = self.loaded.keys().copied().collect();
        handles.sort_unstable_by(|a, b| b.cmp(a));

        for handle in handles {
            if let Some(plugin) = self.loaded.remove(&handle) {
                debug!(target: "plugin", "Unloading leftover {} ({})", plugin.name, handle);
            }
        }
    }

    //--- Queries ----------------------------------------------------------

    /// Returns `true` if `handle` refers to a loaded plugin.
    pub fn is_loaded(&self, handle: PluginHandle) -> bool {
        self.loaded.contains_key(&handle)
    }

    /// Name the plugin was loaded under.
    pub fn name_of(&self, handle: PluginHandle) -> Option<&str> {
        self.loaded.get(&handle).map(|plugin| plugin.name.as_str())
    }

    /// Number of currently loaded plugins.
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        if !self.loaded.is_empty() {
            warn!(target: "plugin", "{} plugin(s) still loaded at registry drop", self.loaded.len());
            self.unload_all();
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::StaticModules;
    use std::ffi::c_void;

    extern "C" fn scene_entry() -> *mut c_void {
        1usize as *mut c_void
    }

    extern "C" fn importer_entry() -> *mut c_void {
        2usize as *mut c_void
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new(
            StaticModules::new()
                .with_module("SceneOctree", scene_entry)
                .with_module("FreeImgImporter", importer_entry),
        )
    }

    //=====================================================================
    // Load Tests
    //=====================================================================

    #[test]
    fn load_returns_entry_and_handle() {
        let mut plugins = registry();

        let (entry, handle) = plugins.load("SceneOctree").unwrap();

        assert_eq!(unsafe { entry.invoke() } as usize, 1);
        assert!(plugins.is_loaded(handle));
        assert_eq!(plugins.name_of(handle), Some("SceneOctree"));
        assert_eq!(plugins.len(), 1);
    }

    #[test]
    fn load_unknown_is_not_found() {
        let mut plugins = registry();

        assert!(matches!(plugins.load("Missing"), Err(PluginError::NotFound(_))));
        assert!(plugins.is_empty());
    }

    #[test]
    fn loading_twice_gives_independent_handles() {
        let mut plugins = registry();

        let (_, first) = plugins.load("SceneOctree").unwrap();
        let (_, second) = plugins.load("SceneOctree").unwrap();

        assert_ne!(first, second);
        assert_eq!(plugins.len(), 2);

        plugins.unload(first).unwrap();
        assert!(plugins.is_loaded(second), "Unloading one instance keeps the other");
    }

    //=====================================================================
    // Unload Tests
    //=====================================================================

    #[test]
    fn unload_twice_is_invalid_handle() {
        let mut plugins = registry();
        let (_, handle) = plugins.load("SceneOctree").unwrap();

        plugins.unload(handle).unwrap();

        match plugins.unload(handle) {
            Err(PluginError::InvalidHandle(h)) => assert_eq!(h, handle),
            other => panic!("Expected InvalidHandle, got {:?}", other),
        }
    }

    #[test]
    fn unload_never_loaded_is_invalid_handle() {
        let mut plugins = registry();
        assert!(matches!(
            plugins.unload(PluginHandle::new(99)),
            Err(PluginError::InvalidHandle(_))
        ));
    }

    #[test]
    fn handles_are_not_reused() {
        let mut plugins = registry();

        let (_, old) = plugins.load("SceneOctree").unwrap();
        plugins.unload(old).unwrap();
        let (_, new) = plugins.load("SceneOctree").unwrap();

        assert_ne!(old, new);
        assert!(matches!(plugins.unload(old), Err(PluginError::InvalidHandle(_))));
    }

    #[test]
    fn unload_all_empties_registry() {
        let mut plugins = registry();
        plugins.load("SceneOctree").unwrap();
        plugins.load("FreeImgImporter").unwrap();

        plugins.unload_all();

        assert!(plugins.is_empty());
    }
}
