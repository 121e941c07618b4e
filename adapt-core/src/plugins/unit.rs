//! Load units: a set of plugin types that are loaded together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapt_plugin_api::{API_VERSION, API_VERSION_SYMBOL, PLUGIN_TYPES_SYMBOL, PluginType};
use libloading::Library;

use super::error::PluginHostError;

/// File extensions of loadable plugin libraries on this platform
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSIONS: &[&str] = &["dylib", "so"];
#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSIONS: &[&str] = &["dll"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LIBRARY_EXTENSIONS: &[&str] = &["so"];

/// A plugin table plus the library that backs it, if any.
///
/// Built-in units are compiled into the host. Dynamic units come from a
/// library in the plugin directory and keep it loaded for as long as the
/// unit or any instance created from it is alive.
#[derive(Clone)]
pub struct LoadUnit {
    key: String,
    types: Vec<PluginType>,
    path: Option<PathBuf>,
    library: Option<Arc<Library>>,
}

impl LoadUnit {
    /// A unit compiled into the host
    pub fn built_in(key: impl Into<String>, types: &[PluginType]) -> Self {
        Self {
            key: key.into(),
            types: types.to_vec(),
            path: None,
            library: None,
        }
    }

    /// Open a plugin library and read its plugin table
    pub fn open(path: &Path) -> Result<Self, PluginHostError> {
        let key = unit_key(path).ok_or_else(|| PluginHostError::NotALibrary {
            path: path.to_path_buf(),
        })?;

        // SAFETY: Libraries in the plugin directory are trusted by the
        // operator and are expected to be built with `export_plugins!`.
        let library = unsafe { Library::new(path)? };

        // SAFETY: The symbol is generated by `export_plugins!` with this signature.
        let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(API_VERSION_SYMBOL)? };

        let found = api_version_fn();
        if found != API_VERSION {
            return Err(PluginHostError::ApiVersionMismatch {
                expected: API_VERSION,
                found,
            });
        }

        // SAFETY: Same as above; the table lives as long as the library,
        // which this unit keeps alive.
        let types_fn: libloading::Symbol<fn() -> &'static [PluginType]> =
            unsafe { library.get(PLUGIN_TYPES_SYMBOL)? };
        let types = types_fn().to_vec();

        Ok(Self {
            key,
            types,
            path: Some(path.to_path_buf()),
            library: Some(Arc::new(library)),
        })
    }

    /// The unit key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The plugin table
    pub fn types(&self) -> &[PluginType] {
        &self.types
    }

    /// Library path of a dynamic unit
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether this unit is backed by a dynamic library
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    /// Key of one plugin type in this unit.
    ///
    /// A single-type unit uses the unit key; otherwise the type's short name
    /// is appended (`birthdays.Announcer`).
    pub fn plugin_key(&self, plugin_type: &PluginType) -> String {
        if self.types.len() == 1 {
            self.key.clone()
        } else {
            format!("{}.{}", self.key, plugin_type.short_name())
        }
    }

    pub(crate) fn library(&self) -> Option<Arc<Library>> {
        self.library.clone()
    }
}

impl std::fmt::Debug for LoadUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadUnit")
            .field("key", &self.key)
            .field("types", &self.types)
            .field("path", &self.path)
            .finish()
    }
}

/// Whether the path has a plugin library extension
pub fn is_library(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(&ext))
}

/// Unit key for a library path: the file stem without a `lib` prefix
pub fn unit_key(path: &Path) -> Option<String> {
    if !is_library(path) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let key = match stem.strip_prefix("lib") {
        Some(rest) if !rest.is_empty() => rest,
        _ => stem,
    };
    Some(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapt_plugin_api::{Plugin, PluginManifest};

    #[derive(Default)]
    struct Announcer;

    impl Plugin for Announcer {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::default()
        }
    }

    #[derive(Default)]
    struct Roles;

    impl Plugin for Roles {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::default()
        }
    }

    #[test]
    fn test_single_type_unit_uses_unit_key() {
        let unit = LoadUnit::built_in("status", &[PluginType::of::<Announcer>("Announcer")]);
        assert_eq!(unit.plugin_key(&unit.types()[0]), "status");
        assert!(!unit.is_dynamic());
    }

    #[test]
    fn test_multi_type_unit_appends_type_name() {
        let unit = LoadUnit::built_in(
            "birthdays",
            &[
                PluginType::of::<Announcer>("birthdays::Announcer"),
                PluginType::of::<Roles>("Roles"),
            ],
        );
        let keys: Vec<_> = unit.types().iter().map(|t| unit.plugin_key(t)).collect();
        assert_eq!(keys, vec!["birthdays.Announcer", "birthdays.Roles"]);
    }

    #[test]
    fn test_unit_key_strips_lib_prefix() {
        let ext = LIBRARY_EXTENSIONS[0];
        assert_eq!(
            unit_key(&PathBuf::from(format!("/p/libbirthdays.{ext}"))).as_deref(),
            Some("birthdays")
        );
        assert_eq!(
            unit_key(&PathBuf::from(format!("/p/status.{ext}"))).as_deref(),
            Some("status")
        );
        assert_eq!(
            unit_key(&PathBuf::from(format!("/p/lib.{ext}"))).as_deref(),
            Some("lib")
        );
        assert!(unit_key(&PathBuf::from("/p/readme.txt")).is_none());
    }

    #[test]
    fn test_open_rejects_non_library() {
        let err = LoadUnit::open(Path::new("/p/notes.txt")).unwrap_err();
        assert!(matches!(err, PluginHostError::NotALibrary { .. }));
    }

    #[test]
    fn test_open_reports_unloadable_library() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(format!("broken.{}", LIBRARY_EXTENSIONS[0]));
        std::fs::write(&path, b"not a shared object").unwrap();

        let err = LoadUnit::open(&path).unwrap_err();
        assert!(matches!(err, PluginHostError::LibraryLoad(_)));
    }
}
