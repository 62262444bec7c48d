use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable that overrides the platform data directory.
pub const DATA_DIR_ENV: &str = "MEMTRUST_DATA_DIR";

/// Default keystore subdirectory, relative to the data directory.
pub const DEFAULT_KEYSTORE_DIR: &str = "keystore";

/// Default keystore file name inside the keystore subdirectory.
pub const DEFAULT_KEYSTORE_FILE: &str = "overrides.mks";

/// Root data directory for memtrust.
///
/// `MEMTRUST_DATA_DIR` wins when set. Otherwise:
///
/// - Linux: `~/.memtrust/`
/// - macOS: `~/Library/Application Support/memtrust/`
/// - Windows: `%LOCALAPPDATA%\memtrust\`
pub fn memtrust_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("memtrust");
        }
    }

    #[cfg(windows)]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            return PathBuf::from(local).join("memtrust");
        }
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".memtrust");
        }
    }

    PathBuf::from(".memtrust")
}

/// Directory/file pair naming the override keystore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreLocation {
    pub dir: String,
    pub file: String,
}

impl Default for KeystoreLocation {
    fn default() -> Self {
        Self {
            dir: DEFAULT_KEYSTORE_DIR.to_string(),
            file: DEFAULT_KEYSTORE_FILE.to_string(),
        }
    }
}

impl KeystoreLocation {
    pub fn new(dir: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    /// Full keystore path under `data_dir`.
    pub fn resolve(&self, data_dir: &std::path::Path) -> PathBuf {
        data_dir.join(&self.dir).join(&self.file)
    }
}

static KEYSTORE_LOCATION: OnceLock<KeystoreLocation> = OnceLock::new();

/// Set the process-wide keystore location.
///
/// Only the first call (or the first read through [`keystore_location`])
/// fixes the value. Returns `false` when the location was already fixed;
/// the new value is then ignored.
pub fn set_keystore_location(dir: &str, file: &str) -> bool {
    let requested = KeystoreLocation::new(dir, file);
    let accepted = KEYSTORE_LOCATION.set(requested.clone()).is_ok();
    if !accepted {
        tracing::warn!(
            dir,
            file,
            current = ?KEYSTORE_LOCATION.get(),
            "Keystore location already fixed; ignoring change"
        );
    }
    accepted
}

/// The process-wide keystore location (defaults if never set).
pub fn keystore_location() -> &'static KeystoreLocation {
    KEYSTORE_LOCATION.get_or_init(KeystoreLocation::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_resolves_under_data_dir() {
        let loc = KeystoreLocation::new("private", "sslkeys.mks");
        let path = loc.resolve(std::path::Path::new("/data"));
        assert_eq!(path, PathBuf::from("/data/private/sslkeys.mks"));
    }

    #[test]
    fn default_location_uses_default_names() {
        let loc = KeystoreLocation::default();
        assert_eq!(loc.dir, DEFAULT_KEYSTORE_DIR);
        assert_eq!(loc.file, DEFAULT_KEYSTORE_FILE);
    }

    #[test]
    fn keystore_location_is_fixed_after_first_use() {
        let first = keystore_location().clone();
        assert!(!set_keystore_location("elsewhere", "other.mks"));
        assert_eq!(keystore_location(), &first);
    }
}
