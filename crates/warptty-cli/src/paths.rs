//! Data directory resolution for the persistent stores.
//!
//! Priority:
//! 1. `WARPTTY_DATA_DIR` (explicit override)
//! 2. `~/.warptty` (home directory)
//! 3. System temp dir (last resort)

use std::env;
use std::path::{Path, PathBuf};

/// Get the data directory with priority fallback.
///
/// Priority:
/// 1. `WARPTTY_DATA_DIR` (explicit override, ignores empty string)
/// 2. `~/.warptty` (home directory)
/// 3. System temp dir (last resort)
pub fn data_dir() -> PathBuf {
    // 1. Explicit override (ignore empty)
    if let Ok(dir) = env::var("WARPTTY_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    // 2. Home directory
    if let Some(home) = dirs::home_dir() {
        return home.join(".warptty");
    }

    // 3. Last resort: temp dir
    env::temp_dir().join("warptty")
}

/// Ensure the data directory exists so the stores can write through.
pub fn ensure_data_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{data_dir, ensure_data_dir};

    // Mutex to serialize tests that manipulate environment variables.
    // Env var manipulation is inherently non-thread-safe, so tests must run serially.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    // Helper to save and restore env vars during tests.
    // Also holds the mutex guard to ensure serialized access.
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
        _lock: std::sync::MutexGuard<'static, ()>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            // Lock first to prevent races
            let lock = ENV_MUTEX.lock().unwrap();
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), std::env::var(name).ok()))
                .collect();
            Self { vars, _lock: lock }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
            // _lock is dropped here, releasing the mutex
        }
    }

    #[test]
    fn test_data_dir_explicit_override() {
        let _guard = EnvGuard::new(&["WARPTTY_DATA_DIR"]);
        std::env::set_var("WARPTTY_DATA_DIR", "/custom/data/path");

        assert_eq!(data_dir(), std::path::PathBuf::from("/custom/data/path"));
    }

    #[test]
    fn test_data_dir_ignores_empty() {
        let _guard = EnvGuard::new(&["WARPTTY_DATA_DIR"]);
        std::env::set_var("WARPTTY_DATA_DIR", "");

        // Should fall through to the home dir
        assert!(data_dir().to_string_lossy().ends_with(".warptty"));
    }

    #[test]
    fn test_data_dir_home_fallback() {
        let _guard = EnvGuard::new(&["WARPTTY_DATA_DIR"]);
        std::env::remove_var("WARPTTY_DATA_DIR");

        assert!(data_dir().to_string_lossy().ends_with(".warptty"));
    }

    #[test]
    fn test_ensure_data_dir_creates_nested() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("deep").join("data");

        ensure_data_dir(&dir).expect("create");
        assert!(dir.is_dir());

        // a second call is a no-op
        ensure_data_dir(&dir).expect("create again");
    }
}
