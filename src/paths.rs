//! Centralized path resolution for settle
//!
//! # Environment Variables
//!
//! - `SETTLE_FILE` - Declarations file to load (default `settle.toml`)
//! - `SETTLE_STATE_FILE` - State file to read and write
//!
//! # Path Resolution Priority
//!
//! For declarations_file():
//! 1. `--file` flag
//! 2. `SETTLE_FILE` environment variable
//! 3. `settle.toml` in the working directory
//!
//! For state_file():
//! 1. `SETTLE_STATE_FILE` environment variable
//! 2. `.settle/state.json` next to the declarations file

use std::path::{Path, PathBuf};

/// Environment variable for the declarations file
pub const ENV_FILE: &str = "SETTLE_FILE";

/// Environment variable for the state file
pub const ENV_STATE_FILE: &str = "SETTLE_STATE_FILE";

/// Declarations file used when nothing else is configured
pub const DEFAULT_FILE: &str = "settle.toml";

const STATE_DIR: &str = ".settle";
const STATE_FILE: &str = "state.json";

/// Get the declarations file path
pub fn declarations_file(flag: Option<&str>) -> PathBuf {
    if let Some(file) = flag {
        let path = expand(file);
        log::debug!("Using declarations from --file: {}", path.display());
        return path;
    }

    if let Ok(file) = std::env::var(ENV_FILE) {
        let path = expand(&file);
        log::debug!("Using declarations from {}: {}", ENV_FILE, path.display());
        return path;
    }

    log::debug!("Using default declarations file: {DEFAULT_FILE}");
    PathBuf::from(DEFAULT_FILE)
}

/// Get the state file path for a declarations file
pub fn state_file(declarations: &Path) -> PathBuf {
    if let Ok(file) = std::env::var(ENV_STATE_FILE) {
        let path = expand(&file);
        log::debug!("Using state file from {}: {}", ENV_STATE_FILE, path.display());
        return path;
    }

    let base = declarations
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let path = base.join(STATE_DIR).join(STATE_FILE);
    log::debug!("Using default state file: {}", path.display());
    path
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    /// Helper to run a test with env var removed
    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    // Each env var is touched by exactly one test.

    #[test]
    fn test_declarations_file_resolution() {
        assert_eq!(
            declarations_file(Some("/etc/settle/web.toml")),
            PathBuf::from("/etc/settle/web.toml")
        );

        with_env_var(ENV_FILE, "/srv/settle.toml", || {
            assert_eq!(declarations_file(None), PathBuf::from("/srv/settle.toml"));
            // The flag still wins over the environment
            assert_eq!(declarations_file(Some("local.toml")), PathBuf::from("local.toml"));
        });

        without_env_var(ENV_FILE, || {
            assert_eq!(declarations_file(None), PathBuf::from(DEFAULT_FILE));
        });
    }

    #[test]
    fn test_state_file_resolution() {
        with_env_var(ENV_STATE_FILE, "/var/lib/settle/state.json", || {
            assert_eq!(
                state_file(Path::new("settle.toml")),
                PathBuf::from("/var/lib/settle/state.json")
            );
        });

        without_env_var(ENV_STATE_FILE, || {
            assert_eq!(
                state_file(Path::new("settle.toml")),
                PathBuf::from("./.settle/state.json")
            );
            assert_eq!(
                state_file(Path::new("/srv/infra/settle.toml")),
                PathBuf::from("/srv/infra/.settle/state.json")
            );
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/infra/settle.toml");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("infra").join("settle.toml"));
    }

    #[test]
    fn test_expand_with_env_var() {
        with_env_var("SETTLE_TEST_VAR", "staging", || {
            let result = expand("/srv/$SETTLE_TEST_VAR/settle.toml");
            assert_eq!(result, PathBuf::from("/srv/staging/settle.toml"));
        });
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
