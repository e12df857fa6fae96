// automaton_utils/src/lib.rs
//
// Shared environment/config/logging plumbing. Every crate that needs to read
// an env var, discover a .env file, or stand up tracing pulls this in instead
// of reimplementing its own copy.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `key`'s value, trimmed, or `None` if unset or blank after trimming.
pub fn env_nonempty(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse `key` into `T`, falling back to `default` if it's unset, blank, or
/// fails to parse. Centralizes the "env override, typed fallback" pattern
/// every config loader in this workspace needs.
pub fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    env_nonempty(key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Whether `key` holds one of the recognized truthy spellings, case-insensitive.
pub fn env_truthy(key: &str) -> bool {
    const TRUTHY: [&str; 5] = ["1", "true", "yes", "y", "on"];
    env_nonempty(key)
        .map(|s| TRUTHY.contains(&s.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load a `.env` file from `path`, overriding any variables already set.
pub fn try_load_dotenv_override(path: &Path) -> Result<(), String> {
    dotenvy::from_path_override(path)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Discover and load a `.env` file without the caller needing to name a path.
///
/// Resolution order:
/// 1. `AUTOMATON_DOTENV_PATH`, if set and the file exists.
/// 2. Walking up from the current working directory.
/// 3. Walking up from the running executable's directory.
///
/// Returns the path actually loaded, or `None` if nothing was found.
pub fn load_dotenv_best_effort() -> Option<PathBuf> {
    if let Some(p) = env_nonempty("AUTOMATON_DOTENV_PATH") {
        let path = PathBuf::from(p);
        if path.is_file() && try_load_dotenv_override(&path).is_ok() {
            return Some(path);
        }
    }

    let search_roots = [std::env::current_dir().ok(), current_exe_dir()];
    search_roots
        .into_iter()
        .flatten()
        .find_map(|root| find_dotenv_in_ancestors(&root))
}

fn current_exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn find_dotenv_in_ancestors(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(".env");
        (candidate.is_file() && try_load_dotenv_override(&candidate).is_ok())
            .then_some(candidate)
    })
}

/// Initialize `tracing` with `RUST_LOG`, defaulting to `"info"` if unset.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize `tracing` with `RUST_LOG`, defaulting to `default_level` if unset.
pub fn init_tracing_with_default(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn env_nonempty_trims_and_rejects_blank() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("AUTOMATON_UTILS_TEST_A", "  value  ");
        std::env::set_var("AUTOMATON_UTILS_TEST_B", "   ");
        assert_eq!(
            env_nonempty("AUTOMATON_UTILS_TEST_A"),
            Some("value".to_string())
        );
        assert_eq!(env_nonempty("AUTOMATON_UTILS_TEST_B"), None);
        std::env::remove_var("AUTOMATON_UTILS_TEST_A");
        std::env::remove_var("AUTOMATON_UTILS_TEST_B");
    }

    #[test]
    fn env_parsed_falls_back_on_missing_or_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("AUTOMATON_UTILS_TEST_N");
        assert_eq!(env_parsed("AUTOMATON_UTILS_TEST_N", 7u32), 7);

        std::env::set_var("AUTOMATON_UTILS_TEST_N", "not a number");
        assert_eq!(env_parsed("AUTOMATON_UTILS_TEST_N", 7u32), 7);

        std::env::set_var("AUTOMATON_UTILS_TEST_N", "42");
        assert_eq!(env_parsed("AUTOMATON_UTILS_TEST_N", 7u32), 42);
        std::env::remove_var("AUTOMATON_UTILS_TEST_N");
    }

    #[test]
    fn env_truthy_recognizes_common_spellings() {
        let _guard = ENV_LOCK.lock().unwrap();
        for v in ["1", "true", "TRUE", "yes", "y", "on"] {
            std::env::set_var("AUTOMATON_UTILS_TEST_T", v);
            assert!(env_truthy("AUTOMATON_UTILS_TEST_T"), "failed for {v}");
        }
        std::env::set_var("AUTOMATON_UTILS_TEST_T", "nope");
        assert!(!env_truthy("AUTOMATON_UTILS_TEST_T"));
        std::env::remove_var("AUTOMATON_UTILS_TEST_T");
    }
}
