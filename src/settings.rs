//! Configuration files.
//!
//! Documents are read through the `config` crate, so TOML, YAML and JSON all
//! work. Environment variables prefixed with `WATCHTREE_` are layered on top
//! (`__` separates nested keys).
//!
//! ```toml
//! [[monitors]]
//! pattern = "*"
//! state = "disabled"
//!
//! [[monitors]]
//! pattern = "db.*"
//! state = "enabled"
//!
//! [[callbacks]]
//! kind = "filter"
//!
//! [[callbacks.rules]]
//! type = "must"
//! condition = "split > 50ms"
//! events = ["stop"]
//!
//! [[callbacks.callbacks]]
//! kind = "logging"
//! properties = { level = "warn" }
//! ```

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use watchtree_core::{ConfigDocument, Manager};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "WATCHTREE";

/// Reads the document at `path`, format chosen by extension.
pub fn load_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;
    settings.try_deserialize()
}

/// Loads the document at `path` and applies it to `manager`.
///
/// A file that cannot be read or parsed becomes a manager warning, as does
/// an invalid document. Returns whether the document was applied.
pub fn configure(manager: &dyn Manager, path: &Path) -> bool {
    match load_document(path) {
        Ok(document) => manager.apply_document(&document),
        Err(e) => {
            manager.warning(
                &format!("Failed to load configuration from '{}'", path.display()),
                Some(&e),
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use watchtree_core::{EnabledManager, MonitorState};

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_toml_document() {
        let file = write_file(
            ".toml",
            r#"
[[monitors]]
pattern = "*"
state = "disabled"

[[monitors]]
pattern = "stopwatch:db.*"
state = "enabled"

[[callbacks]]
kind = "filter"

[[callbacks.rules]]
type = "must-not"
pattern = "db.noisy"

[[callbacks.callbacks]]
kind = "logging"
properties = { level = "warn" }
"#,
        );

        let document = load_document(file.path()).unwrap();
        assert_eq!(document.monitors.len(), 2);
        assert_eq!(document.monitors[0].state, Some(MonitorState::Disabled));
        assert_eq!(document.callbacks[0].kind, "filter");
        assert_eq!(document.callbacks[0].callbacks[0].properties["level"], "warn");
    }

    #[test]
    fn loads_json_document() {
        let file = write_file(
            ".json",
            r#"{ "monitors": [{ "pattern": "web.*", "state": "disabled" }] }"#,
        );
        let document = load_document(file.path()).unwrap();
        assert_eq!(document.monitors[0].pattern, "web.*");
        assert!(document.callbacks.is_empty());
    }

    #[test]
    fn configure_applies_rules() {
        let file = write_file(
            ".yaml",
            "monitors:\n  - pattern: \"web.*\"\n    state: disabled\n",
        );
        let manager = EnabledManager::new();
        assert!(configure(&manager, file.path()));
        assert!(!manager.counter("web.hits").unwrap().is_enabled());
    }

    #[test]
    fn missing_file_is_a_warning() {
        let manager = EnabledManager::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(!configure(&manager, &dir.path().join("absent.toml")));
        assert!(manager.configuration().rules().is_empty());
    }
}
