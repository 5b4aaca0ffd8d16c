//! Config file discovery and loading.
//!
//! Resolution order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `~/.config/a700/config.yaml` (XDG user config)
//! 3. `./.env` (never overriding variables already set)
//! 4. Process environment
//! 5. CLI arguments (passed in as [`Overrides`])

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{A700Config, ConfigError, FileConfig, Overrides, Result};

/// Default config filename within the config directory.
const USER_CONFIG_FILE: &str = "config.yaml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "a700";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "A700_CONFIG_DIR";

/// Where to look for each layer.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Config directory; defaults to [`config_dir`].
    pub config_dir: Option<PathBuf>,
    /// `.env` file; defaults to `./.env`.
    pub env_file: Option<PathBuf>,
    /// Command-line values.
    pub overrides: Overrides,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The resolved configuration.
    pub config: A700Config,
    /// Config file that was read, if any.
    pub source: Option<PathBuf>,
    /// Warnings generated during loading (e.g., plaintext passwords).
    pub warnings: Vec<String>,
}

/// Discover and resolve all layers against the process environment.
pub fn load_config(options: &LoadOptions) -> Result<LoadedConfig> {
    let mut warnings = Vec::new();

    let path = match &options.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => config_path(),
    };
    let (file, source) = match path {
        Some(path) if path.is_file() => (load_config_file(&path)?, Some(path)),
        _ => (FileConfig::default(), None),
    };

    if file.password.is_some() {
        warnings.push(
            "config.yaml contains a plaintext password. \
             Consider the PASSWORD environment variable instead."
                .to_string(),
        );
    }

    let env_file = options
        .env_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(".env"));
    let dotenv = read_env_file(&env_file)?;

    let lookup = |key: &str| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned());
    let config = A700Config::resolve(&file, lookup, &options.overrides)?;

    tracing::debug!(source = ?source, streaming = config.streaming, "configuration loaded");

    Ok(LoadedConfig {
        config,
        source,
        warnings,
    })
}

/// Load a config file from a specific path (no discovery).
pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    FileConfig::from_yaml(&contents)
}

/// Read a `.env` file into a map without touching the process environment.
/// A missing file is an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let to_error = |e: dotenvy::Error| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    dotenvy::from_path_iter(path)
        .map_err(to_error)?
        .map(|item| item.map_err(to_error))
        .collect()
}

/// Get the config file path for a700.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the config directory for a700.
///
/// Checks `A700_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/a700` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("logs"))
}

/// Default directory for conversation and session files.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(".a700"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(config_dir: &TempDir, env_file: PathBuf) -> LoadOptions {
        LoadOptions {
            config_dir: Some(config_dir.path().to_path_buf()),
            env_file: Some(env_file),
            overrides: Overrides::default(),
        }
    }

    #[test]
    fn test_config_path_shape() {
        if let Some(p) = config_path() {
            assert!(p.ends_with("config.yaml"));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "streaming: [unclosed").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "max-history-chars: 1000\nmax-tool-rounds: 2\n",
        )
        .unwrap();

        let loaded = load_config(&options(&dir, dir.path().join("missing.env"))).unwrap();
        assert_eq!(loaded.config.max_history_chars, 1000);
        assert_eq!(loaded.config.max_tool_rounds, 2);
        assert!(loaded.source.unwrap().ends_with("config.yaml"));
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(&options(&dir, dir.path().join("missing.env"))).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.max_tool_rounds, 5);
    }

    #[test]
    fn test_plaintext_password_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.yaml"), "password: hunter2\n").unwrap();

        let loaded = load_config(&options(&dir, dir.path().join("missing.env"))).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
    }

    #[test]
    fn test_read_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# comment\nA700_TEST_ONLY_KEY=from-dotenv\nQUOTED=\"a b\"\n",
        )
        .unwrap();

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.get("A700_TEST_ONLY_KEY").map(String::as_str), Some("from-dotenv"));
        assert_eq!(vars.get("QUOTED").map(String::as_str), Some("a b"));

        assert!(read_env_file(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_dotenv_layer_feeds_resolution() {
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(&env_path, "AGENT_UUID=6f1c2a34-0b7e-4c55-9d0e-2f3a4b5c6d7e\n").unwrap();

        // Only meaningful when the test process itself has no AGENT_UUID.
        if std::env::var("AGENT_UUID").is_err() {
            let loaded = load_config(&options(&dir, env_path)).unwrap();
            assert_eq!(
                loaded.config.agent_uuid.as_deref(),
                Some("6f1c2a34-0b7e-4c55-9d0e-2f3a4b5c6d7e")
            );
        }
    }
}
