//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/sesame/config.toml` (XDG user config)
//! 2. `./sesame.toml` (project-local)
//! 3. An explicit file (`--config`)
//! 4. Environment (`SESAME_DB_PATH`, `SESAME_COOKIE_AGE`)
//! 5. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SesameConfig, StoreSection};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "sesame.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "sesame";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "SESAME_CONFIG_DIR";

/// Environment variable overriding `store.database`.
pub const DB_PATH_ENV: &str = "SESAME_DB_PATH";

/// Environment variable overriding `session.cookie_age`.
pub const COOKIE_AGE_ENV: &str = "SESAME_COOKIE_AGE";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SesameConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., malformed discovered files).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers, then
/// applying environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(None, None, explicit)
}

/// Load configuration with explicit control over the search locations.
///
/// `config_dir` overrides both `SESAME_CONFIG_DIR` and the platform default;
/// `project_dir` replaces the working directory for `sesame.toml`. Discovered
/// files that fail to parse produce warnings. An `explicit` file must exist
/// and parse.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = SesameConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // 3. Explicit file
    if let Some(path) = explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        });
    }

    // 4. Environment
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SesameConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SesameConfig::from_toml(&contents)
}

/// Apply environment overrides read through `lookup`.
///
/// Empty values are ignored. Overrides touch single fields, keeping the rest
/// of the section as loaded.
pub fn apply_env_overrides<F>(config: &mut SesameConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(path) = get(DB_PATH_ENV) {
        config.store.get_or_insert_with(StoreSection::default).database = Some(path.into());
    }

    if let Some(raw) = get(COOKIE_AGE_ENV) {
        let age = raw
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidValue {
                field: COOKIE_AGE_ENV.to_string(),
                reason: format!("'{raw}' is not an integer: {e}"),
            })?;
        config.session.get_or_insert_with(Default::default).cookie_age = age;
    }

    Ok(())
}

/// Get the XDG config file path for sesame.
///
/// Checks `SESAME_CONFIG_DIR` env var first, then falls back to platform default
/// (`~/.config/sesame/config.toml` on Linux, `~/Library/Application Support/sesame/config.toml` on macOS).
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for sesame.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Platform data directory for sesame, falling back to `./.sesame`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".sesame"))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut SesameConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let loaded = load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_layers_override_in_order() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();

        fs::write(
            user.path().join("config.toml"),
            "[session]\ncookie_age = 100\n\n[store]\nsweep_interval_secs = 7\n",
        )
        .unwrap();
        fs::write(
            project.path().join("sesame.toml"),
            "[session]\ncookie_age = 200\n",
        )
        .unwrap();
        let explicit = extra.path().join("override.toml");
        fs::write(&explicit, "[logging]\nlevel = \"debug\"\n").unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), Some(&explicit))
                .unwrap();

        assert_eq!(loaded.config.session().cookie_age, 200);
        assert_eq!(loaded.config.store().sweep_interval_secs, 7);
        assert_eq!(loaded.config.logging().level, "debug");
        assert_eq!(loaded.loaded_from().len(), 3);
    }

    #[test]
    fn test_malformed_discovered_file_warns_but_continues() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("sesame.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path()), None).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let missing = project.path().join("nope.toml");

        let err = load_config_with_options(Some(project.path()), Some(user.path()), Some(&missing))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_env_overrides_single_fields() {
        let mut config =
            SesameConfig::from_toml("[session]\ncookie_name = \"sid\"\n").unwrap();
        apply_env_overrides(
            &mut config,
            env(&[(DB_PATH_ENV, "/tmp/env.db"), (COOKIE_AGE_ENV, "42")]),
        )
        .unwrap();

        assert_eq!(config.session().cookie_age, 42);
        assert_eq!(config.session().cookie_name, "sid");
        assert_eq!(config.store().database, Some(PathBuf::from("/tmp/env.db")));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = SesameConfig::new();
        let err = apply_env_overrides(&mut config, env(&[(COOKIE_AGE_ENV, "two weeks")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = SesameConfig::new();
        apply_env_overrides(&mut config, env(&[(DB_PATH_ENV, ""), (COOKIE_AGE_ENV, " ")])).unwrap();
        assert!(config.store.is_none());
        assert!(config.session.is_none());
    }
}
