use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::log_warning;

// ============================================================================
// Main App Config
// ============================================================================

/// Default time a launch waits for an early crash before detaching.
pub const DEFAULT_EXIT_PROBE_MS: u64 = 1500;

/// Environment applied to every game: SDL window placement and quieter
/// Mono runtimes.
pub const DEFAULT_LAUNCH_ENV: &[(&str, &str)] = &[
    ("SDL_VIDEO_WINDOW_POS", "0,0"),
    ("SDL_VIDEO_CENTERED", "1"),
    ("MONO_DEBUG", "no-gdb-backtrace"),
    ("MONO_ENV_OPTIONS", "--gc=sgen"),
];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where games are installed (defaults to `<data>/games`)
    pub games_dir: Option<PathBuf>,
    /// Where play statistics are stored (defaults to `<data>/stats.json`)
    pub stats_file: Option<PathBuf>,
    /// GitHub repository publishing installable archives
    pub repo_owner: String,
    pub repo_name: String,
    pub github_token: Option<String>,
    /// Extra environment variables for spawned games
    pub launch_env: BTreeMap<String, String>,
    pub exit_probe_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let launch_env = DEFAULT_LAUNCH_ENV
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            games_dir: None,
            stats_file: None,
            repo_owner: "RiptideStudio".to_string(),
            repo_name: "Earth-Library".to_string(),
            github_token: None,
            launch_env,
            exit_probe_ms: DEFAULT_EXIT_PROBE_MS,
        }
    }
}

impl AppConfig {
    fn get_path() -> PathBuf {
        earth_path!("config.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::get_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log_warning(&format!(
                        "Ignoring malformed config {}: {}",
                        path.display(),
                        e
                    )),
                },
                Err(e) => log_warning(&format!("Failed to read config {}: {}", path.display(), e)),
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        self.save_to(&Self::get_path());
    }

    pub fn save_to(&self, path: &Path) {
        // Ensure parent dir exists
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(path, json) {
                log_warning(&format!("Failed to save config {}: {}", path.display(), e));
            }
        }
    }

    /// Directory holding one sub-directory per installed game
    pub fn get_games_path(&self) -> PathBuf {
        self.games_dir
            .clone()
            .unwrap_or_else(|| earth_path!("games"))
    }

    /// JSON document holding the play statistics
    pub fn get_stats_path(&self) -> PathBuf {
        self.stats_file
            .clone()
            .unwrap_or_else(|| earth_path!("stats.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.exit_probe_ms, DEFAULT_EXIT_PROBE_MS);
        assert_eq!(config.launch_env.get("SDL_VIDEO_CENTERED").map(String::as_str), Some("1"));
    }

    #[test]
    fn default_launch_env_covers_sdl_and_mono() {
        let env = AppConfig::default().launch_env;
        assert_eq!(env.len(), 4);
        assert_eq!(env.get("SDL_VIDEO_WINDOW_POS").map(String::as_str), Some("0,0"));
        assert_eq!(env.get("MONO_DEBUG").map(String::as_str), Some("no-gdb-backtrace"));
        assert_eq!(env.get("MONO_ENV_OPTIONS").map(String::as_str), Some("--gc=sgen"));
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "repo_owner": "someone", "games_dir": "/tmp/games" }"#).unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.repo_owner, "someone");
        assert_eq!(config.repo_name, "Earth-Library");
        assert_eq!(config.get_games_path(), PathBuf::from("/tmp/games"));
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.stats_file = Some(dir.path().join("stats.json"));
        config.exit_probe_ms = 250;
        config.save_to(&path);

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.get_stats_path(), dir.path().join("stats.json"));
        assert_eq!(loaded.exit_probe_ms, 250);
    }

    #[test]
    fn malformed_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }
}
