//! Launcher context and the operations exposed to the UI
//!
//! [`Launcher`] owns the resolved paths, the statistics store and the
//! external collaborators. Every public operation catches its own failures
//! and returns a [`CommandResponse`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::error::LauncherError;
use crate::installers::{GitCli, Progress, VersionControl};
use crate::launch::{
    launch_game, make_executable, resolve_launch_target, LaunchOutcome, LaunchSettings,
    LaunchTarget, ProcessHost, SystemProcessHost,
};
use crate::logging::{log_action, log_error, log_install, log_warning};
use crate::stats::{GameStatistics, StaleSession, StatisticsStore};
use crate::utils::{directory_size, format_size, repo_name_from_url, validate_game_name};

// ============================================================================
// Response / Payload Types
// ============================================================================

/// Result of one UI operation
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> CommandResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            warning: None,
        }
    }

    pub fn fail(error: &LauncherError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            warning: None,
        }
    }

    fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}

impl<T> From<Result<T, LauncherError>> for CommandResponse<T> {
    fn from(result: Result<T, LauncherError>) -> Self {
        match result {
            Ok(data) => CommandResponse::ok(data),
            Err(e) => {
                log_error(&e.to_string());
                CommandResponse::fail(&e)
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    Repository,
    Archive,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstalledGame {
    pub name: String,
    pub path: PathBuf,
    pub source: InstallSource,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSize {
    pub bytes: u64,
    pub display: String,
}

// ============================================================================
// Launcher
// ============================================================================

pub struct Launcher {
    config: AppConfig,
    games_dir: PathBuf,
    stats: StatisticsStore,
    settings: LaunchSettings,
    host: Box<dyn ProcessHost>,
    vcs: Box<dyn VersionControl>,
    progress: Progress,
}

impl Launcher {
    /// Context built from the persisted configuration
    pub fn from_config(config: AppConfig) -> Self {
        let games_dir = config.get_games_path();
        let stats = StatisticsStore::new(config.get_stats_path());
        let settings = LaunchSettings {
            env: config.launch_env.clone(),
            exit_probe: Duration::from_millis(config.exit_probe_ms),
            ..LaunchSettings::default()
        };

        Self {
            games_dir,
            stats,
            settings,
            host: Box::new(SystemProcessHost::new(earth_path!("logs"))),
            vcs: Box::new(GitCli::new()),
            progress: Progress::none(),
            config,
        }
    }

    /// Context rooted at explicit paths, using the system collaborators
    pub fn new(games_dir: impl Into<PathBuf>, stats_file: impl Into<PathBuf>) -> Self {
        let config = AppConfig {
            games_dir: Some(games_dir.into()),
            stats_file: Some(stats_file.into()),
            ..AppConfig::default()
        };
        Self::from_config(config)
    }

    #[must_use]
    pub fn with_process_host(mut self, host: impl ProcessHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    #[must_use]
    pub fn with_version_control(mut self, vcs: impl VersionControl + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    #[must_use]
    pub fn with_launch_settings(mut self, settings: LaunchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Block `launch` until the game exits so its session is closed in-process
    #[must_use]
    pub fn with_wait_for_exit(mut self, wait: bool) -> Self {
        self.settings.wait_for_exit = wait;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }

    pub fn statistics_store(&self) -> &StatisticsStore {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // UI operations
    // ------------------------------------------------------------------------

    pub fn install_from_repository(&self, url: &str, name: &str) -> CommandResponse<InstalledGame> {
        log_action(&format!("Install from repository: {} as '{}'", url, name));
        self.try_install_from_repository(url, name).into()
    }

    #[cfg(feature = "installer")]
    pub fn install_from_archive(&self, url: &str, name: &str) -> CommandResponse<InstalledGame> {
        log_action(&format!("Install from archive: {} as '{}'", url, name));
        self.try_install_from_archive(url, name).into()
    }

    /// Copy a game folder that already exists on disk into the library
    pub fn add_local(&self, source: &Path, name: &str) -> CommandResponse<InstalledGame> {
        log_action(&format!("Add local game: {} as '{}'", source.display(), name));
        self.try_add_local(source, name).into()
    }

    pub fn update_installed(&self, name: &str) -> CommandResponse<InstalledGame> {
        log_action(&format!("Update: {}", name));
        self.try_update(name).into()
    }

    pub fn list_installed(&self) -> CommandResponse<Vec<InstalledGame>> {
        self.try_list_installed().into()
    }

    pub fn size_of(&self, name: &str) -> CommandResponse<GameSize> {
        self.try_size_of(name).into()
    }

    pub fn launch(&self, name: &str) -> CommandResponse<LaunchOutcome> {
        log_action(&format!("Launch: {}", name));
        match self.try_launch(name) {
            Ok(outcome) => {
                let warning = outcome.warning.clone();
                CommandResponse::ok(outcome).with_warning(warning)
            }
            Err(e) => Err::<LaunchOutcome, _>(e).into(),
        }
    }

    pub fn delete(&self, name: &str) -> CommandResponse<String> {
        log_action(&format!("Delete: {}", name));
        self.try_delete(name).into()
    }

    pub fn get_statistics(&self, name: &str) -> CommandResponse<GameStatistics> {
        CommandResponse::ok(self.stats.get_statistics(name))
    }

    pub fn get_all_statistics(&self) -> CommandResponse<Vec<GameStatistics>> {
        CommandResponse::ok(self.stats.list_all())
    }

    /// Sessions open for more than `max_age_hours`; reported, never closed
    pub fn stale_sessions(&self, max_age_hours: f64) -> CommandResponse<Vec<StaleSession>> {
        let max_age = chrono::Duration::seconds((max_age_hours.max(0.0) * 3600.0) as i64);
        CommandResponse::ok(self.stats.open_sessions_older_than(max_age, chrono::Utc::now()))
    }

    #[cfg(feature = "installer")]
    pub fn fetch_catalog(&self) -> CommandResponse<Vec<crate::catalog::CatalogEntry>> {
        CommandResponse::ok(crate::catalog::load_catalog(
            &self.config.repo_owner,
            &self.config.repo_name,
            self.config.github_token.as_deref(),
            &self.games_dir,
        ))
    }

    // ------------------------------------------------------------------------
    // Implementations
    // ------------------------------------------------------------------------

    fn game_path(&self, name: &str) -> Result<PathBuf, LauncherError> {
        validate_game_name(name).map_err(|reason| LauncherError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        Ok(self.games_dir.join(name))
    }

    fn existing_game_path(&self, name: &str) -> Result<PathBuf, LauncherError> {
        let path = self.game_path(name)?;
        if !path.is_dir() {
            return Err(LauncherError::not_found(name, &path));
        }
        Ok(path)
    }

    fn ensure_games_dir(&self) -> Result<(), LauncherError> {
        fs::create_dir_all(&self.games_dir).map_err(|e| {
            LauncherError::io(format!("Failed to create {}", self.games_dir.display()), e)
        })
    }

    fn installed(&self, name: &str, path: PathBuf) -> InstalledGame {
        let source = if path.join(".git").exists() {
            InstallSource::Repository
        } else {
            InstallSource::Archive
        };
        InstalledGame {
            name: name.to_string(),
            path,
            source,
        }
    }

    /// Give the resolved entry point its exec bit right after install
    fn prepare_entry_point(&self, path: &Path) {
        if let LaunchTarget::Executable(exe) = resolve_launch_target(path, self.settings.platform) {
            match make_executable(&exe) {
                Ok(()) => log_install(&format!("Set execute permissions on: {}", exe.display())),
                Err(e) => log_warning(&format!(
                    "Error setting permissions on {}: {}",
                    exe.display(),
                    e
                )),
            }
        }
    }

    fn try_install_from_repository(&self, url: &str, name: &str) -> Result<InstalledGame, LauncherError> {
        let name = if name.trim().is_empty() {
            repo_name_from_url(url).unwrap_or_default()
        } else {
            name.to_string()
        };
        let path = self.game_path(&name)?;
        if path.exists() {
            return Err(LauncherError::already_exists(&name, &path));
        }
        self.ensure_games_dir()?;

        self.progress.report("Cloning", 0.0);
        if let Err(e) = self.vcs.clone_repo(url, &path) {
            // Do not leave a half-cloned checkout behind
            if path.exists() && !matches!(e, LauncherError::AlreadyExists { .. }) {
                let _ = fs::remove_dir_all(&path);
            }
            return Err(e);
        }
        self.progress.report("Cloning", 1.0);

        self.prepare_entry_point(&path);
        log_install(&format!("Installed {} from {}", name, url));
        Ok(self.installed(&name, path))
    }

    #[cfg(feature = "installer")]
    fn try_install_from_archive(&self, url: &str, name: &str) -> Result<InstalledGame, LauncherError> {
        use crate::installers::{archive_name_from_url, extract_archive, fetch_archive, ArchiveKind};

        let name = if name.trim().is_empty() {
            archive_name_from_url(url).unwrap_or_default()
        } else {
            name.to_string()
        };
        let path = self.game_path(&name)?;
        if path.exists() {
            return Err(LauncherError::already_exists(&name, &path));
        }
        self.ensure_games_dir()?;

        let fetched = fetch_archive(url, &self.games_dir, &name, &self.progress)
            .map_err(|e| LauncherError::external("download", e))?;

        let extracted = extract_archive(&fetched.path, ArchiveKind::from_name(url), &path, &self.progress);

        if fetched.temporary {
            let _ = fs::remove_file(&fetched.path);
        }
        if let Err(e) = extracted {
            if path.exists() {
                let _ = fs::remove_dir_all(&path);
            }
            return Err(LauncherError::external("extract", e));
        }

        self.prepare_entry_point(&path);
        log_install(&format!("Installed {} from {}", name, url));
        Ok(self.installed(&name, path))
    }

    fn try_add_local(&self, source: &Path, name: &str) -> Result<InstalledGame, LauncherError> {
        // A picked executable stands for the folder it lives in
        let folder = if source.is_file() {
            source.parent().unwrap_or(source)
        } else {
            source
        };

        let name = if name.trim().is_empty() {
            folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            name.to_string()
        };
        let path = self.game_path(&name)?;
        if !folder.is_dir() {
            return Err(LauncherError::not_found(&name, folder));
        }
        if path.exists() {
            return Err(LauncherError::already_exists(&name, &path));
        }
        if self.games_dir.starts_with(folder) {
            return Err(LauncherError::io(
                format!("Cannot add {}", folder.display()),
                "it contains the games directory",
            ));
        }
        self.ensure_games_dir()?;

        self.progress.report("Copying", 0.0);
        if let Err(e) = copy_dir(folder, &path) {
            let _ = fs::remove_dir_all(&path);
            return Err(LauncherError::io(format!("Failed to copy {}", folder.display()), e));
        }
        self.progress.report("Copying", 1.0);

        self.prepare_entry_point(&path);
        log_install(&format!("Added {} from {}", name, folder.display()));
        Ok(self.installed(&name, path))
    }

    fn try_update(&self, name: &str) -> Result<InstalledGame, LauncherError> {
        let path = self.existing_game_path(name)?;
        if !path.join(".git").exists() {
            return Err(LauncherError::NotUpdatable { name: name.to_string() });
        }
        self.vcs.pull(&path)?;
        self.prepare_entry_point(&path);
        Ok(self.installed(name, path))
    }

    fn try_list_installed(&self) -> Result<Vec<InstalledGame>, LauncherError> {
        if !self.games_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.games_dir).map_err(|e| {
            LauncherError::io(format!("Failed to read {}", self.games_dir.display()), e)
        })?;

        let mut games: Vec<InstalledGame> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                // Staging folders and other hidden entries
                if name.starts_with('.') {
                    return None;
                }
                Some(self.installed(&name, e.path()))
            })
            .collect();

        games.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(games)
    }

    fn try_size_of(&self, name: &str) -> Result<GameSize, LauncherError> {
        let path = self.existing_game_path(name)?;
        let bytes = directory_size(&path);
        Ok(GameSize {
            bytes,
            display: format_size(bytes),
        })
    }

    fn try_launch(&self, name: &str) -> Result<LaunchOutcome, LauncherError> {
        let path = self.game_path(name)?;
        launch_game(name, &path, &self.settings, &self.stats, self.host.as_ref())
    }

    fn try_delete(&self, name: &str) -> Result<String, LauncherError> {
        let path = self.existing_game_path(name)?;
        fs::remove_dir_all(&path)
            .map_err(|e| LauncherError::io(format!("Failed to delete {}", path.display()), e))?;
        // Statistics are kept so totals survive a reinstall
        log_install(&format!("Deleted {}", name));
        Ok(name.to_string())
    }
}

/// Recursive copy of `from` into a new directory `to`
fn copy_dir(from: &Path, to: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            log_warning(&format!("Skipping special file {}", entry.path().display()));
        }
    }
    Ok(())
}
