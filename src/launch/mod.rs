//! Game launching
//!
//! Resolves a game's entry point, brackets the run with a statistics
//! session and hands the actual work to a [`ProcessHost`].

mod process;
mod resolver;
mod runtime_deps;

pub use process::{
    make_executable, ExitCallback, ExitReport, GameProcess, ProcessHost, SpawnRequest,
    SystemProcessHost,
};
pub use resolver::{
    candidate_names, is_probably_executable, resolve_launch_target, search_executable,
    LaunchTarget, Platform, MAX_SEARCH_DEPTH, WEB_ENTRY,
};
pub use runtime_deps::{match_runtime_dependency, RUNTIME_DEPENDENCY_PATTERNS};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::error::LauncherError;
use crate::logging::{log_error, log_launch, log_warning};
use crate::stats::{GameSession, StatisticsStore};

// ============================================================================
// Types
// ============================================================================

/// Knobs for a single launch
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub platform: Platform,
    pub env: BTreeMap<String, String>,
    /// How long to watch for an immediate crash before detaching
    pub exit_probe: Duration,
    /// Block until the game exits (CLI use)
    pub wait_for_exit: bool,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            env: BTreeMap::new(),
            exit_probe: Duration::from_millis(crate::config::DEFAULT_EXIT_PROBE_MS),
            wait_for_exit: false,
        }
    }
}

/// What the launcher did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LaunchAction {
    /// A process was started
    Spawned {
        pid: u32,
        path: PathBuf,
        /// The process already ended before `launch` returned
        exited: bool,
    },
    /// The web entry point was handed to the default handler
    OpenedWebEntry { path: PathBuf },
    /// Nothing runnable (or spawning failed): the game directory was revealed
    OpenedDirectory { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub game_name: String,
    #[serde(flatten)]
    pub action: LaunchAction,
    pub session: GameSession,
    /// Something went wrong but a fallback still gave the user a result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

// ============================================================================
// Launch
// ============================================================================

/// Launch the game installed at `root`.
///
/// A missing directory is the only failure that happens before a session is
/// opened. Fallback targets (web entry, directory) leave their session open
/// since no exit will ever be observed for them.
pub fn launch_game(
    game_name: &str,
    root: &Path,
    settings: &LaunchSettings,
    stats: &StatisticsStore,
    host: &dyn ProcessHost,
) -> Result<LaunchOutcome, LauncherError> {
    if !root.is_dir() {
        log_error(&format!("Game directory not found: {}", root.display()));
        return Err(LauncherError::not_found(game_name, root));
    }

    let target = resolve_launch_target(root, settings.platform);
    log_launch(&format!("{}: resolved {:?}", game_name, target));

    match target {
        LaunchTarget::Directory(dir) => {
            let session = stats.open_session(game_name);
            let warning = reveal(host, &dir)
                .err()
                .map(|e| format!("No executable found and the folder could not be opened: {}", e));
            Ok(LaunchOutcome {
                game_name: game_name.to_string(),
                action: LaunchAction::OpenedDirectory { path: dir },
                session,
                warning,
            })
        }
        LaunchTarget::WebEntry(page) => {
            let session = stats.open_session(game_name);
            match host.open_path(&page) {
                Ok(()) => Ok(LaunchOutcome {
                    game_name: game_name.to_string(),
                    action: LaunchAction::OpenedWebEntry { path: page },
                    session,
                    warning: None,
                }),
                Err(e) => {
                    log_warning(&format!("Could not open {}: {}", page.display(), e));
                    let _ = reveal(host, root);
                    Ok(LaunchOutcome {
                        game_name: game_name.to_string(),
                        action: LaunchAction::OpenedDirectory { path: root.to_path_buf() },
                        session,
                        warning: Some(format!("Could not open {} in a browser: {}", WEB_ENTRY, e)),
                    })
                }
            }
        }
        LaunchTarget::Executable(path) => {
            // Archives and fresh clones often lose the exec bit
            if let Err(e) = make_executable(&path) {
                log_warning(&format!("Could not mark {} executable: {}", path.display(), e));
            }
            let request = SpawnRequest {
                label: game_name.to_string(),
                program: path.clone(),
                args: Vec::new(),
                working_dir: root.to_path_buf(),
                env: settings.env.clone(),
            };
            spawn_tracked(game_name, root, path, request, settings, stats, host)
        }
        LaunchTarget::Script { interpreter, path } => {
            let request = SpawnRequest {
                label: game_name.to_string(),
                program: PathBuf::from(interpreter),
                args: vec![path.clone().into_os_string()],
                working_dir: root.to_path_buf(),
                env: settings.env.clone(),
            };
            spawn_tracked(game_name, root, path, request, settings, stats, host)
        }
    }
}

fn spawn_tracked(
    game_name: &str,
    root: &Path,
    path: PathBuf,
    request: SpawnRequest,
    settings: &LaunchSettings,
    stats: &StatisticsStore,
    host: &dyn ProcessHost,
) -> Result<LaunchOutcome, LauncherError> {
    // The session must be on disk before the process exists
    let session = stats.open_session(game_name);

    let mut process = match host.spawn(&request) {
        Ok(process) => process,
        Err(e) => {
            let text = e.to_string();
            log_error(&format!("Failed to start {}: {}", path.display(), text));
            stats.close_session(game_name);

            if let Some(message) = match_runtime_dependency(&text) {
                return Err(LauncherError::RuntimeDependency { message: message.to_string() });
            }

            let _ = reveal(host, root);
            return Ok(LaunchOutcome {
                game_name: game_name.to_string(),
                action: LaunchAction::OpenedDirectory { path: root.to_path_buf() },
                session,
                warning: Some(format!("Could not start {}: {}", path.display(), text)),
            });
        }
    };

    let pid = process.id();
    log_launch(&format!("Started {} (PID: {})", path.display(), pid));

    match process.wait_for_exit(settings.exit_probe) {
        Ok(Some(report)) => {
            stats.close_session(game_name);
            return finish_exited(game_name, path, pid, session, report);
        }
        Ok(None) => {}
        Err(e) => log_warning(&format!("Could not poll PID {}: {}", pid, e)),
    }

    if settings.wait_for_exit {
        let (tx, rx) = mpsc::channel();
        watch_exit(game_name, process, stats, Some(tx));
        return match rx.recv() {
            Ok(report) => finish_exited(game_name, path, pid, session, report),
            Err(_) => Ok(running(game_name, path, pid, session)),
        };
    }

    watch_exit(game_name, process, stats, None);
    Ok(running(game_name, path, pid, session))
}

/// Close the session when the process ends
fn watch_exit(
    game_name: &str,
    process: Box<dyn GameProcess>,
    stats: &StatisticsStore,
    notify: Option<mpsc::Sender<ExitReport>>,
) {
    let stats = stats.clone();
    let name = game_name.to_string();
    process.on_exit(Box::new(move |report| {
        log_launch(&format!("{} exited (code: {:?})", name, report.code));
        stats.close_session(&name);
        if let Some(tx) = notify {
            let _ = tx.send(report);
        }
    }));
}

fn finish_exited(
    game_name: &str,
    path: PathBuf,
    pid: u32,
    session: GameSession,
    report: ExitReport,
) -> Result<LaunchOutcome, LauncherError> {
    let mut warning = None;
    if !report.success {
        if let Some(message) = match_runtime_dependency(&report.stderr_tail) {
            log_error(&format!("{}: {}", game_name, report.stderr_tail.trim()));
            return Err(LauncherError::RuntimeDependency { message: message.to_string() });
        }
        let text = format!("{} exited with code {:?}", game_name, report.code);
        log_warning(&text);
        warning = Some(text);
    }

    Ok(LaunchOutcome {
        game_name: game_name.to_string(),
        action: LaunchAction::Spawned { pid, path, exited: true },
        session,
        warning,
    })
}

fn running(game_name: &str, path: PathBuf, pid: u32, session: GameSession) -> LaunchOutcome {
    LaunchOutcome {
        game_name: game_name.to_string(),
        action: LaunchAction::Spawned { pid, path, exited: false },
        session,
        warning: None,
    }
}

fn reveal(host: &dyn ProcessHost, dir: &Path) -> std::io::Result<()> {
    log_launch(&format!("Opening folder {}", dir.display()));
    host.open_path(dir).inspect_err(|e| {
        log_warning(&format!("Could not open folder {}: {}", dir.display(), e));
    })
}
