//! Process spawning and exit observation
//!
//! Games are spawned detached from the launcher. The launcher keeps a
//! [`GameProcess`] handle only to learn when the game exits.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::logging::log_warning;

/// How much of a game's stderr is kept for error matching
const STDERR_TAIL_BYTES: usize = 8 * 1024;

// ============================================================================
// Types
// ============================================================================

/// Everything needed to start a game process
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Used to name the stderr capture file
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// How a game process ended
#[derive(Debug, Clone, PartialEq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub success: bool,
    pub stderr_tail: String,
}

pub type ExitCallback = Box<dyn FnOnce(ExitReport) + Send + 'static>;

/// Handle to a spawned game
pub trait GameProcess: Send {
    fn id(&self) -> u32;

    /// Wait at most `timeout`; `Some` if the process exited in that window
    fn wait_for_exit(&mut self, timeout: Duration) -> std::io::Result<Option<ExitReport>>;

    /// Deliver the exit report to `callback` once the process ends.
    ///
    /// The callback runs on a background thread; it never runs if the
    /// launcher exits first.
    fn on_exit(self: Box<Self>, callback: ExitCallback);
}

/// The host operating system's process facilities
pub trait ProcessHost: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> std::io::Result<Box<dyn GameProcess>>;

    /// Open a file or directory with its default handler
    fn open_path(&self, path: &Path) -> std::io::Result<()>;
}

// ============================================================================
// System implementation
// ============================================================================

/// `std::process` backed host. Game stderr is appended to `<capture_dir>/<label>.stderr.log`.
pub struct SystemProcessHost {
    capture_dir: PathBuf,
    opener: Option<PathBuf>,
}

/// Where a game's stderr is captured, and where this run's output starts
struct StderrCapture {
    path: PathBuf,
    offset: u64,
}

impl SystemProcessHost {
    pub fn new(capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            opener: None,
        }
    }

    /// Open paths with `program` instead of the platform's default handler
    #[must_use]
    pub fn with_opener(mut self, program: impl Into<PathBuf>) -> Self {
        self.opener = Some(program.into());
        self
    }

    fn stderr_target(&self, label: &str) -> (Stdio, Option<StderrCapture>) {
        if fs::create_dir_all(&self.capture_dir).is_err() {
            return (Stdio::null(), None);
        }
        let file_name: String = label
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = self.capture_dir.join(format!("{}.stderr.log", file_name));
        // Append: an earlier run of the same game may still be writing here
        let opened = OpenOptions::new().create(true).append(true).open(&path);
        match opened {
            Ok(file) => {
                let offset = file.metadata().map(|m| m.len()).unwrap_or(0);
                (Stdio::from(file), Some(StderrCapture { path, offset }))
            }
            Err(e) => {
                log_warning(&format!("Cannot capture stderr to {}: {}", path.display(), e));
                (Stdio::null(), None)
            }
        }
    }
}

impl ProcessHost for SystemProcessHost {
    fn spawn(&self, request: &SpawnRequest) -> std::io::Result<Box<dyn GameProcess>> {
        let (stderr, capture) = self.stderr_target(&request.label);

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.working_dir)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr);
        detach(&mut cmd);

        let child = cmd.spawn()?;
        Ok(Box::new(SystemGameProcess { child, capture }))
    }

    fn open_path(&self, path: &Path) -> std::io::Result<()> {
        let mut cmd = match &self.opener {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(path);
                cmd
            }
            None => opener_command(path),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Openers hand off to the real handler and return quickly
        let status = cmd.status()?;
        // explorer.exe exits with 1 even when the folder opened
        if status.success() || (cfg!(windows) && self.opener.is_none()) {
            return Ok(());
        }
        Err(std::io::Error::other(format!(
            "{:?} exited with {}",
            cmd.get_program(),
            status
        )))
    }
}

struct SystemGameProcess {
    child: Child,
    capture: Option<StderrCapture>,
}

impl SystemGameProcess {
    fn report(&self, status: ExitStatus) -> ExitReport {
        ExitReport {
            code: status.code(),
            success: status.success(),
            stderr_tail: self
                .capture
                .as_ref()
                .map(|c| read_tail(&c.path, c.offset))
                .unwrap_or_default(),
        }
    }
}

impl GameProcess for SystemGameProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> std::io::Result<Option<ExitReport>> {
        let status = self.child.wait_timeout(timeout)?;
        Ok(status.map(|s| self.report(s)))
    }

    fn on_exit(mut self: Box<Self>, callback: ExitCallback) {
        std::thread::spawn(move || match self.child.wait() {
            Ok(status) => {
                let report = self.report(status);
                callback(report);
            }
            Err(e) => log_warning(&format!(
                "Lost track of process {}: {}",
                self.child.id(),
                e
            )),
        });
    }
}

/// Last bytes written to `path` after `offset`
fn read_tail(path: &Path, offset: u64) -> String {
    match fs::read(path) {
        Ok(bytes) => {
            let from = usize::try_from(offset).unwrap_or(0).min(bytes.len());
            let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES).max(from);
            String::from_utf8_lossy(&bytes[start..]).into_owned()
        }
        Err(_) => String::new(),
    }
}

// ============================================================================
// Platform helpers
// ============================================================================

/// Put the child in its own process group / console so it outlives the launcher
#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}

fn opener_command(path: &Path) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("explorer");
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

/// Set 0o755 on `path`
#[cfg(unix)]
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn request(dir: &Path, script: &str) -> SpawnRequest {
        SpawnRequest {
            label: "Test Game".to_string(),
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            working_dir: dir.to_path_buf(),
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn make_executable_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("game");
        fs::write(&file, "#!/bin/sh\n").unwrap();

        make_executable(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn early_exit_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path().join("capture"));

        let mut process = host
            .spawn(&request(dir.path(), "echo 'libSDL2 missing' >&2; exit 3"))
            .unwrap();
        let report = process
            .wait_for_exit(Duration::from_secs(10))
            .unwrap()
            .expect("process should have exited");

        assert_eq!(report.code, Some(3));
        assert!(!report.success);
        assert!(report.stderr_tail.contains("libSDL2 missing"));
        assert!(dir.path().join("capture/Test_Game.stderr.log").exists());
    }

    #[test]
    fn on_exit_delivers_report() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path());
        let process = host.spawn(&request(dir.path(), "exit 0")).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        process.on_exit(Box::new(move |report| {
            let _ = tx.send(report);
        }));

        let report = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(report.success);
    }

    #[test]
    fn env_and_working_dir_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), "[ \"$EARTH_TEST\" = yes ] && [ -f marker ]");
        req.env.insert("EARTH_TEST".to_string(), "yes".to_string());
        fs::write(dir.path().join("marker"), "").unwrap();

        let host = SystemProcessHost::new(dir.path().join("capture"));
        let mut process = host.spawn(&req).unwrap();
        let report = process.wait_for_exit(Duration::from_secs(10)).unwrap().unwrap();
        assert!(report.success);
    }

    #[test]
    fn relaunch_appends_to_stderr_capture() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path().join("capture"));

        let mut first = host.spawn(&request(dir.path(), "sleep 0.5; echo late >&2")).unwrap();
        let mut second = host.spawn(&request(dir.path(), "echo second >&2")).unwrap();

        let report = second.wait_for_exit(Duration::from_secs(10)).unwrap().unwrap();
        assert!(report.stderr_tail.contains("second"));

        let report = first.wait_for_exit(Duration::from_secs(10)).unwrap().unwrap();
        assert!(report.stderr_tail.contains("late"));

        let captured = fs::read_to_string(dir.path().join("capture/Test_Game.stderr.log")).unwrap();
        assert!(captured.contains("second"));
        assert!(captured.contains("late"));
    }

    #[test]
    fn stderr_tail_only_covers_the_current_run() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path().join("capture"));

        let mut old = host.spawn(&request(dir.path(), "echo 'libSDL2 missing' >&2; exit 1")).unwrap();
        old.wait_for_exit(Duration::from_secs(10)).unwrap().unwrap();

        let mut fresh = host.spawn(&request(dir.path(), "echo fine >&2")).unwrap();
        let report = fresh.wait_for_exit(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(report.stderr_tail.trim(), "fine");
    }

    #[test]
    fn failing_opener_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path()).with_opener("false");
        assert!(host.open_path(dir.path()).is_err());

        let host = SystemProcessHost::new(dir.path()).with_opener("true");
        assert!(host.open_path(dir.path()).is_ok());
    }

    #[test]
    fn missing_opener_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path()).with_opener(dir.path().join("no-opener"));
        assert!(host.open_path(dir.path()).is_err());
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let host = SystemProcessHost::new(dir.path());
        let mut req = request(dir.path(), "");
        req.program = dir.path().join("does-not-exist");
        assert!(host.spawn(&req).is_err());
    }
}
