//! Repository installs through the `git` command line client

use std::path::Path;
use std::process::{Command, Output};

use crate::error::LauncherError;
use crate::logging::{log_error, log_install};

/// Version-control collaborator used for repository installs and updates
pub trait VersionControl: Send + Sync {
    /// Clone `url` into `dest`. Fails with `AlreadyExists` when `dest` exists.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), LauncherError>;

    /// Fast-forward the checkout at `dest`
    fn pull(&self, dest: &Path) -> Result<(), LauncherError>;
}

/// Shells out to `git`
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that git can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, action: &str, cmd: &mut Command) -> Result<Output, LauncherError> {
        // Never block on a credential prompt
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        let output = cmd.output().map_err(|e| {
            LauncherError::external(
                action,
                format!("could not run '{}' (is git installed?): {}", self.program, e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error(&format!("{} failed: {}", action, stderr));
            let reason = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(LauncherError::external(action, reason));
        }
        Ok(output)
    }
}

impl VersionControl for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), LauncherError> {
        if dest.exists() {
            let name = dest
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Err(LauncherError::already_exists(&name, dest));
        }

        log_install(&format!("Cloning {} into {}", url, dest.display()));
        self.run(
            "git clone",
            Command::new(&self.program)
                .arg("clone")
                .arg("--depth")
                .arg("1")
                .arg(url)
                .arg(dest),
        )?;
        Ok(())
    }

    fn pull(&self, dest: &Path) -> Result<(), LauncherError> {
        log_install(&format!("Pulling {}", dest.display()));
        self.run(
            "git pull",
            Command::new(&self.program)
                .arg("-C")
                .arg(dest)
                .arg("pull")
                .arg("--ff-only"),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn clone_into_existing_directory_is_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Foo");
        fs::create_dir_all(&dest).unwrap();

        // Checked before git is ever invoked
        let git = GitCli::with_program("definitely-not-git");
        let err = git.clone_repo("https://example.invalid/foo.git", &dest).unwrap_err();
        assert!(matches!(err, LauncherError::AlreadyExists { ref name, .. } if name == "Foo"));
    }

    #[test]
    fn missing_git_binary_is_external_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::with_program("definitely-not-git");
        assert!(!git.is_available());

        let err = git
            .clone_repo("https://example.invalid/foo.git", &dir.path().join("Foo"))
            .unwrap_err();
        assert!(matches!(err, LauncherError::ExternalTool { .. }));
    }

    #[test]
    fn clone_and_pull_local_repository() {
        let git = GitCli::new();
        if !git.is_available() {
            println!("git not installed, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        fs::create_dir_all(&origin).unwrap();
        fs::write(origin.join("game.sh"), "#!/bin/sh\n").unwrap();

        let git_in = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(&origin)
                .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
                .args(args)
                .output()
                .unwrap()
                .status;
            assert!(status.success(), "git {:?} failed", args);
        };
        git_in(&["init", "-q"]);
        git_in(&["add", "."]);
        git_in(&["commit", "-q", "-m", "initial"]);

        let dest = dir.path().join("games").join("Origin");
        let url = format!("file://{}", origin.display());
        git.clone_repo(&url, &dest).unwrap();
        assert!(dest.join("game.sh").exists());
        assert!(dest.join(".git").exists());

        git.pull(&dest).unwrap();
    }

    #[test]
    fn failed_clone_reports_git_stderr() {
        let git = GitCli::new();
        if !git.is_available() {
            println!("git not installed, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-repo");
        let err = git
            .clone_repo(&format!("file://{}", missing.display()), &dir.path().join("Foo"))
            .unwrap_err();
        match err {
            LauncherError::ExternalTool { tool, reason } => {
                assert_eq!(tool, "git clone");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
