//! Entry point discovery inside an installed game directory

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

/// Directory levels below the game root that the fallback search descends
pub const MAX_SEARCH_DEPTH: usize = 3;

/// Base names a game's main executable usually has, most likely first
const MAIN_EXECUTABLES: &[&str] = &[
    "GameRuntime", "game", "main", "start", "run", "launch", "app", "program",
];

/// Universal fallback for browser games
pub const WEB_ENTRY: &str = "index.html";

/// Extensionless files that are never the game
const NON_EXECUTABLE_NAMES: &[&str] = &[
    "readme", "license", "licence", "copying", "authors", "changelog",
    "changes", "contributing", "notice", "makefile", "dockerfile",
    "procfile", "gemfile", "rakefile", "vagrantfile", "todo", "version",
];

// ============================================================================
// Platform
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Suffixes (lowercase, no dot) that mark a native executable or launcher script
    pub fn executable_extensions(self) -> &'static [&'static str] {
        match self {
            Platform::Windows => &["exe", "bat", "cmd"],
            Platform::Linux => &["x86_64", "appimage", "sh", "bin", "elf"],
            Platform::MacOs => &["command", "sh"],
        }
    }

    fn allows_extensionless(self) -> bool {
        self != Platform::Windows
    }
}

// ============================================================================
// Launch Targets
// ============================================================================

/// What a launch ends up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Spawn the file directly
    Executable(PathBuf),
    /// Run the file through an interpreter
    Script { interpreter: String, path: PathBuf },
    /// Hand the markup file to the default handler (browser)
    WebEntry(PathBuf),
    /// Nothing runnable: reveal the game directory
    Directory(PathBuf),
}

/// Priority-ordered candidate file names for `platform`.
///
/// Native extensions come first, then extensionless Unix names, then Python
/// entry scripts, then the web entry point.
pub fn candidate_names(platform: Platform) -> Vec<String> {
    let mut names = Vec::new();

    let native: &[&str] = match platform {
        Platform::Windows => &["exe", "bat", "cmd"],
        Platform::Linux => &["x86_64", "AppImage", "sh"],
        Platform::MacOs => &["command", "sh"],
    };
    for ext in native {
        for base in MAIN_EXECUTABLES {
            names.push(format!("{}.{}", base, ext));
        }
    }

    if platform.allows_extensionless() {
        names.extend(MAIN_EXECUTABLES.iter().map(|base| base.to_string()));
    }

    names.extend(MAIN_EXECUTABLES.iter().map(|base| format!("{}.py", base)));
    names.push(WEB_ENTRY.to_string());
    names
}

/// Looser check used by the recursive search
pub fn is_probably_executable(file_name: &str, platform: Platform) -> bool {
    if file_name.starts_with('.') {
        return false;
    }

    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            platform.executable_extensions().contains(&ext.as_str())
        }
        None => {
            platform.allows_extensionless()
                && !NON_EXECUTABLE_NAMES.contains(&file_name.to_ascii_lowercase().as_str())
        }
    }
}

/// Find the entry point of the game rooted at `root`.
///
/// Root-level candidates win in list order. Otherwise the shallowest file
/// passing [`is_probably_executable`] within [`MAX_SEARCH_DEPTH`] directory
/// levels is used. With no match the directory itself is returned.
pub fn resolve_launch_target(root: &Path, platform: Platform) -> LaunchTarget {
    for name in candidate_names(platform) {
        let path = root.join(&name);
        if path.is_file() {
            return classify(path, platform);
        }
    }

    match search_executable(root, platform) {
        Some(path) => classify(path, platform),
        None => LaunchTarget::Directory(root.to_path_buf()),
    }
}

/// Bounded depth-first search for an executable-looking file.
///
/// Entries are visited in file-name order; hidden files and directories are
/// skipped. Returns the first match at the shallowest depth that has one.
pub fn search_executable(root: &Path, platform: Platform) -> Option<PathBuf> {
    // walkdir depth 1 = files in the root, MAX_SEARCH_DEPTH + 1 = files in
    // the deepest searched directory
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_SEARCH_DEPTH + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    let mut best: Option<(usize, PathBuf)> = None;

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let depth = entry.depth();
        if best.as_ref().is_some_and(|(d, _)| *d <= depth) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if is_probably_executable(&name, platform) {
            if depth == 1 {
                return Some(entry.into_path());
            }
            best = Some((depth, entry.into_path()));
        }
    }

    best.map(|(_, path)| path)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn classify(path: PathBuf, platform: Platform) -> LaunchTarget {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => LaunchTarget::WebEntry(path),
        Some("py") => LaunchTarget::Script {
            interpreter: python_interpreter(platform).to_string(),
            path,
        },
        _ => LaunchTarget::Executable(path),
    }
}

fn python_interpreter(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "python",
        _ => "python3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    #[test]
    fn candidate_order_is_native_then_bare_then_web() {
        let names = candidate_names(Platform::Linux);
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();

        assert!(pos("GameRuntime.x86_64") < pos("game.sh"));
        assert!(pos("game.sh") < pos("GameRuntime"));
        assert!(pos("program") < pos("main.py"));
        assert_eq!(names.last().map(String::as_str), Some(WEB_ENTRY));
    }

    #[test]
    fn windows_candidates_have_no_bare_names() {
        let names = candidate_names(Platform::Windows);
        assert_eq!(names[0], "GameRuntime.exe");
        assert!(!names.iter().any(|n| n == "game"));
        assert!(names.contains(&WEB_ENTRY.to_string()));
    }

    #[test]
    fn executable_predicate_per_platform() {
        assert!(is_probably_executable("Game.exe", Platform::Windows));
        assert!(is_probably_executable("GAME.EXE", Platform::Windows));
        assert!(!is_probably_executable("Game", Platform::Windows));

        assert!(is_probably_executable("MyGame", Platform::Linux));
        assert!(is_probably_executable("MyGame.x86_64", Platform::Linux));
        assert!(is_probably_executable("run.sh", Platform::MacOs));
        assert!(!is_probably_executable("README", Platform::Linux));
        assert!(!is_probably_executable("notes.txt", Platform::Linux));
        assert!(!is_probably_executable(".hidden", Platform::Linux));
        assert!(!is_probably_executable("index.html", Platform::Linux));
    }

    #[test]
    fn only_index_html_opens_in_browser() {
        let dir = tempfile::tempdir().unwrap();
        let index = touch(dir.path(), "index.html");

        assert_eq!(
            resolve_launch_target(dir.path(), Platform::Linux),
            LaunchTarget::WebEntry(index)
        );
    }

    #[test]
    fn root_candidates_follow_list_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.html");
        touch(dir.path(), "main");
        let native = touch(dir.path(), "start.sh");

        assert_eq!(
            resolve_launch_target(dir.path(), Platform::Linux),
            LaunchTarget::Executable(native)
        );
    }

    #[test]
    fn python_entry_runs_through_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let script = touch(dir.path(), "main.py");

        assert_eq!(
            resolve_launch_target(dir.path(), Platform::Linux),
            LaunchTarget::Script { interpreter: "python3".to_string(), path: script }
        );
    }

    #[test]
    fn finds_match_at_depth_two() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        let exe = touch(dir.path(), "build/linux/MyGame.x86_64");

        assert_eq!(
            resolve_launch_target(dir.path(), Platform::Linux),
            LaunchTarget::Executable(exe)
        );
    }

    #[test]
    fn finds_match_at_depth_three() {
        let dir = tempfile::tempdir().unwrap();
        let exe = touch(dir.path(), "a/b/c/Game.exe");
        assert_eq!(search_executable(dir.path(), Platform::Windows), Some(exe));
    }

    #[test]
    fn search_stops_below_depth_three() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/b/c/d/Game.exe");

        assert_eq!(search_executable(dir.path(), Platform::Windows), None);
        assert_eq!(
            resolve_launch_target(dir.path(), Platform::Windows),
            LaunchTarget::Directory(dir.path().to_path_buf())
        );
    }

    #[test]
    fn shallowest_match_wins_over_earlier_deeper_one() {
        let dir = tempfile::tempdir().unwrap();
        // "a" sorts before "z" so the deep match is seen first
        touch(dir.path(), "a/b/c/Deep.exe");
        let shallow = touch(dir.path(), "z/Shallow.exe");

        assert_eq!(search_executable(dir.path(), Platform::Windows), Some(shallow));
    }

    #[test]
    fn ties_go_to_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(dir.path(), "bin/Alpha.exe");
        touch(dir.path(), "bin/Beta.exe");

        assert_eq!(search_executable(dir.path(), Platform::Windows), Some(first));
    }

    #[test]
    fn hidden_directories_are_not_searched() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/HEAD");
        touch(dir.path(), ".git/hooks/pre-commit");
        touch(dir.path(), "LICENSE");

        assert_eq!(search_executable(dir.path(), Platform::Linux), None);
    }

    #[test]
    fn root_level_loose_match_is_used() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "docs/Guide");
        let exe = touch(dir.path(), "SpaceRocks");

        assert_eq!(search_executable(dir.path(), Platform::Linux), Some(exe));
    }
}
