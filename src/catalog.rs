//! Installable game catalog
//!
//! Games are published as archives in the root of a GitHub repository.
//! When GitHub cannot be reached, archives lying in the local games
//! directory are offered instead.

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::installers::{archive_name_from_url, ArchiveKind};
use crate::logging::{log_info, log_warning};

/// GitHub contents API entry
#[derive(Deserialize, Debug, Clone)]
pub struct GithubContent {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub download_url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub download_url: String,
    pub size: u64,
    pub installed: bool,
}

/// Fetch the repository listing from GitHub
pub fn fetch_remote(owner: &str, repo: &str, token: Option<&str>) -> Result<Vec<GithubContent>, Box<dyn Error>> {
    let url = format!("https://api.github.com/repos/{}/{}/contents/", owner, repo);

    let mut request = ureq::get(&url)
        .set("User-Agent", "Earth-Launcher")
        .set("Accept", "application/vnd.github+json");
    if let Some(token) = token {
        request = request.set("Authorization", &format!("token {}", token));
    }

    let contents: Vec<GithubContent> = request.call()?.into_json()?;
    Ok(contents)
}

/// Keep the archive files of a repository listing
pub fn entries_from_contents(contents: &[GithubContent], games_dir: &Path) -> Vec<CatalogEntry> {
    contents
        .iter()
        .filter(|c| c.content_type == "file" && ArchiveKind::from_name(&c.name).is_some())
        .filter_map(|c| {
            let download_url = c.download_url.clone()?;
            let name = archive_name_from_url(&c.name)?;
            Some(CatalogEntry {
                installed: games_dir.join(&name).is_dir(),
                name,
                download_url,
                size: c.size,
            })
        })
        .collect()
}

/// Archives sitting in the games directory
pub fn local_entries(games_dir: &Path) -> Vec<CatalogEntry> {
    let Ok(entries) = fs::read_dir(games_dir) else {
        return Vec::new();
    };

    let mut found: Vec<CatalogEntry> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|path| {
            let file_name = path.file_name()?.to_string_lossy().to_string();
            if file_name.starts_with('.') {
                return None;
            }
            ArchiveKind::from_name(&file_name)?;
            let name = archive_name_from_url(&file_name)?;
            Some(CatalogEntry {
                installed: games_dir.join(&name).is_dir(),
                name,
                download_url: path.to_string_lossy().to_string(),
                size: path.metadata().map(|m| m.len()).unwrap_or(0),
            })
        })
        .collect();

    found.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    found
}

/// Remote catalog, or the local one if GitHub fails
pub fn load_catalog(owner: &str, repo: &str, token: Option<&str>, games_dir: &Path) -> Vec<CatalogEntry> {
    log_info(&format!("Loading games from {}/{}...", owner, repo));
    match fetch_remote(owner, repo, token) {
        Ok(contents) => {
            let entries = entries_from_contents(&contents, games_dir);
            log_info(&format!("Found {} games in repository", entries.len()));
            entries
        }
        Err(e) => {
            log_warning(&format!(
                "Error loading games from GitHub: {}. Falling back to local archives",
                e
            ));
            local_entries(games_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"[
        {"name": "README.md", "type": "file", "download_url": "https://raw/README.md", "size": 10},
        {"name": "Snake.zip", "type": "file", "download_url": "https://raw/Snake.zip", "size": 2048},
        {"name": "Pong.tar.gz", "type": "file", "download_url": "https://raw/Pong.tar.gz", "size": 512},
        {"name": "old", "type": "dir", "download_url": null, "size": 0}
    ]"#;

    #[test]
    fn only_archives_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Pong")).unwrap();

        let contents: Vec<GithubContent> = serde_json::from_str(LISTING).unwrap();
        let entries = entries_from_contents(&contents, dir.path());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Snake");
        assert_eq!(entries[0].download_url, "https://raw/Snake.zip");
        assert!(!entries[0].installed);
        assert_eq!(entries[1].name, "Pong");
        assert!(entries[1].installed);
    }

    #[test]
    fn local_archives_are_offered_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tetris.zip"), "x").unwrap();
        fs::write(dir.path().join("Asteroids.7z"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join(".Snake.download"), "x").unwrap();

        let entries = local_entries(dir.path());
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Asteroids", "tetris"]);
        assert_eq!(entries[1].size, 1);
    }

    #[test]
    fn missing_games_dir_gives_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        assert!(local_entries(&dir.path().join("nope")).is_empty());
    }
}
