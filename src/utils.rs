//! Shared utility functions used across the application

use std::path::Path;

use walkdir::WalkDir;

/// Check that a game name is usable as a single directory name.
///
/// Returns the reason on rejection.
pub fn validate_game_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name is empty".to_string());
    }
    if trimmed != name {
        return Err("name has leading or trailing whitespace".to_string());
    }
    if name.contains('/') || name.contains('\\') {
        return Err("name contains a path separator".to_string());
    }
    if name.starts_with('.') {
        return Err("name starts with '.'".to_string());
    }
    if name.chars().any(|c| c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|')) {
        return Err("name contains a reserved character".to_string());
    }
    Ok(())
}

/// Total size in bytes of all regular files below `path`
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Human readable size, e.g. `1.5 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Derive a game name from a repository URL (`.../Foo.git` -> `Foo`)
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Download a file from URL to the specified path, reporting `(downloaded, total)`
#[cfg(feature = "installer")]
pub fn download_file<F>(url: &str, path: &Path, progress: F) -> Result<u64, Box<dyn std::error::Error>>
where
    F: Fn(u64, u64),
{
    use std::fs;
    use std::io::{Read, Write};

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let response = ureq::get(url)
        .set("User-Agent", "Earth-Launcher")
        .call()?;

    let total_size = response
        .header("Content-Length")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let mut file = fs::File::create(path)?;
    let mut reader = response.into_reader();
    let mut buffer = [0; 65536];
    let mut downloaded: u64 = 0;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;

        if total_size > 0 {
            progress(downloaded, total_size);
        }
    }
    file.flush()?;

    Ok(downloaded)
}
