//! Archive installs: download (or copy) a packaged game and unpack it

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::logging::{log_download, log_install, log_warning};

use super::Progress;

// ============================================================================
// Archive Formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
    SevenZ,
}

impl ArchiveKind {
    /// Guess from a file name or URL
    pub fn from_name(name: &str) -> Option<Self> {
        let name = strip_query(name).to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if name.ends_with(".7z") {
            Some(ArchiveKind::SevenZ)
        } else {
            None
        }
    }

    /// Detect from the file's leading bytes
    pub fn sniff(path: &Path) -> Option<Self> {
        let mut header = Vec::with_capacity(262);
        fs::File::open(path)
            .ok()?
            .take(262)
            .read_to_end(&mut header)
            .ok()?;

        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ArchiveKind::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveKind::TarGz)
        } else if header.starts_with(&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]) {
            Some(ArchiveKind::SevenZ)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Derive a game name from an archive URL (`.../Snake.zip` -> `Snake`)
pub fn archive_name_from_url(url: &str) -> Option<String> {
    let path = strip_query(url.trim()).trim_end_matches('/');
    let file = path.rsplit(['/', '\\']).next()?;
    let lower = file.to_lowercase();

    let stem_len = [".tar.gz", ".tgz", ".tar", ".zip", ".7z"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| file.len() - ext.len())
        .unwrap_or(file.len());

    let stem = &file[..stem_len];
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn is_remote(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ============================================================================
// Fetch
// ============================================================================

/// An archive ready to extract
pub struct FetchedArchive {
    pub path: PathBuf,
    /// Downloaded by us, delete after extraction
    pub temporary: bool,
}

/// Download `source` into `work_dir`, or use it in place when it is a local path
pub fn fetch_archive(
    source: &str,
    work_dir: &Path,
    file_stem: &str,
    progress: &Progress,
) -> Result<FetchedArchive, Box<dyn Error>> {
    if !is_remote(source) {
        let path = PathBuf::from(source.strip_prefix("file://").unwrap_or(source));
        if !path.is_file() {
            return Err(format!("archive not found: {}", path.display()).into());
        }
        return Ok(FetchedArchive { path, temporary: false });
    }

    fs::create_dir_all(work_dir)?;
    let path = work_dir.join(format!(".{}.download", file_stem));

    log_download(&format!("Downloading {}", source));
    let bytes = crate::utils::download_file(source, &path, |done, total| {
        progress.report("Downloading", done as f32 / total as f32);
    })
    .inspect_err(|_| {
        let _ = fs::remove_file(&path);
    })?;
    log_download(&format!("Downloaded {} bytes", bytes));

    Ok(FetchedArchive { path, temporary: true })
}

// ============================================================================
// Extract
// ============================================================================

/// Unpack `archive` into `dest` (created; must not exist yet).
///
/// A lone top-level folder inside the archive is flattened so the game
/// files end up directly in `dest`.
pub fn extract_archive(
    archive: &Path,
    hint: Option<ArchiveKind>,
    dest: &Path,
    progress: &Progress,
) -> Result<(), Box<dyn Error>> {
    let kind = ArchiveKind::sniff(archive)
        .or(hint)
        .ok_or("unsupported archive format")?;

    let staging = staging_dir(dest)?;
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    log_install(&format!("Extracting {:?} archive {}", kind, archive.display()));
    let result = unpack(kind, archive, &staging, progress)
        .and_then(|_| promote(&staging, dest));

    if staging.exists() {
        let _ = fs::remove_dir_all(&staging);
    }
    result
}

fn staging_dir(dest: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let parent = dest.parent().ok_or("destination has no parent directory")?;
    let name = dest
        .file_name()
        .ok_or("destination has no name")?
        .to_string_lossy();
    Ok(parent.join(format!(".{}.extracting", name)))
}

fn unpack(kind: ArchiveKind, archive: &Path, into: &Path, progress: &Progress) -> Result<(), Box<dyn Error>> {
    match kind {
        ArchiveKind::Zip => unpack_zip(archive, into, progress),
        ArchiveKind::TarGz => {
            let file = fs::File::open(archive)?;
            Archive::new(GzDecoder::new(file)).unpack(into)?;
            progress.report("Extracting", 1.0);
            Ok(())
        }
        ArchiveKind::Tar => {
            let file = fs::File::open(archive)?;
            Archive::new(file).unpack(into)?;
            progress.report("Extracting", 1.0);
            Ok(())
        }
        ArchiveKind::SevenZ => {
            sevenz_rust::decompress_file(archive, into).map_err(|e| e.to_string())?;
            progress.report("Extracting", 1.0);
            Ok(())
        }
    }
}

fn unpack_zip(archive: &Path, into: &Path, progress: &Progress) -> Result<(), Box<dyn Error>> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let total = zip.len().max(1);

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            log_warning(&format!("Skipping unsafe archive entry: {}", entry.name()));
            continue;
        };
        let out_path = into.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }

        progress.report("Extracting", (i + 1) as f32 / total as f32);
    }
    Ok(())
}

/// Move the staged files to `dest`, skipping a single wrapping folder
fn promote(staging: &Path, dest: &Path) -> Result<(), Box<dyn Error>> {
    let entries: Vec<PathBuf> = fs::read_dir(staging)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.file_name().is_some_and(|n| n != "__MACOSX"))
        .collect();

    let source = match entries.as_slice() {
        [only] if only.is_dir() => only.clone(),
        _ => staging.to_path_buf(),
    };

    fs::rename(&source, dest)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a zip at `path` holding `(name, contents)` entries
    pub(crate) fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in files {
            writer
                .start_file(*name, SimpleFileOptions::default().unix_permissions(0o755))
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn kinds_from_names() {
        assert_eq!(ArchiveKind::from_name("Snake.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("x.TAR.GZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("x.tgz?raw=true"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("x.7z"), Some(ArchiveKind::SevenZ));
        assert_eq!(ArchiveKind::from_name("x.rar"), None);
    }

    #[test]
    fn names_from_urls() {
        assert_eq!(
            archive_name_from_url("https://raw.githubusercontent.com/o/r/main/Snake.zip").as_deref(),
            Some("Snake")
        );
        assert_eq!(archive_name_from_url("/tmp/pong.tar.gz?x=1").as_deref(), Some("pong"));
        assert_eq!(archive_name_from_url("https://host/").as_deref(), Some("host"));
        assert_eq!(archive_name_from_url("").as_deref(), None);
    }

    #[test]
    fn zip_is_sniffed_and_wrapper_folder_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("download.bin");
        write_zip(&archive, &[("Snake/game.sh", "#!/bin/sh\n"), ("Snake/assets/a.txt", "a")]);

        let dest = dir.path().join("games").join("Snake");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        extract_archive(&archive, None, &dest, &Progress::none()).unwrap();

        assert!(dest.join("game.sh").is_file());
        assert!(dest.join("assets/a.txt").is_file());
        assert!(!dir.path().join("games/.Snake.extracting").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("game.sh")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn flat_zip_is_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pong.zip");
        write_zip(&archive, &[("main.py", "print(1)"), ("README.md", "hi")]);

        let dest = dir.path().join("Pong");
        extract_archive(&archive, None, &dest, &Progress::none()).unwrap();
        assert!(dest.join("main.py").is_file());
        assert!(dest.join("README.md").is_file());
    }

    #[test]
    fn tar_gz_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tetris.tar.gz");
        {
            let file = fs::File::create(&archive).unwrap();
            let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(gz);
            let data = b"#!/bin/sh\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, "game", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("Tetris");
        extract_archive(&archive, Some(ArchiveKind::TarGz), &dest, &Progress::none()).unwrap();
        assert!(dest.join("game").is_file());
    }

    #[test]
    fn garbage_is_rejected_and_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, "this is not an archive").unwrap();

        let dest = dir.path().join("Broken");
        assert!(extract_archive(&archive, ArchiveKind::from_name("broken.zip"), &dest, &Progress::none()).is_err());
        assert!(!dest.exists());
        assert!(!dir.path().join(".Broken.extracting").exists());
    }

    #[test]
    fn local_sources_are_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("snake.zip");
        write_zip(&archive, &[("game.sh", "")]);

        let fetched = fetch_archive(archive.to_str().unwrap(), dir.path(), "snake", &Progress::none()).unwrap();
        assert_eq!(fetched.path, archive);
        assert!(!fetched.temporary);

        assert!(fetch_archive("/no/such/file.zip", dir.path(), "x", &Progress::none()).is_err());
    }
}
