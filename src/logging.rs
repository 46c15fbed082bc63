//! Earth Launcher logging
//!
//! Leveled log lines to the console and a per-run log file, with a
//! system information header at the top of every file.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex, OnceLock};

static LOGGER: OnceLock<Arc<Mutex<EarthLogger>>> = OnceLock::new();

// ============================================================================
// System Information Detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub app_version: String,
    pub os: String,
    pub distro: String,
    pub kernel: String,
    pub session_type: String,
    pub desktop_env: String,
    pub data_dir: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os: format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH),
            distro: detect_distro(),
            kernel: detect_kernel(),
            session_type: detect_session_type(),
            desktop_env: detect_desktop_env(),
            data_dir: earth_path!().display().to_string(),
        }
    }

    pub fn to_log_header(&self) -> String {
        format!(
r#"================================================================================
Earth Launcher Log - {}
================================================================================
Application:   Earth Launcher v{}
System Info:
  OS:          {}
  Distro:      {}
  Kernel:      {}
  Session:     {}
  Desktop:     {}
  Data Dir:    {}
================================================================================
"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.os,
            self.distro,
            self.kernel,
            self.session_type,
            self.desktop_env,
            self.data_dir
        )
    }
}

fn detect_session_type() -> String {
    std::env::var("XDG_SESSION_TYPE").unwrap_or_else(|_| "Unknown".to_string())
}

fn detect_distro() -> String {
    if let Ok(file) = File::open("/etc/os-release") {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if line.starts_with("PRETTY_NAME=") {
                return line
                    .trim_start_matches("PRETTY_NAME=")
                    .trim_matches('"')
                    .to_string();
            }
        }
    }
    "Unknown".to_string()
}

fn detect_kernel() -> String {
    if cfg!(windows) {
        return "n/a".to_string();
    }
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

fn detect_desktop_env() -> String {
    for var in ["XDG_CURRENT_DESKTOP", "DESKTOP_SESSION", "XDG_SESSION_DESKTOP"] {
        if let Ok(de) = std::env::var(var) {
            return de;
        }
    }
    "Unknown".to_string()
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Action, // Requests coming from the UI / CLI
    Download,
    Install,
    Launch,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Action => "[ACTION]",
            LogLevel::Download => "[DOWNLOAD]",
            LogLevel::Install => "[INSTALL]",
            LogLevel::Launch => "[LAUNCH]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// Earth Logger
// ============================================================================

pub struct EarthLogger {
    log_file: Option<File>,
}

impl EarthLogger {
    pub fn new() -> Self {
        // Unit tests only log to the console
        let log_file = if cfg!(test) { None } else { Self::open_log_file() };

        let mut logger = Self { log_file };

        if logger.log_file.is_some() {
            let header = SystemInfo::detect().to_log_header();
            logger.write_raw(&header);
        }

        logger
    }

    fn open_log_file() -> Option<File> {
        let log_dir: PathBuf = earth_path!("logs");
        fs::create_dir_all(&log_dir).ok()?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("earth_{}.log", timestamp));

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }

        // stdout belongs to the CLI's JSON output
        eprintln!("{}", msg);
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        self.write_raw(&formatted);
    }
}

impl Default for EarthLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global logger (call once at startup)
pub fn init_logger() {
    LOGGER.get_or_init(|| Arc::new(Mutex::new(EarthLogger::new())));
}

fn logger() -> Arc<Mutex<EarthLogger>> {
    LOGGER
        .get_or_init(|| Arc::new(Mutex::new(EarthLogger::new())))
        .clone()
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log(level: LogLevel, message: &str) {
    if let Ok(mut log) = logger().lock() {
        log.log(level, message);
    }
}

pub fn log_info(message: &str) {
    log(LogLevel::Info, message);
}

pub fn log_action(message: &str) {
    log(LogLevel::Action, message);
}

pub fn log_download(message: &str) {
    log(LogLevel::Download, message);
}

pub fn log_install(message: &str) {
    log(LogLevel::Install, message);
}

pub fn log_launch(message: &str) {
    log(LogLevel::Launch, message);
}

pub fn log_warning(message: &str) {
    log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    log(LogLevel::Error, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_bracketed() {
        for level in [
            LogLevel::Info,
            LogLevel::Action,
            LogLevel::Download,
            LogLevel::Install,
            LogLevel::Launch,
            LogLevel::Warning,
            LogLevel::Error,
        ] {
            let prefix = level.prefix();
            assert!(prefix.starts_with('[') && prefix.ends_with(']'), "{}", prefix);
        }
    }

    #[test]
    fn header_mentions_version() {
        let header = SystemInfo::detect().to_log_header();
        println!("{}", header);
        assert!(header.contains(env!("CARGO_PKG_VERSION")));
    }
}
