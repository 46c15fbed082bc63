//! Play statistics store
//!
//! Keeps one record per game in a single JSON document. Every operation
//! re-reads the document, mutates it in memory and rewrites it wholesale.
//! Storage problems are logged and never surfaced: a document that cannot be
//! read counts as "no prior data", a failed write still returns the intended
//! new state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logging::{log_error, log_info, log_warning};

// ============================================================================
// Types
// ============================================================================

/// One open-to-close play interval
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "duration", alias = "durationSeconds", default)]
    pub duration_seconds: i64,
}

impl GameSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Aggregated play history of one game
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatistics {
    pub game_name: String,
    #[serde(default)]
    pub launch_count: u64,
    #[serde(default)]
    pub total_hours_played: f64,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sessions: Vec<GameSession>,
}

impl GameStatistics {
    pub fn new(game_name: &str) -> Self {
        Self {
            game_name: game_name.to_string(),
            launch_count: 0,
            total_hours_played: 0.0,
            last_played: None,
            sessions: Vec::new(),
        }
    }

    fn recompute_total_hours(&mut self) {
        let seconds: i64 = self.sessions.iter().map(|s| s.duration_seconds).sum();
        self.total_hours_played = round_hours(seconds);
    }
}

/// A session left open longer than expected
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaleSession {
    pub game_name: String,
    pub session: GameSession,
}

/// Seconds to hours, rounded to 2 decimals
fn round_hours(seconds: i64) -> f64 {
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}

// ============================================================================
// Statistics Store
// ============================================================================

/// Owner of the statistics document.
///
/// Clones share one write lock, so exit watchers on background threads
/// cannot interleave their read-modify-write cycles with the caller's.
#[derive(Clone)]
pub struct StatisticsStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl StatisticsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record for `game_name`, created (and persisted) zeroed if missing
    pub fn get_statistics(&self, game_name: &str) -> GameStatistics {
        let _guard = self.write_lock.lock();
        let mut all = self.read_all();

        if let Some(existing) = all.iter().find(|s| s.game_name == game_name) {
            return existing.clone();
        }

        let created = GameStatistics::new(game_name);
        all.push(created.clone());
        self.write_all(&all);
        created
    }

    /// Start a new session for `game_name` now
    pub fn open_session(&self, game_name: &str) -> GameSession {
        self.open_session_at(game_name, Utc::now())
    }

    pub fn open_session_at(&self, game_name: &str, now: DateTime<Utc>) -> GameSession {
        let _guard = self.write_lock.lock();
        let mut all = self.read_all();
        let stats = entry(&mut all, game_name);

        if stats.sessions.last().is_some_and(GameSession::is_open) {
            log_warning(&format!(
                "{} already has an open session; starting another one",
                game_name
            ));
        }

        let session = GameSession {
            start_time: now,
            end_time: None,
            duration_seconds: 0,
        };
        stats.launch_count += 1;
        stats.last_played = Some(now);
        stats.sessions.push(session.clone());

        log_info(&format!(
            "Session opened for {} (launch #{})",
            game_name, stats.launch_count
        ));
        self.write_all(&all);
        session
    }

    /// Close the most recent session of `game_name` now.
    ///
    /// Does nothing when that session is already closed, or when the game
    /// has never been launched.
    pub fn close_session(&self, game_name: &str) {
        self.close_session_at(game_name, Utc::now());
    }

    pub fn close_session_at(&self, game_name: &str, now: DateTime<Utc>) {
        let _guard = self.write_lock.lock();
        let mut all = self.read_all();

        let Some(stats) = all.iter_mut().find(|s| s.game_name == game_name) else {
            return;
        };
        let Some(last) = stats.sessions.last_mut() else {
            return;
        };
        if !last.is_open() {
            return;
        }

        last.duration_seconds = (now - last.start_time).num_seconds().max(0);
        last.end_time = Some(now);
        let duration = last.duration_seconds;
        stats.recompute_total_hours();

        log_info(&format!(
            "Session closed for {} after {}s ({} h total)",
            game_name, duration, stats.total_hours_played
        ));
        self.write_all(&all);
    }

    /// Every record, in stored order
    pub fn list_all(&self) -> Vec<GameStatistics> {
        let _guard = self.write_lock.lock();
        self.read_all()
    }

    /// Games whose latest session has stayed open for longer than `max_age`.
    ///
    /// Read-only: stale sessions are reported, not closed.
    pub fn open_sessions_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<StaleSession> {
        self.list_all()
            .into_iter()
            .filter_map(|stats| {
                let last = stats.sessions.last()?;
                if last.is_open() && now - last.start_time > max_age {
                    Some(StaleSession {
                        game_name: stats.game_name.clone(),
                        session: last.clone(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn read_all(&self) -> Vec<GameStatistics> {
        if !self.path.exists() {
            return Vec::new();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                log_warning(&format!(
                    "Failed to read statistics {}: {}",
                    self.path.display(),
                    e
                ));
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str(&content) {
            Ok(all) => all,
            Err(e) => {
                log_warning(&format!(
                    "Statistics file {} is unreadable, starting fresh: {}",
                    self.path.display(),
                    e
                ));
                Vec::new()
            }
        }
    }

    fn write_all(&self, all: &[GameStatistics]) {
        if let Err(e) = self.try_write_all(all) {
            log_error(&format!(
                "Failed to save statistics to {}: {}",
                self.path.display(),
                e
            ));
        }
    }

    fn try_write_all(&self, all: &[GameStatistics]) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(all)?;

        // Replace the document in one rename so a crash never leaves it half written
        let tmp = self.temp_path();
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "stats.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

fn entry<'a>(all: &'a mut Vec<GameStatistics>, game_name: &str) -> &'a mut GameStatistics {
    match all.iter().position(|s| s.game_name == game_name) {
        Some(index) => &mut all[index],
        None => {
            all.push(GameStatistics::new(game_name));
            let last = all.len() - 1;
            &mut all[last]
        }
    }
}
