//! Earth Launcher - desktop game library
//!
//! Library crate shared by the CLI and any front end: installing games from
//! git repositories or archives, launching them and tracking play time.

#[macro_use]
pub mod paths;

#[cfg(feature = "installer")]
pub mod catalog;
pub mod config;
pub mod error;
pub mod installers;
pub mod launch;
pub mod library;
pub mod logging;
pub mod stats;
pub mod utils;

pub use error::LauncherError;
pub use library::{CommandResponse, GameSize, InstallSource, InstalledGame, Launcher};
