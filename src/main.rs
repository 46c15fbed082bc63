//! Earth Launcher CLI
//!
//! Every command prints its `CommandResponse` as JSON on stdout. Logs go to
//! stderr and the log file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use earth_launcher::config::AppConfig;
use earth_launcher::installers::Progress;
use earth_launcher::logging::{init_logger, log_info};
use earth_launcher::{CommandResponse, Launcher};

#[derive(Parser)]
#[command(name = "earth")]
#[command(about = "Install, launch and track desktop games", version)]
struct Args {
    /// Games directory (overrides the config file)
    #[arg(long, value_name = "DIR")]
    games_dir: Option<PathBuf>,

    /// Statistics file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    stats_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone a git repository as a new game
    InstallRepo {
        url: String,
        /// Folder name (derived from the URL when omitted)
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Download or copy an archive and extract it as a new game
    InstallArchive {
        /// URL or local path of a .zip, .tar.gz, .tar or .7z file
        source: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Copy a game folder (or the folder of an executable) into the library
    Add {
        path: PathBuf,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Pull the latest changes of a repository install
    Update { name: String },
    /// List installed games
    List,
    /// Disk usage of an installed game
    Size { name: String },
    /// Launch an installed game and wait for it to exit
    Launch {
        name: String,
        /// Return right after starting the game (its session stays open)
        #[arg(long)]
        detach: bool,
    },
    /// Delete an installed game (statistics are kept)
    Delete { name: String },
    /// Play statistics for one game, or all games
    Stats {
        name: Option<String>,
        /// List sessions open for longer than this many hours instead
        #[arg(long, value_name = "HOURS", conflicts_with = "name")]
        stale: Option<f64>,
    },
    /// Games available from the configured repository
    Catalog,
}

fn print<T: Serialize>(response: CommandResponse<T>) -> ExitCode {
    let success = response.success;
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize response: {}", e),
    }
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logger();
    log_info("Earth Launcher starting up...");

    let mut config = AppConfig::load();
    if args.games_dir.is_some() {
        config.games_dir = args.games_dir;
    }
    if args.stats_file.is_some() {
        config.stats_file = args.stats_file;
    }

    let launcher = Launcher::from_config(config).with_progress(Progress::new(|stage, fraction| {
        eprintln!("{}: {:.0}%", stage, fraction * 100.0);
    }));

    match args.command {
        Command::InstallRepo { url, name } => print(launcher.install_from_repository(&url, &name)),
        Command::InstallArchive { source, name } => print(launcher.install_from_archive(&source, &name)),
        Command::Add { path, name } => print(launcher.add_local(&path, &name)),
        Command::Update { name } => print(launcher.update_installed(&name)),
        Command::List => print(launcher.list_installed()),
        Command::Size { name } => print(launcher.size_of(&name)),
        Command::Launch { name, detach } => print(launcher.with_wait_for_exit(!detach).launch(&name)),
        Command::Delete { name } => print(launcher.delete(&name)),
        Command::Stats { stale: Some(hours), .. } => print(launcher.stale_sessions(hours)),
        Command::Stats { name: Some(name), .. } => print(launcher.get_statistics(&name)),
        Command::Stats { name: None, .. } => print(launcher.get_all_statistics()),
        Command::Catalog => print(launcher.fetch_catalog()),
    }
}
