use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Install applications shipped as plain archives",
    long_about = "Extracts a tarball, zip, 7z or rar archive, finds the application's \
                  executable and installs it either as a native package through the host \
                  package manager or into your home directory with a menu entry.",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit log lines as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable the progress spinner
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract, detect and install an archive
    #[command(arg_required_else_help = true)]
    Install {
        /// Archive to install
        archive: PathBuf,

        /// Install into your home directory instead of building a package
        #[arg(long, conflicts_with = "system")]
        user: bool,

        /// Build and install a native package (the default unless configured otherwise)
        #[arg(long)]
        system: bool,

        /// Image to use as the menu icon
        #[arg(long)]
        icon: Option<PathBuf>,

        /// Override the inferred application name
        #[arg(long)]
        name: Option<String>,

        /// Override the inferred version
        #[arg(long = "version", value_name = "VERSION")]
        app_version: Option<String>,
    },

    /// Show what would be installed without installing it
    #[command(arg_required_else_help = true)]
    Inspect {
        /// Archive to inspect
        archive: PathBuf,
    },

    /// Write a documented default config file
    #[clap(name = "defconfig")]
    DefConfig,

    /// Print the effective configuration
    Config,
}

impl Commands {
    /// `Some(true)` for `--system`, `Some(false)` for `--user`, otherwise defer
    /// to the config file.
    pub fn system_wide(user: bool, system: bool) -> Option<bool> {
        match (user, system) {
            (true, _) => Some(false),
            (_, true) => Some(true),
            _ => None,
        }
    }
}
