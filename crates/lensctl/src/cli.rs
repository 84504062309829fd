//! Clap derive structures for the `lensctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lensctl -- tethered camera control from the command line
#[derive(Debug, Parser)]
#[command(
    name = "lensctl",
    version,
    about = "Control a tethered camera from the command line",
    long_about = "Capture images, read and change camera settings, and manage the\n\
        files on the camera's card.\n\n\
        Each invocation opens a session on the camera selected by the active\n\
        profile and closes it again before exiting.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Camera profile to use
    #[arg(long, short = 'p', env = "LENSCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LENSCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LENSCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read and change camera settings
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Take pictures and collect camera events
    #[command(alias = "cap")]
    Capture(CaptureArgs),

    /// Browse and manage files on the camera
    #[command(alias = "f")]
    Files(FilesArgs),

    /// Manage lensctl profiles and configuration
    Profile(ProfileArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Config (camera settings) ─────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// List settings (use -o json to produce a file for `config apply`)
    #[command(alias = "ls")]
    List {
        /// Only settings in this section
        #[arg(long, short = 's')]
        section: Option<String>,

        /// Include read-only settings and buttons
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Show one setting with its allowed values
    Get {
        /// Setting name, e.g. "iso"
        name: String,
    },

    /// Change one or more settings
    Set {
        /// Assignments as name=value, e.g. iso=400 aperture=8
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,

        /// Keep going after a failing setting instead of rolling back
        #[arg(long)]
        best_effort: bool,
    },

    /// Apply settings from a JSON dump produced by `config list -o json`
    Apply {
        /// Path to the JSON file
        file: PathBuf,

        /// Keep going after a failing setting instead of rolling back
        #[arg(long)]
        best_effort: bool,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

// ── Capture ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CaptureArgs {
    #[command(subcommand)]
    pub command: CaptureCommand,
}

#[derive(Debug, Subcommand)]
pub enum CaptureCommand {
    /// Release the shutter and download the image
    ///
    /// The camera copy is deleted afterwards unless the profile sets
    /// delete_after_download = false.
    Still {
        /// Destination file or directory (defaults to the profile's download_dir)
        #[arg(long, short = 'O')]
        output_path: Option<PathBuf>,
    },

    /// Grab a live-view frame
    Preview {
        /// Destination file
        #[arg(long, short = 'O', default_value = "preview.jpg")]
        output_path: PathBuf,
    },

    /// Wait for the camera to report a new file and download it
    Wait {
        /// Give up after this long, e.g. 30s or 2m
        #[arg(long, short = 't', default_value = "30s", value_parser = humantime::parse_duration)]
        timeout: Duration,

        /// Destination file or directory (defaults to the profile's download_dir)
        #[arg(long, short = 'O')]
        output_path: Option<PathBuf>,
    },

    /// Discard pending camera events, deleting announced files
    Drain {
        /// Listening window (defaults to the profile's drain_window)
        #[arg(long, short = 'w', value_parser = humantime::parse_duration)]
        window: Option<Duration>,
    },
}

// ── Files ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub command: FilesCommand,
}

#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List folders and files in a camera folder
    Ls {
        /// Folder path on the camera
        #[arg(default_value = "/")]
        path: String,

        /// List every folder below PATH instead
        #[arg(long, short = 'r')]
        recursive: bool,
    },

    /// Show the folder tree with its files
    Tree {
        /// Folder path on the camera
        #[arg(default_value = "/")]
        path: String,
    },

    /// Download a file from the camera
    Get {
        /// Absolute file path on the camera
        path: String,

        /// Destination file or directory (defaults to the profile's download_dir)
        #[arg(long, short = 'O')]
        output_path: Option<PathBuf>,

        /// Delete the camera copy if the download fails
        #[arg(long)]
        remove_on_failure: bool,
    },

    /// Delete a file from the camera
    Rm {
        /// Absolute file path on the camera
        path: String,
    },
}

// ── Profile ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Write a config file with a single simulated profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Device fixture (TOML) for the simulated camera
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Default download directory
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    List,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
