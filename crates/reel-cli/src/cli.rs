use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "Track what you watch and keep it in sync across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for relay and metadata configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the local collection and sync settings
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile the local collection with the relay once
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Relay implementation to sync through
        #[arg(long, value_enum, default_value_t = RelayKind::Supabase)]
        relay: RelayKind,
    },
    /// Keep a sync session running and print what happens
    Watch {
        /// Relay implementation to sync through
        #[arg(long, value_enum, default_value_t = RelayKind::Supabase)]
        relay: RelayKind,
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "SECONDS")]
        seconds: Option<u64>,
    },
    /// Track a movie or series
    #[command(alias = "track")]
    Add {
        /// External metadata id
        id: u64,
        /// The id refers to a series
        #[arg(long)]
        tv: bool,
        /// Display title
        #[arg(long)]
        title: Option<String>,
        /// Mark as watched instead of queueing it
        #[arg(long)]
        watched: bool,
        /// Mark as favourite
        #[arg(long)]
        favourite: bool,
        /// Personal rating from 1 to 10
        #[arg(long)]
        rating: Option<u8>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Merge a backup file into the local collection
    Import {
        /// Backup file to read
        path: PathBuf,
    },
    /// Write a backup of the local collection
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List popular titles from the metadata source
    Popular {
        /// List series instead of movies
        #[arg(long)]
        tv: bool,
        /// Two-letter region code (defaults to the collection's region)
        #[arg(long)]
        region: Option<String>,
    },
    /// Show where a title can be watched
    Providers {
        /// External metadata id
        id: u64,
        /// The id refers to a series
        #[arg(long)]
        tv: bool,
        /// Two-letter region code (defaults to the collection's region)
        #[arg(long)]
        region: Option<String>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RelayKind {
    /// In-process relay, useful to try the engine without a backend
    Memory,
    /// Supabase `PostgREST` table
    Supabase,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Turn sync on for this device
    Enable,
    /// Turn sync off for this device
    Disable,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Relay table name
        #[arg(long, value_name = "TABLE")]
        relay_table: Option<String>,
        /// Metadata API base URL
        #[arg(long, value_name = "URL")]
        metadata_base_url: Option<String>,
        /// Metadata API key
        #[arg(long, value_name = "KEY")]
        metadata_api_key: Option<String>,
        /// Account id the relay row belongs to
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration
    Show {
        /// Profile name to show
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
