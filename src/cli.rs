use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for spectrum files
    pub directory: Option<PathBuf>,

    /// Path to a JSON pipeline configuration (defaults are used otherwise)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Persisted index mirror (will over-write the config file)
    #[arg(short, long)]
    pub index_file: Option<PathBuf>,

    /// Index every supported spectrum format, not only the configured suffixes
    #[arg(short, long)]
    pub all_formats: bool,

    /// Rebuild the index even if the mirror exists
    #[arg(short, long)]
    pub force_reindex: bool,

    /// Only run these sample groups (repeatable)
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Only run these sample ids (repeatable, united with --group)
    #[arg(short, long = "sample")]
    pub samples: Vec<String>,

    /// Process samples on the rayon thread pool
    #[arg(short, long)]
    pub parallel: bool,
}
