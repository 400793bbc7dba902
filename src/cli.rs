use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::extract::SourcePreference;

#[derive(Parser, Debug)]
#[command(
    name = "schemadoc",
    version,
    about = "Extract relational schema definitions from paginated data-dictionary documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Toc(TocArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Text dump with `--- Page N ---` delimiters.
    #[arg(long)]
    pub text_path: PathBuf,

    /// DOM rendering as JSON.
    #[arg(long)]
    pub dom_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SourcePreference::Dom)]
    pub prefer: SourcePreference,

    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub page_offset: i64,

    #[arg(long, default_value_t = 2)]
    pub search_radius: usize,

    #[arg(long, default_value_t = 5)]
    pub max_pages_per_table: usize,

    #[arg(long, default_value_t = 20)]
    pub toc_scan_pages: usize,

    #[arg(long, default_value_t = 10)]
    pub toc_max_pages: usize,

    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    #[arg(long = "document-title")]
    pub document_titles: Vec<String>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub drift_top: usize,
}

#[derive(Args, Debug, Clone)]
pub struct TocArgs {
    #[arg(long)]
    pub text_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = 20)]
    pub toc_scan_pages: usize,

    #[arg(long, default_value_t = 10)]
    pub toc_max_pages: usize,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub db_path: PathBuf,
}
