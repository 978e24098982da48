use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "podsearch",
    version,
    about = "Search podcast transcripts and play matches from the terminal"
)]
pub struct Cli {
    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Search backend base URL, overriding configuration
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive search (default)
    Tui,
    /// Run one search and print the ranked results
    Search(SearchArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,

    #[arg(long, value_enum, default_value_t = FieldArg::General)]
    pub field: FieldArg,

    #[arg(long = "mode", value_enum, default_value_t = ModeArg::Intersection)]
    pub mode: ModeArg,

    /// Ranking algorithm; only sent with `--mode ranking`
    #[arg(long, value_enum)]
    pub ranking: Option<RankingArg>,

    /// Seconds of transcript context (30, 60, 90, 120, 180 or 300)
    #[arg(long, default_value_t = 30)]
    pub time: u32,

    /// Episode id to search around; repeatable
    #[arg(long = "select", value_name = "EPISODE_ID")]
    pub selected: Vec<String>,

    /// Print normalized results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    General,
    Show,
    Publisher,
    Episode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Intersection,
    Phrase,
    Ranking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankingArg {
    Tfidf,
    Pagerank,
    Mix,
    Bm25,
}
