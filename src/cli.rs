//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "blogdown", version, about = "Markdown-to-component compiler for blog content")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "blogdown.toml")]
    pub config: PathBuf,

    /// Posts directory (overrides config)
    #[arg(long, global = true)]
    pub posts: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(short, long, global = true)]
    pub out: Option<PathBuf>,

    /// Disable the render cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// When to use colored output
    #[arg(long, global = true, value_enum, default_value_t = clap::ColorChoice::Auto)]
    pub color: clap::ColorChoice,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transform all posts once and exit
    Build,
    /// Build, then watch for changes and rebuild incrementally
    Watch,
}
