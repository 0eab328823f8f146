mod download;
mod segments;

pub use download::Download;
pub use segments::Segments;

use crate::http::Headers;
use anyhow::Result;
use clap::{ColorChoice, Parser, Subcommand};
use log::LevelFilter;
use reqwest::header::{HeaderName, HeaderValue};

/// Download HLS (.m3u8) media playlists into a single transport stream file.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Maximum level of log messages to print.
    /// Possible values: [off, error, warn, info, debug, trace].
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Download(Download),
    Segments(Segments),
}

impl Args {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Download(args) => args.execute().await,
            Commands::Segments(args) => args.execute().await,
        }
    }
}

/// Turns `--header KEY VALUE` pairs into request headers, rejecting invalid names and values.
fn parse_headers(header: &[String]) -> Result<Headers> {
    let mut headers = Vec::with_capacity(header.len() / 2);

    for pair in header.chunks_exact(2) {
        pair[0].parse::<HeaderName>()?;
        pair[1].parse::<HeaderValue>()?;
        headers.push((pair[0].clone(), pair[1].clone()));
    }

    Ok(headers)
}
