use crate::{http::ReqwestClient, playlist};
use anyhow::Result;
use clap::Args;
use kdam::term::Colorizer;

/// List the segments of a HLS media playlist without downloading them.
#[derive(Debug, Clone, Args)]
pub struct Segments {
    /// http(s):// url of a media playlist (.m3u8).
    #[arg(required = true)]
    pub url: String,

    /// Custom headers for requests.
    /// This option can be used multiple times.
    #[arg(long, num_args = 2, value_names = &["KEY", "VALUE"])]
    pub header: Vec<String>,

    /// Print segments in json format.
    #[arg(long)]
    pub json: bool,
}

impl Segments {
    pub async fn execute(self) -> Result<()> {
        let client = ReqwestClient::from_builder(reqwest::Client::builder())?;
        let headers = super::parse_headers(&self.header)?;
        let segments = playlist::parse_segments(&client, &self.url, &headers).await?;

        if self.json {
            serde_json::to_writer(std::io::stdout(), &segments)?;
            println!();
            return Ok(());
        }

        for segment in &segments {
            println!(
                "{} {}{:.2}s {}",
                format!("{:>6}", segment.seq_id).colorize("cyan"),
                if segment.key.is_some() {
                    "[AES-128] ".colorize("yellow")
                } else {
                    String::new()
                },
                segment.duration,
                segment.uri,
            );

            if let Some(title) = &segment.title {
                println!("       {}", title);
            }
        }

        Ok(())
    }
}
