use crate::{http::ReqwestClient, session::Session};
use anyhow::Result;
use clap::Args;
use log::warn;
use reqwest::{Client, Proxy};
use std::{path::PathBuf, process, time::Duration};
use tokio_util::sync::CancellationToken;

/// Download a HLS media playlist into a single .ts file.
#[derive(Debug, Clone, Args)]
pub struct Download {
    /// http(s):// url of a media playlist (.m3u8).
    #[arg(short, long, required = true)]
    pub url: String,

    /// Directory for temporarily downloaded segments and the joined output file.
    /// It is created when missing.
    #[arg(short = 'd', long = "dir", default_value = "./download")]
    pub directory: PathBuf,

    /// Name of the joined output file inside the download directory.
    /// By default video_<YYYYmmddHHMMSS>.ts is used.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Custom headers for requests.
    /// This option can be used multiple times.
    #[arg(long, help_heading = "Client Options", num_args = 2, value_names = &["KEY", "VALUE"])]
    pub header: Vec<String>, // Vec<(String, String)> not supported

    /// Skip checking and validation of site certificates.
    #[arg(long, help_heading = "Client Options")]
    pub no_certificate_checks: bool,

    /// Set http(s) / socks proxy address for requests.
    #[arg(long, help_heading = "Client Options", value_parser = proxy_address_parser)]
    pub proxy: Option<Proxy>,

    /// Timeout in seconds for every single request.
    /// By default requests never time out.
    #[arg(long, help_heading = "Client Options")]
    pub timeout: Option<u64>,

    /// Update and set user agent header for requests.
    #[arg(
        long,
        help_heading = "Client Options",
        default_value = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36"
    )]
    pub user_agent: String,

    /// Fetch every distinct decryption key only once.
    /// By default the key is requested again for each encrypted segment.
    #[arg(long, help_heading = "Decrypt Options")]
    pub cache_keys: bool,

    /// Hide the download progress bar.
    #[arg(long, help_heading = "Download Options")]
    pub no_progress: bool,

    /// Number of segments downloaded concurrently.
    /// Should be in range 1-64 (inclusive).
    #[arg(short, long, help_heading = "Download Options", default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: u8,
}

impl Download {
    fn client(&self) -> crate::Result<ReqwestClient> {
        let mut client_builder = Client::builder()
            .danger_accept_invalid_certs(self.no_certificate_checks)
            .user_agent(&self.user_agent);

        if let Some(proxy) = &self.proxy {
            client_builder = client_builder.proxy(proxy.clone());
        }

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(Duration::from_secs(timeout));
        }

        ReqwestClient::from_builder(client_builder)
    }

    pub async fn execute(self) -> Result<()> {
        let client = self.client()?;
        let headers = super::parse_headers(&self.header)?;
        let cancel = CancellationToken::new();

        ctrlc::set_handler({
            let cancel = cancel.clone();
            move || {
                if cancel.is_cancelled() {
                    process::exit(130);
                }

                warn!("Stopping after the running segments, press Ctrl+C again to exit now");
                cancel.cancel();
            }
        })?;

        let mut session = Session::with_client(
            client,
            self.url,
            headers,
            self.directory,
            self.workers as usize,
        )
        .cache_keys(self.cache_keys)
        .cancellation(cancel)
        .progress(!self.no_progress);

        if let Some(output) = self.output {
            session = session.filename(output);
        }

        session.download().await?;
        Ok(())
    }
}

fn proxy_address_parser(s: &str) -> Result<Proxy, String> {
    Proxy::all(s).map_err(|x| x.to_string())
}
