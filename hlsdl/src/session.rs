use crate::{
    downloader::SegmentDownloader,
    error::{Error, Result},
    http::{Headers, HttpClient, ReqwestClient},
    merger::Merger,
    playlist::{self, Segment},
};
use log::info;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Downloads a media playlist into a single file.
///
/// ```no_run
/// # async fn run() -> hlsdl::Result<()> {
/// let output = hlsdl::Session::new("https://example.com/index.m3u8", vec![], "download", 4)?
///     .filename("video.ts")
///     .download()
///     .await?;
/// println!("saved to {}", output.display());
/// # Ok(())
/// # }
/// ```
pub struct Session<C = ReqwestClient> {
    cache_keys: bool,
    cancel: CancellationToken,
    client: Arc<C>,
    directory: PathBuf,
    filename: String,
    headers: Arc<Headers>,
    progress: bool,
    url: String,
    workers: usize,
}

impl Session<ReqwestClient> {
    pub fn new(
        url: impl Into<String>,
        headers: Headers,
        directory: impl Into<PathBuf>,
        workers: usize,
    ) -> Result<Self> {
        Ok(Self::with_client(
            ReqwestClient::from_builder(reqwest::Client::builder())?,
            url,
            headers,
            directory,
            workers,
        ))
    }
}

impl<C: HttpClient> Session<C> {
    pub fn with_client(
        client: C,
        url: impl Into<String>,
        headers: Headers,
        directory: impl Into<PathBuf>,
        workers: usize,
    ) -> Self {
        Self {
            cache_keys: false,
            cancel: CancellationToken::new(),
            client: Arc::new(client),
            directory: directory.into(),
            filename: default_filename(),
            headers: Arc::new(headers),
            progress: false,
            url: url.into(),
            workers: workers.max(1),
        }
    }

    /// Name of the output file inside the download directory.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache_keys(mut self, cache_keys: bool) -> Self {
        self.cache_keys = cache_keys;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches and parses the playlist without downloading anything.
    pub async fn segments(&self) -> Result<Vec<Segment>> {
        playlist::parse_segments(&*self.client, &self.url, &self.headers).await
    }

    /// Runs the whole pipeline and returns the path of the joined file.
    ///
    /// The first error of any stage is returned as is.
    pub async fn download(&self) -> Result<PathBuf> {
        if playlist::is_scratch_name(&self.filename) {
            return Err(Error::Filename(self.filename.clone()));
        }

        let segments = self.segments().await?;
        info!("Found {} segments", segments.len());

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|x| Error::file(&self.directory, x))?;

        let downloaded =
            SegmentDownloader::new(self.client.clone(), self.headers.clone(), self.workers)
                .progress(self.progress)
                .cancellation(self.cancel.clone())
                .download(&self.directory, segments)
                .await?;

        let output = self.directory.join(&self.filename);
        Merger::new(&*self.client, &self.headers)
            .cache_keys(self.cache_keys)
            .merge(downloaded, &output)
            .await?;

        info!("Saved {}", output.display());
        Ok(output)
    }
}

fn default_filename() -> String {
    format!("video_{}.ts", chrono::Local::now().format("%Y%m%d%H%M%S"))
}
