//! Download HLS media playlists into a single MPEG-TS file.
//!
//! Segments are fetched concurrently by a fixed pool of workers, then
//! decrypted (AES-128) when the playlist says so, aligned on the transport
//! stream sync byte and appended in sequence order.
//!
//! ```no_run
//! # async fn run() -> hlsdl::Result<()> {
//! let output = hlsdl::download(
//!     "https://example.com/index.m3u8",
//!     vec![("Referer".to_owned(), "https://example.com".to_owned())],
//!     "download",
//!     4,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

mod commands;
pub mod downloader;
mod error;
pub mod http;
pub mod logger;
pub mod merger;
pub mod playlist;
mod session;

#[doc(hidden)]
pub use commands::Args;
pub use error::{Error, Result, TRANSPORT_FAILURE_STATUS, TransportKind};
pub use http::{Headers, HttpClient, ReqwestClient};
pub use playlist::{Key, Segment};
pub use reqwest;
pub use session::Session;
pub use tokio_util::sync::CancellationToken;

use std::path::PathBuf;

/// Downloads the media playlist at `url` into `directory` with `workers`
/// concurrent segment fetches, returning the path of the joined file.
pub async fn download(
    url: &str,
    headers: Headers,
    directory: impl Into<PathBuf>,
    workers: usize,
) -> Result<PathBuf> {
    Session::new(url, headers, directory, workers)?
        .download()
        .await
}
