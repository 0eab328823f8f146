mod fix;
mod worker;

pub use fix::{SYNC_BYTE, align_sync_byte};

use crate::{
    error::{Error, Result},
    http::{Headers, HttpClient},
    playlist::Segment,
};
use kdam::{BarExt, tqdm};
use log::{debug, info};
use std::{path::Path, sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use worker::{Outcome, Worker};

/// Attempts made for a segment whose connection keeps getting reset.
pub const MAX_ATTEMPTS: usize = 3;
/// Fixed delay before each retry.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Downloads segments to scratch files using a fixed number of concurrent workers.
///
/// The first terminal error cancels the remaining work and is returned as is.
pub struct SegmentDownloader<C> {
    cancel: CancellationToken,
    client: Arc<C>,
    headers: Arc<Headers>,
    progress: bool,
    workers: usize,
}

impl<C: HttpClient> SegmentDownloader<C> {
    pub fn new(client: Arc<C>, headers: Arc<Headers>, workers: usize) -> Self {
        Self {
            cancel: CancellationToken::new(),
            client,
            headers,
            progress: false,
            workers: workers.max(1),
        }
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Stops the download early once `cancel` fires.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches every segment into `directory` and returns them in completion order,
    /// each with its scratch path set.
    pub async fn download(&self, directory: &Path, segments: Vec<Segment>) -> Result<Vec<Segment>> {
        let total = segments.len();
        let cancel = self.cancel.child_token();
        let (feed_tx, feed_rx) = async_channel::bounded(1);
        let (results_tx, mut results_rx) = mpsc::channel(self.workers);
        let mut set = JoinSet::new();

        set.spawn(worker::produce(
            segments,
            directory.to_owned(),
            feed_tx,
            cancel.clone(),
        ));

        for _ in 0..self.workers {
            set.spawn(
                Worker {
                    cancel: cancel.clone(),
                    client: self.client.clone(),
                    feed: feed_rx.clone(),
                    headers: self.headers.clone(),
                    results: results_tx.clone(),
                }
                .run(),
            );
        }

        // The result channel closes once every worker has exited.
        drop(feed_rx);
        drop(results_tx);

        let mut pb = self.progress.then(|| {
            tqdm!(
                total = total,
                desc = "Downloading".to_owned(),
                unit = " SEG".to_owned(),
                dynamic_ncols = true
            )
        });
        let mut downloaded = Vec::with_capacity(total);

        while let Some(Outcome { seq_id, result }) = results_rx.recv().await {
            match result {
                Ok(segment) => {
                    downloaded.push(segment);

                    if let Some(pb) = &mut pb {
                        if let Err(e) = pb.update(1) {
                            debug!("Couldn't redraw progress bar: {}", e);
                        }
                    }
                }
                Err(e) => {
                    debug!("Segment {} failed, cancelling remaining downloads", seq_id);
                    cancel.cancel();
                    // In-flight fetches finish on their own, nothing new gets picked up.
                    set.detach_all();

                    if pb.is_some() {
                        eprintln!();
                    }

                    return Err(e);
                }
            }
        }

        while let Some(joined) = set.join_next().await {
            joined?;
        }

        if pb.is_some() {
            eprintln!();
        }

        if downloaded.len() != total {
            return Err(Error::Cancelled);
        }

        info!("Downloaded {} segments", total);
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{FakeClient, Reply};
    use std::fs;

    fn url(seq_id: u64) -> String {
        format!("https://cdn.example.com/seg{}.ts", seq_id)
    }

    fn segments(count: u64) -> Vec<Segment> {
        (0..count)
            .map(|seq_id| Segment {
                seq_id,
                uri: url(seq_id),
                ..Default::default()
            })
            .collect()
    }

    fn downloader(client: &FakeClient, workers: usize) -> SegmentDownloader<FakeClient> {
        SegmentDownloader::new(
            Arc::new(client.clone()),
            Arc::new(vec![("Referer".to_owned(), "https://example.com".to_owned())]),
            workers,
        )
    }

    #[tokio::test]
    async fn test_downloads_all_segments() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();

        for seq_id in 0..20 {
            client.reply(
                &url(seq_id),
                Reply::Delayed(
                    vec![0x47, seq_id as u8],
                    Duration::from_millis((seq_id * 7) % 5),
                ),
            );
        }

        let mut downloaded = downloader(&client, 3)
            .download(dir.path(), segments(20))
            .await
            .unwrap();
        downloaded.sort_by_key(|x| x.seq_id);

        assert_eq!(downloaded.len(), 20);

        for segment in downloaded {
            assert_eq!(
                segment.path,
                dir.path().join(format!("seg{}.ts", segment.seq_id))
            );
            assert_eq!(
                fs::read(&segment.path).unwrap(),
                vec![0x47, segment.seq_id as u8]
            );
            assert_eq!(client.hits(&segment.uri), 1);
        }

        assert_eq!(
            client.headers(&url(0)).unwrap(),
            vec![("Referer".to_owned(), "https://example.com".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_downloads_with_progress_bar() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();

        for seq_id in 0..3 {
            client.reply(&url(seq_id), Reply::Body(vec![0x47]));
        }

        let downloaded = downloader(&client, 2)
            .progress(true)
            .download(dir.path(), segments(3))
            .await
            .unwrap();

        assert_eq!(downloaded.len(), 3);
    }

    #[tokio::test]
    async fn test_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        let downloaded = downloader(&client, 2)
            .download(dir.path(), vec![])
            .await
            .unwrap();

        assert!(downloaded.is_empty());
        assert_eq!(client.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_still_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.reply(&url(0), Reply::Body(vec![0x47]));

        let downloaded = downloader(&client, 0)
            .download(dir.path(), segments(1))
            .await
            .unwrap();

        assert_eq!(downloaded.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reset_is_attempted_three_times() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.reply(&url(0), Reply::Reset);

        let error = downloader(&client, 1)
            .download(dir.path(), segments(1))
            .await
            .unwrap_err();

        assert!(error.is_retryable());
        assert_eq!(client.hits(&url(0)), MAX_ATTEMPTS);
        assert!(!dir.path().join("seg0.ts").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reset_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.reply(&url(0), Reply::ResetTimes(2, vec![0x47]));

        let downloaded = downloader(&client, 1)
            .download(dir.path(), segments(1))
            .await
            .unwrap();

        assert_eq!(downloaded.len(), 1);
        assert_eq!(client.hits(&url(0)), 3);
    }

    #[tokio::test]
    async fn test_status_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.reply(&url(0), Reply::Status(404));

        let error = downloader(&client, 1)
            .download(dir.path(), segments(1))
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(404));
        assert_eq!(client.hits(&url(0)), 1);
    }

    #[tokio::test]
    async fn test_first_error_cancels_remaining_work() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        let workers = 4;
        client.reply(&url(0), Reply::Status(500));

        for seq_id in 1..40 {
            client.reply(
                &url(seq_id),
                Reply::Delayed(vec![0x47], Duration::from_millis(50)),
            );
        }

        let error = downloader(&client, workers)
            .download(dir.path(), segments(40))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(500));

        // Let the fetches which were already running finish.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(client.total_hits() <= 1 + workers);
        assert!(fs::read_dir(dir.path()).unwrap().count() <= workers);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.reply(&url(0), Reply::Body(vec![0x47]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = downloader(&client, 2)
            .cancellation(cancel)
            .download(dir.path(), segments(1))
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(client.total_hits(), 0);
    }
}
