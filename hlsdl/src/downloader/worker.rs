use super::{MAX_ATTEMPTS, RETRY_DELAY};
use crate::{
    error::{Error, Result},
    http::{Headers, HttpClient},
    playlist::Segment,
};
use log::{debug, warn};
use std::{path::PathBuf, sync::Arc};
use tokio::{fs, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// Result of downloading one segment, sent exactly once per segment a worker picks up.
pub(super) struct Outcome {
    pub(super) seq_id: u64,
    pub(super) result: Result<Segment>,
}

/// Hands segments over to the workers in playlist order, assigning scratch paths on the way.
pub(super) async fn produce(
    segments: Vec<Segment>,
    directory: PathBuf,
    feed: async_channel::Sender<Segment>,
    cancel: CancellationToken,
) {
    for mut segment in segments {
        segment.path = segment.scratch_path(&directory);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = feed.send(segment) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

pub(super) struct Worker<C> {
    pub(super) cancel: CancellationToken,
    pub(super) client: Arc<C>,
    pub(super) feed: async_channel::Receiver<Segment>,
    pub(super) headers: Arc<Headers>,
    pub(super) results: mpsc::Sender<Outcome>,
}

impl<C: HttpClient> Worker<C> {
    pub(super) async fn run(self) {
        loop {
            let segment = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                segment = self.feed.recv() => match segment {
                    Ok(segment) => segment,
                    Err(_) => return,
                },
            };

            let seq_id = segment.seq_id;
            let result = match self.download(&segment).await {
                Some(Ok(())) => Ok(segment),
                Some(Err(e)) => Err(e),
                None => return,
            };
            let failed = result.is_err();

            if self.results.send(Outcome { seq_id, result }).await.is_err() || failed {
                return;
            }
        }
    }

    /// Returns `None` when the pipeline gets cancelled before an attempt.
    async fn download(&self, segment: &Segment) -> Option<Result<()>> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                return None;
            }

            match self.fetch(segment).await {
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        "Retrying segment {} ({}/{}) after: {}",
                        segment.seq_id,
                        attempt + 1,
                        MAX_ATTEMPTS,
                        e
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return None,
                        _ = tokio::time::sleep(RETRY_DELAY) => (),
                    }
                }
                result => return Some(result),
            }
        }
    }

    async fn fetch(&self, segment: &Segment) -> Result<()> {
        let data = self.client.get(&segment.uri, &self.headers).await?;
        fs::write(&segment.path, &data)
            .await
            .map_err(|x| Error::file(&segment.path, x))?;
        debug!("Downloaded segment {} ({} bytes)", segment.seq_id, data.len());
        Ok(())
    }
}
