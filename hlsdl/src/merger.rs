use crate::{
    downloader::align_sync_byte,
    error::{Error, Result},
    http::HttpClient,
    playlist::Segment,
};
use hlsdl_decrypt::Aes128Decrypter;
use log::{info, trace};
use std::{collections::HashMap, path::Path};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};

/// Joins downloaded segments into one output file in sequence order.
pub struct Merger<'a, C> {
    client: &'a C,
    headers: &'a [(String, String)],
    keys: Option<HashMap<String, Vec<u8>>>,
}

impl<'a, C: HttpClient> Merger<'a, C> {
    pub fn new(client: &'a C, headers: &'a [(String, String)]) -> Self {
        Self {
            client,
            headers,
            keys: None,
        }
    }

    /// Reuse keys fetched earlier instead of requesting them again for every segment.
    pub fn cache_keys(mut self, cache_keys: bool) -> Self {
        self.keys = cache_keys.then(HashMap::new);
        self
    }

    /// Decrypts, aligns and appends every segment to `output`, deleting each
    /// scratch file as soon as it has been written.
    ///
    /// On failure the partially written output is left behind.
    pub async fn merge(&mut self, mut segments: Vec<Segment>, output: &Path) -> Result<()> {
        info!("Joining {} segments", segments.len());
        segments.sort_by_key(|x| x.seq_id);

        let mut file = File::create(output)
            .await
            .map_err(|x| Error::file(output, x))?;

        for segment in &segments {
            let data = fs::read(&segment.path)
                .await
                .map_err(|x| Error::file(&segment.path, x))?;
            let data = self.decrypt(segment, data).await?;

            file.write_all(align_sync_byte(&data))
                .await
                .map_err(|x| Error::file(output, x))?;
            fs::remove_file(&segment.path)
                .await
                .map_err(|x| Error::file(&segment.path, x))?;
            trace!("Deleted {}", segment.path.display());
        }

        file.flush().await.map_err(|x| Error::file(output, x))?;
        Ok(())
    }

    async fn decrypt(&mut self, segment: &Segment, data: Vec<u8>) -> Result<Vec<u8>> {
        let Some(key) = &segment.key else {
            return Ok(data);
        };

        let key_bytes = self.key(&key.uri).await?;
        let decrypter = Aes128Decrypter::from_slices(&key_bytes, &key.iv(segment.seq_id))?;
        Ok(decrypter.decrypt(data)?)
    }

    async fn key(&mut self, uri: &str) -> Result<Vec<u8>> {
        if let Some(key) = self.keys.as_ref().and_then(|x| x.get(uri)) {
            return Ok(key.clone());
        }

        let key = self
            .client
            .get(uri, self.headers)
            .await
            .map_err(|x| Error::Key {
                url: uri.to_owned(),
                source: Box::new(x),
            })?;

        if let Some(keys) = &mut self.keys {
            keys.insert(uri.to_owned(), key.clone());
        }

        Ok(key)
    }
}
