use crate::error::{Error, Result};
use std::future::Future;

/// Request headers sent along with every playlist, segment and key request.
pub type Headers = Vec<(String, String)>;

/// The minimal http interface needed for downloading a playlist.
///
/// [`ReqwestClient`] is used in production, tests script their own responses.
pub trait HttpClient: Send + Sync + 'static {
    /// Performs a GET request and returns the whole response body.
    ///
    /// A non-success status must be reported as [`Error::Status`] and a request
    /// which never got a response as [`Error::Transport`].
    fn get(&self, url: &str, headers: &[(String, String)])
    -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_builder(builder: reqwest::ClientBuilder) -> Result<Self> {
        Ok(Self::new(builder.build().map_err(Error::Client)?))
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|x| Error::transport(url, x))?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_owned(),
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|x| Error::transport(url, x))?;
        Ok(data.to_vec())
    }
}
