use std::{error::Error as StdError, fmt, io, path::PathBuf};
use thiserror::Error;

/// Status reported for requests which never got a response.
/// It lies outside the range of status codes a server can send back.
pub const TRANSPORT_FAILURE_STATUS: u16 = 538;

/// A `Result` alias where the `Err` case is `hlsdl::Error`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or no response was received.
    #[error("couldn't fetch {url} ({kind})")]
    Transport {
        url: String,
        kind: TransportKind,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The server responded with a non-success status.
    #[error("couldn't fetch {url} (HTTP {status} {reason})")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    /// The decryption key could not be retrieved.
    #[error("couldn't fetch decryption key")]
    Key {
        url: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Decrypt(#[from] hlsdl_decrypt::DecryptError),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("couldn't parse playlist {url} ({reason})")]
    Playlist { url: String, reason: String },

    #[error("couldn't build http client")]
    Client(#[source] reqwest::Error),

    #[error("output file name {0} collides with the segment scratch files")]
    Filename(String),

    #[error("download cancelled before all segments were fetched")]
    Cancelled,

    #[error("segment worker stopped unexpectedly: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn transport<E>(url: &str, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport {
            url: url.to_owned(),
            kind: TransportKind::classify(&error),
            source: Box::new(error),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by this error.
    ///
    /// Transport failures report [`TRANSPORT_FAILURE_STATUS`], so callers can tell
    /// "never got a response" apart from "got a bad response".
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => Some(TRANSPORT_FAILURE_STATUS),
            Self::Status { status, .. } => Some(*status),
            Self::Key { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Only a connection reset by the peer is worth retrying in place.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportKind::Reset,
                ..
            }
        )
    }
}

/// Structural classification of transport level failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Reset,
    Timeout,
    Refused,
    Connect,
    Other,
}

impl TransportKind {
    /// Walks the source chain looking for an [`io::Error`] whose kind tells what happened.
    pub fn classify(error: &(dyn StdError + 'static)) -> Self {
        let mut connect = false;
        let mut current = Some(error);

        while let Some(error) = current {
            if let Some(error) = error.downcast_ref::<io::Error>() {
                match error.kind() {
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                        return Self::Reset;
                    }
                    io::ErrorKind::ConnectionRefused => return Self::Refused,
                    io::ErrorKind::TimedOut => return Self::Timeout,
                    _ => (),
                }
            }

            if let Some(error) = error.downcast_ref::<reqwest::Error>() {
                if error.is_timeout() {
                    return Self::Timeout;
                }

                connect |= error.is_connect();
            }

            current = error.source();
        }

        if connect { Self::Connect } else { Self::Other }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reset => "connection reset by peer",
            Self::Timeout => "timeout",
            Self::Refused => "connection refused",
            Self::Connect => "connection error",
            Self::Other => "transport error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("error sending request")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_classify_direct() {
        let error = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(TransportKind::classify(&error), TransportKind::Reset);

        let error = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(TransportKind::classify(&error), TransportKind::Refused);

        let error = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(TransportKind::classify(&error), TransportKind::Timeout);
    }

    #[test]
    fn test_classify_nested() {
        let error = Wrapper(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(TransportKind::classify(&error), TransportKind::Reset);

        let error = Wrapper(io::Error::other("tls handshake eof"));
        assert_eq!(TransportKind::classify(&error), TransportKind::Other);
    }

    #[test]
    fn test_classification_ignores_message_text() {
        let error = io::Error::other("connection reset by peer");
        assert_eq!(TransportKind::classify(&error), TransportKind::Other);
    }

    #[test]
    fn test_status_sentinel() {
        let error = Error::transport(
            "http://localhost/seg0.ts",
            io::Error::from(io::ErrorKind::ConnectionRefused),
        );
        assert_eq!(error.status(), Some(TRANSPORT_FAILURE_STATUS));
        assert!(!error.is_retryable());

        let error = Error::Status {
            url: "http://localhost/seg0.ts".to_owned(),
            status: 404,
            reason: "Not Found".to_owned(),
        };
        assert_eq!(error.status(), Some(404));
        assert!(!error.is_retryable());

        let error = Error::Key {
            url: "http://localhost/key.bin".to_owned(),
            source: Box::new(error),
        };
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_only_resets_are_retryable() {
        let error = Error::transport(
            "http://localhost/seg0.ts",
            io::Error::from(io::ErrorKind::ConnectionReset),
        );
        assert!(error.is_retryable());
        assert_eq!(
            error.to_string(),
            "couldn't fetch http://localhost/seg0.ts (connection reset by peer)"
        );

        assert!(!Error::Cancelled.is_retryable());
    }
}
