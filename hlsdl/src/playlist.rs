use crate::{
    error::{Error, Result},
    http::HttpClient,
};
use log::debug;
use reqwest::Url;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

/// One fetchable unit of the media playlist.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Segment {
    /// Media sequence number, used both as download identity and ordering key.
    pub seq_id: u64,
    pub uri: String,
    pub title: Option<String>,
    pub duration: f32,
    /// Present when the segment is encrypted.
    pub key: Option<Key>,
    /// Scratch file holding the fetched bytes, assigned when the segment is scheduled.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Segment {
    pub fn scratch_path(&self, directory: &Path) -> PathBuf {
        directory.join(format!("seg{}.ts", self.seq_id))
    }
}

/// Whether `name` has the `seg<N>.ts` form used for scratch files.
pub fn is_scratch_name(name: &str) -> bool {
    name.strip_prefix("seg")
        .and_then(|x| x.strip_suffix(".ts"))
        .is_some_and(|x| !x.is_empty() && x.bytes().all(|x| x.is_ascii_digit()))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Key {
    pub uri: String,
    #[serde(serialize_with = "serialize_iv")]
    pub iv: Option<[u8; 16]>,
}

impl Key {
    /// Explicit IV when the playlist carries one, otherwise the sequence number.
    pub fn iv(&self, seq_id: u64) -> [u8; 16] {
        self.iv.unwrap_or_else(|| hlsdl_decrypt::default_iv(seq_id))
    }
}

fn serialize_iv<S: Serializer>(
    iv: &Option<[u8; 16]>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match iv {
        Some(iv) => serializer.serialize_str(&format!("0x{}", hex::encode(iv))),
        None => serializer.serialize_none(),
    }
}

/// Fetches the media playlist at `url` and lists its segments in playlist order.
pub async fn parse_segments<C: HttpClient>(
    client: &C,
    url: &str,
    headers: &[(String, String)],
) -> Result<Vec<Segment>> {
    let base_url = url.parse::<Url>().map_err(|x| Error::Playlist {
        url: url.to_owned(),
        reason: x.to_string(),
    })?;
    let text = client.get(url, headers).await?;
    debug!("Fetched playlist {} ({} bytes)", url, text.len());

    match m3u8_rs::parse_playlist_res(&text) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(m3u8)) => push_segments(&m3u8, &base_url),
        Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => Err(Error::Playlist {
            url: url.to_owned(),
            reason: "master playlists are not supported, use one of its media playlists".to_owned(),
        }),
        Err(_) => Err(Error::Playlist {
            url: url.to_owned(),
            reason: "not a valid m3u8 playlist".to_owned(),
        }),
    }
}

fn push_segments(m3u8: &m3u8_rs::MediaPlaylist, base_url: &Url) -> Result<Vec<Segment>> {
    let mut segments = Vec::with_capacity(m3u8.segments.len());
    // EXT-X-KEY stays in effect until the next EXT-X-KEY tag.
    let mut key = None;

    for (i, segment) in m3u8.segments.iter().enumerate() {
        if let Some(m3u8_key) = &segment.key {
            key = parse_key(m3u8_key, base_url)?;
        } else if clears_key(segment) {
            key = None;
        }

        segments.push(Segment {
            seq_id: m3u8.media_sequence + i as u64,
            uri: join_url(base_url, &segment.uri)?,
            title: segment.title.clone().filter(|x| !x.is_empty()),
            duration: segment.duration,
            key: key.clone(),
            path: PathBuf::new(),
        });
    }

    Ok(segments)
}

/// m3u8-rs rejects `METHOD=NONE` without an `IV` attribute and keeps the tag as unknown.
fn clears_key(segment: &m3u8_rs::MediaSegment) -> bool {
    segment.unknown_tags.iter().any(|x| {
        x.tag == "X-KEY"
            && x
                .rest
                .as_deref()
                .is_some_and(|rest| rest.split(',').any(|attr| attr.trim() == "METHOD=NONE"))
    })
}

fn parse_key(m3u8_key: &m3u8_rs::Key, base_url: &Url) -> Result<Option<Key>> {
    match &m3u8_key.method {
        m3u8_rs::KeyMethod::None => Ok(None),
        m3u8_rs::KeyMethod::AES128 => {
            let uri = m3u8_key.uri.as_ref().ok_or_else(|| Error::Playlist {
                url: base_url.to_string(),
                reason: "AES-128 key without URI attribute".to_owned(),
            })?;
            let iv = m3u8_key
                .iv
                .as_deref()
                .map(hlsdl_decrypt::parse_iv)
                .transpose()?;

            Ok(Some(Key {
                uri: join_url(base_url, uri)?,
                iv,
            }))
        }
        m3u8_rs::KeyMethod::SampleAES => Err(Error::Playlist {
            url: base_url.to_string(),
            reason: "SAMPLE-AES decryption is not supported".to_owned(),
        }),
        m3u8_rs::KeyMethod::Other(method) => Err(Error::Playlist {
            url: base_url.to_string(),
            reason: format!("{} decryption is not supported", method),
        }),
    }
}

fn join_url(base_url: &Url, uri: &str) -> Result<String> {
    base_url
        .join(uri)
        .map(|x| x.to_string())
        .map_err(|x| Error::Playlist {
            url: base_url.to_string(),
            reason: format!("invalid uri {} ({})", uri, x),
        })
}
