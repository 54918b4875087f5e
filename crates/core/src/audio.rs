//! Audio payloads travel as `data:` URLs so the browser can play them directly.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::{Error, Result};

/// MIME header prepended to every synthesized clip
pub const MP3_DATA_URL_PREFIX: &str = "data:audio/mp3;base64,";

/// A recorded clip uploaded for transcription, passed through in the
/// container the browser produced (usually webm)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Browser recording defaults for uploads that omit name or type
    pub fn webm(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "audio.webm", "audio/webm")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode raw MP3 bytes as a data URL
pub fn encode_mp3_data_url(bytes: &[u8]) -> String {
    let mut url = String::with_capacity(MP3_DATA_URL_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    url.push_str(MP3_DATA_URL_PREFIX);
    url.push_str(&BASE64.encode(bytes));
    url
}

/// Decode the payload of a data URL, discarding its MIME header.
///
/// Everything up to and including the first `,` is the header.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (_, payload) = url
        .split_once(',')
        .ok_or_else(|| Error::Audio("data URL has no payload separator".to_string()))?;

    BASE64
        .decode(payload)
        .map_err(|e| Error::Audio(format!("invalid base64 payload: {}", e)))
}
