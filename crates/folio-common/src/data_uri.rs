//! `data:` URI parsing and decoding.
//!
//! Image references in paged documents are frequently embedded inline as
//! `data:image/png;base64,...` payloads. The resource resolver decodes these
//! to probe intrinsic dimensions without any network access.

use base64::Engine;
use thiserror::Error;

/// Failure while parsing or decoding a `data:` URI.
#[derive(Debug, Error)]
pub enum DataUriError {
    /// The string does not start with the `data:` scheme.
    #[error("not a data: URI")]
    NotDataUri,
    /// No `,` separator between metadata and payload.
    #[error("malformed data: URI: missing ',' separator")]
    MissingSeparator,
    /// The metadata declares an encoding other than base64.
    #[error("unsupported data: URI encoding '{0}'")]
    UnsupportedEncoding(String),
    /// The base64 payload failed to decode.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A `data:` URI split into its media type and decoded payload.
#[derive(Debug, Clone)]
pub struct DataUri {
    /// Declared media type, e.g. `image/png`. Empty when omitted.
    pub media_type: String,
    /// Decoded payload bytes.
    pub bytes: Vec<u8>,
}

/// Parse and decode a `data:` URI.
///
/// Only base64-encoded payloads are supported; percent-encoded text payloads
/// are rejected with [`DataUriError::UnsupportedEncoding`].
///
/// # Errors
///
/// Returns a [`DataUriError`] if the scheme, separator, encoding, or payload
/// is invalid.
pub fn parse_data_uri(uri: &str) -> Result<DataUri, DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::NotDataUri)?;

    let (metadata, payload) = rest
        .split_once(',')
        .ok_or(DataUriError::MissingSeparator)?;

    let Some(media_type) = metadata.strip_suffix(";base64") else {
        return Err(DataUriError::UnsupportedEncoding(metadata.to_string()));
    };

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;

    Ok(DataUri {
        media_type: media_type.to_string(),
        bytes,
    })
}
