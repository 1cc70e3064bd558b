//! DocId <-> URL codec
//!
//! The appliance only knows documents by URL. Unless DocIds already are
//! URLs, each `/`-separated segment of the unique id is percent-encoded and
//! appended to the adaptor's base URL, so decoding can invert it exactly.

use crate::doc_id::DocId;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use url::Url;

/// Everything except RFC 3986 unreserved characters
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("DocId is not a valid URL: {0}")]
    NotAUrl(String),

    #[error("URL {url} is not under base {base}")]
    ForeignUrl { url: String, base: String },

    #[error("URL segment is not valid UTF-8 once decoded: {0}")]
    InvalidUtf8(String),
}

/// Maps DocIds to feed URLs and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocIdCodec {
    base: String,
    doc_id_is_url: bool,
}

impl DocIdCodec {
    /// `base_url` is where the adaptor serves documents, e.g. `http://host:5678/doc/`
    pub fn new(base_url: &str, doc_id_is_url: bool) -> Result<Self, CodecError> {
        let parsed = Url::parse(base_url).map_err(|e| CodecError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(CodecError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "must be a hierarchical URL without query or fragment".to_string(),
            });
        }

        let mut base = parsed.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            base,
            doc_id_is_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn doc_id_is_url(&self) -> bool {
        self.doc_id_is_url
    }

    pub fn encode(&self, doc_id: &DocId) -> Result<String, CodecError> {
        let unique_id = doc_id.unique_id();
        if self.doc_id_is_url {
            Url::parse(unique_id).map_err(|_| CodecError::NotAUrl(unique_id.to_string()))?;
            return Ok(unique_id.to_string());
        }

        let path = unique_id
            .split('/')
            .map(|segment| utf8_percent_encode(&escape_dots(segment), SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("{}{}", self.base, path))
    }

    /// URL of the named resource `fragment` under `doc_id`
    pub fn encode_with_fragment(&self, doc_id: &DocId, fragment: &str) -> Result<String, CodecError> {
        let url = self.encode(doc_id)?;
        Ok(format!("{}#{}", url, utf8_percent_encode(fragment, SEGMENT)))
    }

    pub fn decode(&self, url: &str) -> Result<DocId, CodecError> {
        if self.doc_id_is_url {
            return Ok(DocId::new(url));
        }

        let path = url.strip_prefix(&self.base).ok_or_else(|| CodecError::ForeignUrl {
            url: url.to_string(),
            base: self.base.clone(),
        })?;

        let segments = path
            .split('/')
            .map(|segment| {
                percent_decode_str(unescape_dots(segment))
                    .decode_utf8()
                    .map(|s| s.into_owned())
                    .map_err(|_| CodecError::InvalidUtf8(segment.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocId::new(segments.join("/")))
    }
}

fn is_all_dots(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b == b'.')
}

// "." and ".." would be collapsed by URL normalization, so every all-dot
// segment grows by two dots. Encoded all-dot segments are always >= 3 long.
fn escape_dots(segment: &str) -> String {
    if is_all_dots(segment) {
        format!("..{}", segment)
    } else {
        segment.to_string()
    }
}

fn unescape_dots(segment: &str) -> &str {
    if is_all_dots(segment) && segment.len() >= 3 {
        &segment[2..]
    } else {
        segment
    }
}
