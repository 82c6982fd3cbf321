//! Codec capability checks
//!
//! The host probes which media types its platform can decode and hands the
//! result to the engine. Each load infers a type token from the source and
//! checks it against that set.

use std::collections::HashSet;

/// Media type tokens recognized by [`CodecSet::common`]
const COMMON_CODECS: &[&str] = &[
    "mp3", "mpeg", "opus", "ogg", "aac", "m4a", "mp4", "webm", "wav", "flac",
];

/// Source of supported media type tokens
pub trait CodecProvider: Send + Sync {
    /// Whether a type token (e.g. `mp3`, `flac`) can be played
    fn supports(&self, token: &str) -> bool;
}

/// Set of supported media type tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecSet(HashSet<String>);

impl CodecSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats most desktop and browser platforms decode
    pub fn common() -> Self {
        COMMON_CODECS.iter().copied().collect()
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        self.0.insert(token.into().to_ascii_lowercase());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(&token.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CodecSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

impl CodecProvider for CodecSet {
    fn supports(&self, token: &str) -> bool {
        self.contains(token)
    }
}

/// Infer the media type token of a source
///
/// Priority: `data:audio/<type>;` URI, explicit MIME subtype, file extension.
pub fn infer_media_type(src: &str, mime_type: Option<&str>) -> Option<String> {
    if let Some(token) = data_uri_type(src) {
        return Some(token);
    }

    if let Some(subtype) = mime_type.and_then(|mime| mime.split_once('/')).map(|(_, sub)| sub) {
        let subtype = subtype.split(';').next().unwrap_or(subtype).trim();
        if !subtype.is_empty() {
            return Some(subtype.to_ascii_lowercase());
        }
    }

    let path = src.split(['?', '#']).next().unwrap_or(src);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

fn data_uri_type(src: &str) -> Option<String> {
    const PREFIX: &str = "data:audio/";
    let head = src.get(..PREFIX.len())?;
    if !head.eq_ignore_ascii_case(PREFIX) {
        return None;
    }

    let rest = &src[PREFIX.len()..];
    let (token, _) = rest.split_once(';')?;
    (!token.is_empty()).then(|| token.to_ascii_lowercase())
}
