use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::media_kind::classify;

/// Classifier output. `Unknown` is a valid answer for non-media URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Unknown,
}

impl MediaKind {
    /// Whether the kind can stand in as a thumbnail.
    pub fn is_visual(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A media URL attached to an item.
///
/// Only the URL is stored; the kind is recomputed from it on every call so a
/// stale stored kind can never disagree with the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef {
    url: String,
}

impl MediaRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> MediaKind {
        classify(&self.url)
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

impl From<&str> for MediaRef {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for MediaRef {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Ordered media of one item. Order is display order and is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaList(Vec<MediaRef>);

impl MediaList {
    pub fn new(refs: Vec<MediaRef>) -> Self {
        Self(refs)
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(urls.into_iter().map(MediaRef::new).collect())
    }

    pub fn as_slice(&self) -> &[MediaRef] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaRef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of one kind, in list order.
    pub fn of_kind(&self, kind: MediaKind) -> impl Iterator<Item = &MediaRef> {
        self.0.iter().filter(move |r| r.kind() == kind)
    }

    /// Thumbnail-worthy URL, see [`crate::primary::select_primary`].
    pub fn primary(&self) -> Option<&str> {
        crate::primary::select_primary(&self.0)
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(MediaRef::url)
    }
}

impl FromIterator<MediaRef> for MediaList {
    fn from_iter<T: IntoIterator<Item = MediaRef>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MediaList {
    type Item = MediaRef;
    type IntoIter = std::vec::IntoIter<MediaRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_ref_kind_follows_url() {
        let r = MediaRef::new("https://x/a.jpg");
        assert_eq!(r.kind(), MediaKind::Image);
        assert_eq!(MediaRef::new("https://x/c.mp3").kind(), MediaKind::Audio);
    }

    #[test]
    fn media_list_preserves_order() {
        let list = MediaList::from_urls(["https://x/c.mp3", "https://x/b.mp4", "https://x/a.jpg"]);
        let urls: Vec<&str> = list.urls().collect();
        assert_eq!(urls, vec!["https://x/c.mp3", "https://x/b.mp4", "https://x/a.jpg"]);
        assert_eq!(list.primary(), Some("https://x/a.jpg"));
    }

    #[test]
    fn media_list_of_kind_filters_in_order() {
        let list = MediaList::from_urls([
            "https://x/1.png",
            "https://x/2.mp3",
            "https://x/3.gif",
        ]);
        let images: Vec<&str> = list.of_kind(MediaKind::Image).map(MediaRef::url).collect();
        assert_eq!(images, vec!["https://x/1.png", "https://x/3.gif"]);
    }

    #[test]
    fn media_ref_serializes_as_plain_url() {
        let json = serde_json::to_string(&MediaRef::new("https://x/a.jpg")).unwrap();
        assert_eq!(json, "\"https://x/a.jpg\"");
    }
}
