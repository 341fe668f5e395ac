//! Primary visual selection for gallery thumbnails.

use crate::models::{MediaKind, MediaRef};

/// First image in list order, else first video, else `None`.
///
/// Audio has no visual form and is never chosen; unknown entries are skipped.
pub fn select_primary(refs: &[MediaRef]) -> Option<&str> {
    first_of_kind(refs, MediaKind::Image).or_else(|| first_of_kind(refs, MediaKind::Video))
}

fn first_of_kind(refs: &[MediaRef], kind: MediaKind) -> Option<&str> {
    refs.iter().find(|r| r.kind() == kind).map(MediaRef::url)
}
