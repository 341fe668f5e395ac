//! Stored object model: where an uploaded file lives and who owns it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// The two disjoint key prefixes an object can live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Upload landing area; the owning item is not known yet.
    Temp,
    /// Owner- and item-scoped final location.
    Permanent,
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Namespace::Temp => write!(f, "temp"),
            Namespace::Permanent => write!(f, "permanent"),
        }
    }
}

/// A reference to one stored file, parsed from its public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub namespace: Namespace,
    pub owner_id: Uuid,
    /// Bound when the object is moved to the permanent namespace.
    pub item_id: Option<Uuid>,
    /// Storage key relative to the backend root.
    pub path: String,
    pub url: String,
}

impl StorageObject {
    /// Last path segment, kept unchanged across migration.
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn is_temp(&self) -> bool {
        self.namespace == Namespace::Temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_segment() {
        let obj = StorageObject {
            namespace: Namespace::Temp,
            owner_id: Uuid::nil(),
            item_id: None,
            path: format!("temp/{}/photo 1.jpg", Uuid::nil()),
            url: String::new(),
        };
        assert_eq!(obj.filename(), "photo 1.jpg");
        assert!(obj.is_temp());
    }
}
