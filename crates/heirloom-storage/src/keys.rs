//! Shared key generation and URL parsing for storage backends.
//!
//! Key format: temp uploads are `{temp_prefix}/{owner_id}/{filename}`,
//! migrated objects are `{owner_id}/{item_id}/{filename}`. Public URLs are
//! `{base_url}/{key}` with each key segment percent-encoded.

use heirloom_core::{Namespace, StorageObject};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Build the public URL of a key under `base_url`.
pub fn public_url(base_url: &str, storage_key: &str) -> String {
    let encoded: Vec<String> = storage_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}

/// Namespace layout of one storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    base_url: String,
    temp_prefix: String,
}

impl KeyLayout {
    pub fn new(base_url: impl Into<String>, temp_prefix: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let temp_prefix: String = temp_prefix.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            temp_prefix: temp_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn temp_prefix(&self) -> &str {
        &self.temp_prefix
    }

    /// Key of a fresh upload, before its item is known.
    pub fn temp_key(&self, owner_id: Uuid, filename: &str) -> String {
        format!("{}/{}/{}", self.temp_prefix, owner_id, filename)
    }

    /// Owner- and item-scoped destination key.
    pub fn permanent_key(&self, owner_id: Uuid, item_id: Uuid, filename: &str) -> String {
        format!("{}/{}/{}", owner_id, item_id, filename)
    }

    pub fn public_url(&self, storage_key: &str) -> String {
        public_url(&self.base_url, storage_key)
    }

    /// Parse a public URL into the object it names.
    ///
    /// Query strings and fragments (signed URLs, cache busters) are ignored.
    /// URLs outside the base URL, or whose key has neither the temp nor the
    /// permanent shape, are `InvalidReference`.
    pub fn parse_url(&self, url: &str) -> StorageResult<StorageObject> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);

        let encoded_key = without_query
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                StorageError::InvalidReference(format!("URL is not under {}: {}", self.base_url, url))
            })?;

        let segments = encoded_key
            .split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .map_err(|_| StorageError::InvalidReference(format!("Malformed URL encoding: {}", url)))
            })
            .collect::<StorageResult<Vec<String>>>()?;

        self.parse_segments(&segments, url)
    }

    fn parse_segments(&self, segments: &[String], url: &str) -> StorageResult<StorageObject> {
        let invalid = || {
            StorageError::InvalidReference(format!(
                "URL matches neither the temp nor the permanent key layout: {}",
                url
            ))
        };

        if segments.len() != 3 {
            return Err(invalid());
        }
        if segments
            .iter()
            .any(|s| s.is_empty() || s == "." || s == ".." || s.contains('/'))
        {
            return Err(invalid());
        }

        let path = segments.join("/");

        if segments[0] == self.temp_prefix {
            let owner_id = Uuid::parse_str(&segments[1]).map_err(|_| invalid())?;
            return Ok(StorageObject {
                namespace: Namespace::Temp,
                owner_id,
                item_id: None,
                path,
                url: url.to_string(),
            });
        }

        let owner_id = Uuid::parse_str(&segments[0]).map_err(|_| invalid())?;
        let item_id = Uuid::parse_str(&segments[1]).map_err(|_| invalid())?;
        Ok(StorageObject {
            namespace: Namespace::Permanent,
            owner_id,
            item_id: Some(item_id),
            path,
            url: url.to_string(),
        })
    }
}
