//! Mock Storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{Storage, StorageBackend, StorageError, StorageResult};

pub const MOCK_BASE_URL: &str = "https://storage.test/public";

/// In-memory storage with call counters, switchable copy/delete failures and slow copies
#[derive(Default)]
pub struct MockStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    copy_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
    copy_delay_ms: AtomicU64,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a file in the mock storage
    pub fn set_file(&self, key: &str, data: Vec<u8>) {
        self.files().insert(key.to_string(), data);
    }

    /// Check if a file exists in the mock storage
    pub fn has_file(&self, key: &str) -> bool {
        self.files().contains_key(key)
    }

    /// Get file data (for test assertions)
    pub fn get_file(&self, key: &str) -> Option<Vec<u8>> {
        self.files().get(key).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }

    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent copy fail with `CopyFailed`.
    pub fn fail_copies(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail with `DeleteFailed`.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Hold every subsequent copy for `delay` before it touches any file.
    pub fn delay_copies(&self, delay: Duration) {
        self.copy_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.files().insert(storage_key.to_string(), data);
        Ok(self.public_url(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.files()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.copy_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(StorageError::CopyFailed(format!(
                "injected failure copying {}",
                from_key
            )));
        }

        let mut files = self.files();
        let data = files
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        files.insert(to_key.to_string(), data);
        drop(files);

        Ok(self.public_url(to_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure deleting {}",
                storage_key
            )));
        }
        self.files().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.files().contains_key(storage_key))
    }

    fn base_url(&self) -> String {
        MOCK_BASE_URL.to_string()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_copy_failure_leaves_source() {
        let storage = MockStorage::new();
        storage.set_file("temp/o/a.png", b"png".to_vec());
        storage.fail_copies(true);

        let result = storage.copy("temp/o/a.png", "o/i/a.png").await;
        assert!(matches!(result, Err(StorageError::CopyFailed(_))));
        assert_eq!(storage.copy_calls(), 1);
        assert!(storage.has_file("temp/o/a.png"));
        assert!(!storage.has_file("o/i/a.png"));
    }

    #[tokio::test]
    async fn test_copy_returns_public_url() {
        let storage = MockStorage::new();
        storage.set_file("temp/o/a b.png", b"png".to_vec());

        let url = storage.copy("temp/o/a b.png", "o/i/a b.png").await.unwrap();
        assert_eq!(url, format!("{}/o/i/a%20b.png", MOCK_BASE_URL));
        assert_eq!(storage.get_file("o/i/a b.png"), Some(b"png".to_vec()));
    }
}
