//! Test doubles for crates that depend on `Storage`.

mod mock_storage;

pub use mock_storage::{MockStorage, MOCK_BASE_URL};
