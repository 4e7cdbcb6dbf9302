//! Storage test utilities.

use scrivener_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A filesystem object store in a temp directory, removed on drop.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<FilesystemBackend>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path())
            .await
            .expect("Failed to create filesystem backend");

        Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.backend.clone()
    }
}
