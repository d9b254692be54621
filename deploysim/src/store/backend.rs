//! Storage backends for the deployment collection

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::SimError;
use crate::filesys::file::File;
use crate::models::deployment::Deploy;

/// Durable home of the whole deployment collection
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Read the collection; `Ok(None)` when nothing was persisted yet
    async fn read(&self) -> Result<Option<Vec<Deploy>>, SimError>;

    /// Replace the persisted collection
    async fn write(&self, deploys: &[Deploy]) -> Result<(), SimError>;
}

/// Collection stored as one JSON document
pub struct JsonFileBackend {
    file: File,
}

impl JsonFileBackend {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn read(&self) -> Result<Option<Vec<Deploy>>, SimError> {
        if !self.file.exists().await {
            return Ok(None);
        }
        let deploys = self.file.read_json::<Vec<Deploy>>().await?;
        Ok(Some(deploys))
    }

    async fn write(&self, deploys: &[Deploy]) -> Result<(), SimError> {
        self.file.write_json_atomic(deploys).await
    }
}

/// In-process backend, used by tests and ephemeral runs
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<Vec<Deploy>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Last persisted collection
    pub fn contents(&self) -> Option<Vec<Deploy>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn read(&self) -> Result<Option<Vec<Deploy>>, SimError> {
        Ok(self.contents())
    }

    async fn write(&self, deploys: &[Deploy]) -> Result<(), SimError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SimError::PersistenceError(
                "memory backend rejects writes".to_string(),
            ));
        }
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(deploys.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
