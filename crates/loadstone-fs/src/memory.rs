//! In-memory storage backend.
//!
//! A deterministic backend for tests and embedding scenarios that have no
//! real filesystem. Every write advances a logical clock by one, so staleness
//! checks see a strict ordering without ever sleeping for mtime granularity.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use futures::future::LocalBoxFuture;

use loadstone_core::error::Error;
use loadstone_core::FsCapability;

/// Backend holding file contents in a map keyed by normalized path.
pub struct MemoryBackend {
    files: RefCell<HashMap<String, (String, u64)>>,
    clock: Cell<u64>,
    sync_io: bool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: RefCell::new(HashMap::new()),
            clock: Cell::new(1),
            sync_io: true,
        }
    }

    /// A backend that refuses synchronous reads, like a browser host.
    #[must_use]
    pub fn async_only() -> Self {
        Self {
            sync_io: false,
            ..Self::new()
        }
    }

    /// Write `content` at `path`, stamping it one tick later than
    /// everything written before.
    pub fn write(&self, path: &str, content: &str) {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);
        self.files
            .borrow_mut()
            .insert(path.to_string(), (content.to_string(), tick));
    }

    /// Remove `path` if present.
    pub fn remove(&self, path: &str) {
        self.files.borrow_mut().remove(path);
    }

    fn lookup(&self, path: &str) -> Option<(String, u64)> {
        self.files.borrow().get(path).cloned()
    }

    fn has_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.files.borrow().keys().any(|k| k.starts_with(&prefix))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FsCapability for MemoryBackend {
    fn supports_sync_io(&self) -> bool {
        self.sync_io
    }

    fn exists_file(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
        let found = self.lookup(path).is_some();
        Box::pin(async move { Ok(found) })
    }

    fn exists_dir(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
        let found = self.has_dir(path);
        Box::pin(async move { Ok(found) })
    }

    fn get_timestamp(&self, path: &str) -> LocalBoxFuture<'_, Result<u64, Error>> {
        let result = self
            .lookup(path)
            .map(|(_, ts)| ts)
            .ok_or_else(|| Error::FileNotFound(path.to_string()));
        Box::pin(async move { result })
    }

    fn read_file(&self, path: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
        let result = self
            .lookup(path)
            .map(|(content, _)| content)
            .ok_or_else(|| Error::FileNotFound(path.to_string()));
        Box::pin(async move { result })
    }

    fn exists_file_sync(&self, path: &str) -> Result<bool, Error> {
        if !self.sync_io {
            return Err(Error::SyncIoUnsupported);
        }
        Ok(self.lookup(path).is_some())
    }

    fn exists_dir_sync(&self, path: &str) -> Result<bool, Error> {
        if !self.sync_io {
            return Err(Error::SyncIoUnsupported);
        }
        Ok(self.has_dir(path))
    }

    fn get_timestamp_sync(&self, path: &str) -> Result<u64, Error> {
        if !self.sync_io {
            return Err(Error::SyncIoUnsupported);
        }
        self.lookup(path)
            .map(|(_, ts)| ts)
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    fn read_file_sync(&self, path: &str) -> Result<String, Error> {
        if !self.sync_io {
            return Err(Error::SyncIoUnsupported);
        }
        self.lookup(path)
            .map(|(content, _)| content)
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }
}
