//! Desktop filesystem backend.
//!
//! Backs the engine with the real filesystem: `std::fs` for the synchronous
//! capability and `tokio::fs` for the asynchronous one. Timestamps are file
//! modification times in milliseconds since the epoch. Reads are lossy so a
//! stray invalid byte in a script file degrades to a replacement character
//! instead of failing the whole load.

use std::time::UNIX_EPOCH;

use futures::future::LocalBoxFuture;

use loadstone_core::error::Error;
use loadstone_core::FsCapability;

/// Storage backend over the local filesystem.
#[derive(Default)]
pub struct NativeBackend;

impl NativeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn mtime_millis(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn not_found_as_false(result: std::io::Result<bool>) -> Result<bool, Error> {
    match result {
        Ok(found) => Ok(found),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl FsCapability for NativeBackend {
    fn supports_sync_io(&self) -> bool {
        true
    }

    fn exists_file(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
        let path = path.to_string();
        Box::pin(async move {
            not_found_as_false(tokio::fs::metadata(&path).await.map(|m| m.is_file()))
        })
    }

    fn exists_dir(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
        let path = path.to_string();
        Box::pin(async move {
            not_found_as_false(tokio::fs::metadata(&path).await.map(|m| m.is_dir()))
        })
    }

    fn get_timestamp(&self, path: &str) -> LocalBoxFuture<'_, Result<u64, Error>> {
        let path = path.to_string();
        Box::pin(async move {
            let metadata = tokio::fs::metadata(&path).await?;
            Ok(mtime_millis(&metadata))
        })
    }

    fn read_file(&self, path: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
        let path = path.to_string();
        Box::pin(async move {
            let bytes = tokio::fs::read(&path).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }

    fn exists_file_sync(&self, path: &str) -> Result<bool, Error> {
        not_found_as_false(std::fs::metadata(path).map(|m| m.is_file()))
    }

    fn exists_dir_sync(&self, path: &str) -> Result<bool, Error> {
        not_found_as_false(std::fs::metadata(path).map(|m| m.is_dir()))
    }

    fn get_timestamp_sync(&self, path: &str) -> Result<u64, Error> {
        let metadata = std::fs::metadata(path)?;
        Ok(mtime_millis(&metadata))
    }

    fn read_file_sync(&self, path: &str) -> Result<String, Error> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
