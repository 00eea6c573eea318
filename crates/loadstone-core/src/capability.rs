//! Platform capability interfaces.
//!
//! The engine never touches the filesystem or the network directly; it goes
//! through these traits. A backend is selected once at install time, and the
//! engine consults [`FsCapability::supports_sync_io`] before attempting any
//! synchronous read, so `require()` fails with a clear error on platforms
//! that only provide asynchronous I/O.

use futures::future::LocalBoxFuture;

use crate::error::Error;

/// Platform-specific storage backend.
///
/// Paths are forward-slash normalized strings as produced by the identifier
/// resolver. Timestamps are milliseconds since the epoch, or any other unit
/// that is monotonically comparable within one platform.
pub trait FsCapability {
    /// Whether the sync forms below are usable on this platform.
    fn supports_sync_io(&self) -> bool {
        false
    }

    fn exists_file(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>>;

    fn exists_dir(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>>;

    fn get_timestamp(&self, path: &str) -> LocalBoxFuture<'_, Result<u64, Error>>;

    fn read_file(&self, path: &str) -> LocalBoxFuture<'_, Result<String, Error>>;

    fn exists_file_sync(&self, _path: &str) -> Result<bool, Error> {
        Err(Error::SyncIoUnsupported)
    }

    fn exists_dir_sync(&self, _path: &str) -> Result<bool, Error> {
        Err(Error::SyncIoUnsupported)
    }

    fn get_timestamp_sync(&self, _path: &str) -> Result<u64, Error> {
        Err(Error::SyncIoUnsupported)
    }

    fn read_file_sync(&self, _path: &str) -> Result<String, Error> {
        Err(Error::SyncIoUnsupported)
    }
}

/// Network fetcher for URL-typed modules. Only the asynchronous path uses it.
pub trait UrlFetcher {
    /// Fetch the content behind `url`. Non-success statuses are errors;
    /// no automatic retry is performed.
    fn fetch(&self, url: &str) -> LocalBoxFuture<'_, Result<String, Error>>;
}
