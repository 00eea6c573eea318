#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod fetch;
pub mod memory;
pub mod native;

pub use fetch::HttpFetcher;
pub use memory::MemoryBackend;
pub use native::NativeBackend;
