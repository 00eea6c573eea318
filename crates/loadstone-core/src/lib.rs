#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::return_self_not_must_use)]

pub mod builtins;
pub mod cache;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod options;
pub mod resolver;
pub mod scan;
pub mod transform;
pub mod value;

pub use builtins::{HostBridge, NullHostBridge, BUILTIN_LIST_ID, HOST_INSTANCE_ID};
pub use cache::{EntryState, ModuleCache};
pub use capability::{FsCapability, UrlFetcher};
pub use config::LoaderConfig;
pub use engine::{EngineOptions, FactoryContext, PrimedRequire, RequireEngine};
pub use error::Error;
pub use evaluate::{
    Evaluator, FnModuleFactory, ModuleFactory, PassthroughTranspiler, TranspileError,
    TranspileOutput, Transpiler,
};
pub use options::{CacheInvalidationMode, RequireOptions};
pub use transform::CompiledModule;
pub use value::{ModuleValue, PendingHandle};
