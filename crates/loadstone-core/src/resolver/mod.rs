//! Module identifier resolution.
//!
//! `identifier` classifies and normalizes raw identifiers into
//! URL / path / module form; `descriptor` evaluates package descriptor
//! `exports`/`imports` maps; `package` walks candidate roots and
//! `node_modules` to turn a module-typed identifier into a file path.

mod descriptor;
mod identifier;
mod package;

pub use descriptor::{resolve_imports_target, resolve_package_target, PackageTargetMatch};
pub use identifier::{
    join_relative, normalize_slashes, parent_dir, resolve, split_module_id, split_query,
    ResolvedIdentifier, ResolvedType, MODULE_SEPARATOR, SYNTHETIC_ROOT,
};
pub use package::{
    descriptor_paths_async, descriptor_paths_sync, relative_module_name,
    resolve_package_path_async, resolve_package_path_sync, split_module_name,
};

pub(crate) use package::{find_existing_file_async, find_existing_file_sync};
