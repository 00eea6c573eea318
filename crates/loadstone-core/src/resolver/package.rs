//! Bare module name resolution against package directories.
//!
//! Turns a module-typed identifier (parent directory + bare name) into a
//! concrete file path. Candidate roots are the nearest directory with a
//! `package.json` above the requesting module and above the configured
//! modules root; within each root, the package directory is either the root
//! itself (self-references and `#` private names) or
//! `<root>/node_modules/<name>`. Descriptor maps are evaluated by
//! [`super::descriptor`]; this module does the probing.

use serde_json::Value;

use crate::capability::FsCapability;
use crate::config::LoaderConfig;
use crate::error::Error;

use super::descriptor::{resolve_package_target, PackageTargetMatch};
use super::identifier::{join_relative, parent_dir};

/// Suffixes probed, in order, when a resolved path has no existing file.
/// The same list is probed again under an `/index` segment.
pub(crate) const MODULE_SUFFIXES: &[&str] = &["", ".js", ".cjs", ".mjs", ".ts", ".cts", ".mts"];

/// Split a bare name into (package name, subpath after it).
///
/// Scoped names keep their first two segments together: `@scope/pkg/sub`
/// splits as (`@scope/pkg`, `sub`). A scope with no package name is an error.
pub fn split_module_name(name: &str) -> Result<(String, Option<String>), Error> {
    if let Some(rest) = name.strip_prefix('@') {
        let mut parts = rest.splitn(3, '/');
        let scope = parts.next().unwrap_or("");
        match parts.next() {
            Some(pkg) if !scope.is_empty() && !pkg.is_empty() => Ok((
                format!("@{scope}/{pkg}"),
                parts.next().map(str::to_string),
            )),
            _ => Err(Error::InvalidScopedModuleName(name.to_string())),
        }
    } else {
        match name.split_once('/') {
            Some((base, sub)) => Ok((base.to_string(), Some(sub.to_string()))),
            None => Ok((name.to_string(), None)),
        }
    }
}

/// Descriptor-relative form of a bare name: `"."`, `"./sub"`, or `"#name"`.
pub fn relative_module_name(name: &str) -> Result<String, Error> {
    if name.starts_with('#') {
        return Ok(name.to_string());
    }
    let (_, sub) = split_module_name(name)?;
    Ok(match sub {
        Some(sub) => format!("./{sub}"),
        None => ".".to_string(),
    })
}

/// Resolve a bare `name` required from `parent_dir` to a file path.
pub fn resolve_package_path_sync(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
    name: &str,
) -> Result<String, Error> {
    let relative = relative_module_name(name)?;
    let base = package_base(name)?;

    for root in candidate_roots_sync(config, fs, parent_dir)? {
        for dir in package_dirs_sync(fs, &root, base.as_deref())? {
            if let Some(path) = resolve_in_package_sync(fs, &dir, &relative)? {
                return Ok(path);
            }
        }
    }
    Err(Error::ModuleNotFound(name.to_string()))
}

/// Async form of [`resolve_package_path_sync`].
pub async fn resolve_package_path_async(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
    name: &str,
) -> Result<String, Error> {
    let relative = relative_module_name(name)?;
    let base = package_base(name)?;

    for root in candidate_roots_async(config, fs, parent_dir).await? {
        for dir in package_dirs_async(fs, &root, base.as_deref()).await? {
            if let Some(path) = resolve_in_package_async(fs, &dir, &relative).await? {
                return Ok(path);
            }
        }
    }
    Err(Error::ModuleNotFound(name.to_string()))
}

/// Package descriptor files consulted when resolving `name` from
/// `parent_dir`. A change to any of these can change what the name resolves
/// to, so their timestamps participate in staleness checks.
pub fn descriptor_paths_sync(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
    name: &str,
) -> Result<Vec<String>, Error> {
    let base = package_base(name)?;
    let mut paths = Vec::new();
    for root in candidate_roots_sync(config, fs, parent_dir)? {
        let mut dirs = vec![root.clone()];
        dirs.extend(package_dirs_sync(fs, &root, base.as_deref())?);
        for dir in dirs {
            let descriptor = join_relative(&dir, "package.json");
            if fs.exists_file_sync(&descriptor)? && !paths.contains(&descriptor) {
                paths.push(descriptor);
            }
        }
    }
    Ok(paths)
}

/// Async form of [`descriptor_paths_sync`].
pub async fn descriptor_paths_async(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
    name: &str,
) -> Result<Vec<String>, Error> {
    let base = package_base(name)?;
    let mut paths = Vec::new();
    for root in candidate_roots_async(config, fs, parent_dir).await? {
        let mut dirs = vec![root.clone()];
        dirs.extend(package_dirs_async(fs, &root, base.as_deref()).await?);
        for dir in dirs {
            let descriptor = join_relative(&dir, "package.json");
            if fs.exists_file(&descriptor).await? && !paths.contains(&descriptor) {
                paths.push(descriptor);
            }
        }
    }
    Ok(paths)
}

/// Probe a path with the suffix list, then again under `/index`.
pub(crate) fn find_existing_file_sync(
    fs: &dyn FsCapability,
    path: &str,
) -> Result<Option<String>, Error> {
    for suffix in MODULE_SUFFIXES {
        let candidate = format!("{path}{suffix}");
        if fs.exists_file_sync(&candidate)? {
            return Ok(Some(candidate));
        }
    }
    for suffix in MODULE_SUFFIXES {
        let candidate = format!("{path}/index{suffix}");
        if fs.exists_file_sync(&candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Async form of [`find_existing_file_sync`].
pub(crate) async fn find_existing_file_async(
    fs: &dyn FsCapability,
    path: &str,
) -> Result<Option<String>, Error> {
    for suffix in MODULE_SUFFIXES {
        let candidate = format!("{path}{suffix}");
        if fs.exists_file(&candidate).await? {
            return Ok(Some(candidate));
        }
    }
    for suffix in MODULE_SUFFIXES {
        let candidate = format!("{path}/index{suffix}");
        if fs.exists_file(&candidate).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// The package name part of a bare name, or `None` for `#` private names.
fn package_base(name: &str) -> Result<Option<String>, Error> {
    if name.starts_with('#') {
        Ok(None)
    } else {
        Ok(Some(split_module_name(name)?.0))
    }
}

fn candidate_roots_sync(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
) -> Result<Vec<String>, Error> {
    let mut roots = Vec::new();
    if let Some(root) = nearest_package_root_sync(fs, parent_dir)? {
        roots.push(root);
    }
    let modules_root = nearest_package_root_sync(fs, &config.modules_root)?
        .unwrap_or_else(|| config.modules_root.clone());
    if !roots.contains(&modules_root) {
        roots.push(modules_root);
    }
    Ok(roots)
}

async fn candidate_roots_async(
    config: &LoaderConfig,
    fs: &dyn FsCapability,
    parent_dir: &str,
) -> Result<Vec<String>, Error> {
    let mut roots = Vec::new();
    if let Some(root) = nearest_package_root_async(fs, parent_dir).await? {
        roots.push(root);
    }
    let modules_root = nearest_package_root_async(fs, &config.modules_root)
        .await?
        .unwrap_or_else(|| config.modules_root.clone());
    if !roots.contains(&modules_root) {
        roots.push(modules_root);
    }
    Ok(roots)
}

/// Walk upward from `dir` to the nearest directory holding a `package.json`.
fn nearest_package_root_sync(
    fs: &dyn FsCapability,
    dir: &str,
) -> Result<Option<String>, Error> {
    let mut current = dir.to_string();
    loop {
        if fs.exists_file_sync(&join_relative(&current, "package.json"))? {
            return Ok(Some(current));
        }
        let up = parent_dir(&current).to_string();
        if up == current {
            return Ok(None);
        }
        current = up;
    }
}

async fn nearest_package_root_async(
    fs: &dyn FsCapability,
    dir: &str,
) -> Result<Option<String>, Error> {
    let mut current = dir.to_string();
    loop {
        if fs.exists_file(&join_relative(&current, "package.json")).await? {
            return Ok(Some(current));
        }
        let up = parent_dir(&current).to_string();
        if up == current {
            return Ok(None);
        }
        current = up;
    }
}

/// Package directories to try under one root, in order.
///
/// `#` private names and self-references resolve against the root package
/// itself; everything else goes through `node_modules`.
fn package_dirs_sync(
    fs: &dyn FsCapability,
    root: &str,
    base: Option<&str>,
) -> Result<Vec<String>, Error> {
    let Some(base) = base else {
        return Ok(vec![root.to_string()]);
    };

    let mut dirs = Vec::new();
    let descriptor = join_relative(root, "package.json");
    if fs.exists_file_sync(&descriptor)? {
        if let Ok(parsed) = parse_descriptor(&fs.read_file_sync(&descriptor)?, &descriptor) {
            if parsed.get("name").and_then(Value::as_str) == Some(base) {
                dirs.push(root.to_string());
            }
        }
    }

    let nested = join_relative(&join_relative(root, "node_modules"), base);
    if fs.exists_dir_sync(&nested)? {
        dirs.push(nested);
    }
    Ok(dirs)
}

async fn package_dirs_async(
    fs: &dyn FsCapability,
    root: &str,
    base: Option<&str>,
) -> Result<Vec<String>, Error> {
    let Some(base) = base else {
        return Ok(vec![root.to_string()]);
    };

    let mut dirs = Vec::new();
    let descriptor = join_relative(root, "package.json");
    if fs.exists_file(&descriptor).await? {
        if let Ok(parsed) = parse_descriptor(&fs.read_file(&descriptor).await?, &descriptor) {
            if parsed.get("name").and_then(Value::as_str) == Some(base) {
                dirs.push(root.to_string());
            }
        }
    }

    let nested = join_relative(&join_relative(root, "node_modules"), base);
    if fs.exists_dir(&nested).await? {
        dirs.push(nested);
    }
    Ok(dirs)
}

/// Resolve `relative` inside one package directory.
fn resolve_in_package_sync(
    fs: &dyn FsCapability,
    dir: &str,
    relative: &str,
) -> Result<Option<String>, Error> {
    let descriptor_path = join_relative(dir, "package.json");
    let descriptor = if fs.exists_file_sync(&descriptor_path)? {
        Some(parse_descriptor(
            &fs.read_file_sync(&descriptor_path)?,
            &descriptor_path,
        )?)
    } else {
        None
    };

    let legacy = match &descriptor {
        Some(descriptor) => match resolve_package_target(descriptor, relative) {
            PackageTargetMatch::Target(target) => {
                let inner = target.strip_prefix("./").unwrap_or(&target);
                return find_existing_file_sync(fs, &join_relative(dir, inner));
            }
            PackageTargetMatch::NoExportsMap => true,
            PackageTargetMatch::NotFound => false,
        },
        None => true,
    };
    if !legacy {
        return Ok(None);
    }

    for candidate in legacy_candidates(dir, relative, descriptor.as_ref()) {
        if let Some(found) = find_existing_file_sync(fs, &candidate)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

async fn resolve_in_package_async(
    fs: &dyn FsCapability,
    dir: &str,
    relative: &str,
) -> Result<Option<String>, Error> {
    let descriptor_path = join_relative(dir, "package.json");
    let descriptor = if fs.exists_file(&descriptor_path).await? {
        Some(parse_descriptor(
            &fs.read_file(&descriptor_path).await?,
            &descriptor_path,
        )?)
    } else {
        None
    };

    let legacy = match &descriptor {
        Some(descriptor) => match resolve_package_target(descriptor, relative) {
            PackageTargetMatch::Target(target) => {
                let inner = target.strip_prefix("./").unwrap_or(&target);
                return find_existing_file_async(fs, &join_relative(dir, inner)).await;
            }
            PackageTargetMatch::NoExportsMap => true,
            PackageTargetMatch::NotFound => false,
        },
        None => true,
    };
    if !legacy {
        return Ok(None);
    }

    for candidate in legacy_candidates(dir, relative, descriptor.as_ref()) {
        if let Some(found) = find_existing_file_async(fs, &candidate).await? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Pre-exports-era fallback paths: the `main` field and `index` for the
/// package root, the literal subpath otherwise. `#` names have no legacy form.
fn legacy_candidates(dir: &str, relative: &str, descriptor: Option<&Value>) -> Vec<String> {
    if relative.starts_with('#') {
        return Vec::new();
    }
    if relative == "." {
        let mut candidates = Vec::new();
        if let Some(main) = descriptor
            .and_then(|d| d.get("main"))
            .and_then(Value::as_str)
        {
            candidates.push(join_relative(dir, main.strip_prefix("./").unwrap_or(main)));
        }
        candidates.push(join_relative(dir, "index.js"));
        candidates
    } else {
        vec![join_relative(
            dir,
            relative.strip_prefix("./").unwrap_or(relative),
        )]
    }
}

fn parse_descriptor(content: &str, path: &str) -> Result<Value, Error> {
    serde_json::from_str(content).map_err(|source| Error::JsonParse {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::LocalBoxFuture;
    use std::collections::BTreeMap;

    /// In-memory filesystem for resolver tests.
    struct MapFs {
        files: BTreeMap<String, String>,
    }

    impl MapFs {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
                    .collect(),
            }
        }

        fn has_dir(&self, path: &str) -> bool {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            self.files.keys().any(|k| k.starts_with(&prefix))
        }
    }

    impl FsCapability for MapFs {
        fn supports_sync_io(&self) -> bool {
            true
        }

        fn exists_file(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
            let result = self.exists_file_sync(path);
            Box::pin(async move { result })
        }

        fn exists_dir(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
            let result = self.exists_dir_sync(path);
            Box::pin(async move { result })
        }

        fn get_timestamp(&self, path: &str) -> LocalBoxFuture<'_, Result<u64, Error>> {
            let result = self.get_timestamp_sync(path);
            Box::pin(async move { result })
        }

        fn read_file(&self, path: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
            let result = self.read_file_sync(path);
            Box::pin(async move { result })
        }

        fn exists_file_sync(&self, path: &str) -> Result<bool, Error> {
            Ok(self.files.contains_key(path))
        }

        fn exists_dir_sync(&self, path: &str) -> Result<bool, Error> {
            Ok(self.has_dir(path))
        }

        fn get_timestamp_sync(&self, _path: &str) -> Result<u64, Error> {
            Ok(0)
        }

        fn read_file_sync(&self, path: &str) -> Result<String, Error> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::FileNotFound(path.to_string()))
        }
    }

    fn config() -> LoaderConfig {
        LoaderConfig {
            modules_root: "/vault/scripts".to_string(),
            ..LoaderConfig::default()
        }
    }

    #[test]
    fn test_split_module_name() {
        assert_eq!(
            split_module_name("lodash").unwrap(),
            ("lodash".to_string(), None)
        );
        assert_eq!(
            split_module_name("lodash/fp").unwrap(),
            ("lodash".to_string(), Some("fp".to_string()))
        );
        assert_eq!(
            split_module_name("@scope/pkg").unwrap(),
            ("@scope/pkg".to_string(), None)
        );
        assert_eq!(
            split_module_name("@scope/pkg/deep/sub").unwrap(),
            ("@scope/pkg".to_string(), Some("deep/sub".to_string()))
        );
    }

    #[test]
    fn test_split_module_name_rejects_bare_scope() {
        assert!(matches!(
            split_module_name("@scope"),
            Err(Error::InvalidScopedModuleName(_))
        ));
        assert!(matches!(
            split_module_name("@scope/"),
            Err(Error::InvalidScopedModuleName(_))
        ));
    }

    #[test]
    fn test_relative_module_name() {
        assert_eq!(relative_module_name("lodash").unwrap(), ".");
        assert_eq!(relative_module_name("lodash/fp").unwrap(), "./fp");
        assert_eq!(relative_module_name("@scope/pkg/x").unwrap(), "./x");
        assert_eq!(relative_module_name("#internal").unwrap(), "#internal");
    }

    #[test]
    fn test_resolve_via_exports_map() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            (
                "/vault/scripts/node_modules/dep/package.json",
                r#"{ "exports": { ".": "./dist/index.js" } }"#,
            ),
            ("/vault/scripts/node_modules/dep/dist/index.js", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts/lib", "dep").unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/dep/dist/index.js");
    }

    #[test]
    fn test_resolve_scoped_subpath_via_wildcard() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            (
                "/vault/scripts/node_modules/@scope/pkg/package.json",
                r#"{ "exports": { "./*": "./dist/*.js" } }"#,
            ),
            ("/vault/scripts/node_modules/@scope/pkg/dist/util.js", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts", "@scope/pkg/util")
                .unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/@scope/pkg/dist/util.js");
    }

    #[test]
    fn test_resolve_main_field_fallback() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            (
                "/vault/scripts/node_modules/legacy/package.json",
                r#"{ "main": "lib/entry.js" }"#,
            ),
            ("/vault/scripts/node_modules/legacy/lib/entry.js", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts", "legacy").unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/legacy/lib/entry.js");
    }

    #[test]
    fn test_resolve_index_fallback_without_descriptor() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            ("/vault/scripts/node_modules/plain/index.js", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts", "plain").unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/plain/index.js");
    }

    #[test]
    fn test_resolve_legacy_subpath_with_suffix() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            ("/vault/scripts/node_modules/legacy/lib/util.ts", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts", "legacy/lib/util")
                .unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/legacy/lib/util.ts");
    }

    #[test]
    fn test_resolve_private_import_against_requesting_package() {
        let fs = MapFs::new(&[
            (
                "/vault/pkg/package.json",
                r##"{ "imports": { "#util": "./src/util.js" } }"##,
            ),
            ("/vault/pkg/src/util.js", ""),
            ("/vault/pkg/src/a.js", ""),
        ]);
        let path =
            resolve_package_path_sync(&config(), &fs, "/vault/pkg/src", "#util").unwrap();
        assert_eq!(path, "/vault/pkg/src/util.js");
    }

    #[test]
    fn test_resolve_self_reference_by_name() {
        let fs = MapFs::new(&[
            (
                "/vault/pkg/package.json",
                r#"{ "name": "mypkg", "exports": { ".": "./main.js" } }"#,
            ),
            ("/vault/pkg/main.js", ""),
        ]);
        let path = resolve_package_path_sync(&config(), &fs, "/vault/pkg", "mypkg").unwrap();
        assert_eq!(path, "/vault/pkg/main.js");
    }

    #[test]
    fn test_resolve_falls_back_to_modules_root() {
        let fs = MapFs::new(&[
            ("/vault/scripts/node_modules/dep/index.js", ""),
        ]);
        let path = resolve_package_path_sync(&config(), &fs, "/elsewhere/deep", "dep").unwrap();
        assert_eq!(path, "/vault/scripts/node_modules/dep/index.js");
    }

    #[test]
    fn test_resolve_not_found() {
        let fs = MapFs::new(&[("/vault/scripts/package.json", "{}")]);
        let err =
            resolve_package_path_sync(&config(), &fs, "/vault/scripts", "missing").unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_descriptor_paths_cover_root_and_package() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            (
                "/vault/scripts/node_modules/dep/package.json",
                r#"{ "exports": { ".": "./index.js" } }"#,
            ),
            ("/vault/scripts/node_modules/dep/index.js", ""),
        ]);
        let paths =
            descriptor_paths_sync(&config(), &fs, "/vault/scripts", "dep").unwrap();
        assert_eq!(
            paths,
            vec![
                "/vault/scripts/package.json".to_string(),
                "/vault/scripts/node_modules/dep/package.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_async_matches_sync() {
        let fs = MapFs::new(&[
            ("/vault/scripts/package.json", "{}"),
            (
                "/vault/scripts/node_modules/dep/package.json",
                r#"{ "exports": { ".": "./dist/index.js" } }"#,
            ),
            ("/vault/scripts/node_modules/dep/dist/index.js", ""),
        ]);
        let sync = resolve_package_path_sync(&config(), &fs, "/vault/scripts", "dep").unwrap();
        let asynchronous = resolve_package_path_async(&config(), &fs, "/vault/scripts", "dep")
            .await
            .unwrap();
        assert_eq!(sync, asynchronous);
    }
}
