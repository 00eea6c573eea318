//! Identifier classification and normalization.

use url::Url;

use crate::config::LoaderConfig;

/// Separator between parent directory and module name in a `Module`-typed
/// resolved id. A newline can never occur in a filesystem path, so the
/// encoding stays unambiguous and reversible.
pub const MODULE_SEPARATOR: char = '\n';

/// Synthetic filename used when no parent can be determined at all.
pub const SYNTHETIC_ROOT: &str = "/<root>";

/// How an identifier resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
    /// Network-fetched module; asynchronous path only.
    Url,
    /// Filesystem path (absolute, vault-relative, or joined relative).
    Path,
    /// Bare package name, encoded as `<parentDir>\n<moduleName>`.
    Module,
}

/// Transient resolution result. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifier {
    pub id: String,
    pub kind: ResolvedType,
}

impl ResolvedIdentifier {
    fn url(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResolvedType::Url,
        }
    }

    fn path(id: impl Into<String>) -> Self {
        Self {
            id: normalize_dot_segments(&id.into()),
            kind: ResolvedType::Path,
        }
    }

    fn module(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResolvedType::Module,
        }
    }
}

/// Classify and normalize a raw identifier.
///
/// `parent` is the path of the requesting module when known; relative and
/// bare identifiers resolve against its directory. Without a parent, a
/// synthetic root filename is assumed.
#[must_use]
pub fn resolve(config: &LoaderConfig, identifier: &str, parent: Option<&str>) -> ResolvedIdentifier {
    let id = normalize_slashes(identifier);

    // Well-formed absolute URLs; local-resource and file URLs reclassify as paths.
    if let Some(resolved) = classify_url(config, &id) {
        return resolved;
    }

    // Vault-root marker.
    if let Some(rest) = id.strip_prefix("//") {
        return ResolvedIdentifier::path(join_relative(&config.vault_root, rest));
    }

    // System-root marker.
    if let Some(rest) = id.strip_prefix("~/") {
        return ResolvedIdentifier::path(join_relative(&config.home_dir, rest));
    }

    if is_absolute_path(&id) {
        // A single leading slash is relative to the configured modules root;
        // with a modules root of "/" the two cases coincide.
        if let Some(rest) = id.strip_prefix('/') {
            return ResolvedIdentifier::path(join_relative(&config.modules_root, rest));
        }
        return ResolvedIdentifier::path(id);
    }

    let parent = parent.filter(|p| !p.is_empty()).unwrap_or(SYNTHETIC_ROOT);
    let parent_directory = parent_dir(&normalize_slashes(parent)).to_string();

    if id.starts_with("./") || id.starts_with("../") {
        // A relative require from a URL-loaded module stays a URL.
        if looks_like_url(parent) {
            if let Ok(joined) = Url::parse(parent).and_then(|base| base.join(&id)) {
                return ResolvedIdentifier::url(String::from(joined));
            }
        }
        return ResolvedIdentifier::path(join_relative(&parent_directory, &id));
    }

    // Bare package/module name.
    ResolvedIdentifier::module(format!("{parent_directory}{MODULE_SEPARATOR}{id}"))
}

/// Split a `Module`-typed resolved id into (parent directory, module name).
#[must_use]
pub fn split_module_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(MODULE_SEPARATOR)
}

/// Split a query suffix off an identifier: `path?x=1` -> (`path`, `Some("x=1")`).
#[must_use]
pub fn split_query(id: &str) -> (&str, Option<&str>) {
    match id.split_once('?') {
        Some((clean, query)) => (clean, Some(query)),
        None => (id, None),
    }
}

/// Directory portion of a normalized path, `/` for top-level files.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Replace backslashes with forward slashes.
#[must_use]
pub fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join `rest` onto `base` with exactly one slash between them.
#[must_use]
pub fn join_relative(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if base.is_empty() {
        format!("/{rest}")
    } else {
        format!("{base}/{rest}")
    }
}

/// Collapse `.` and `..` segments, preserving any root or scheme prefix.
fn normalize_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&last) if last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

fn classify_url(config: &LoaderConfig, id: &str) -> Option<ResolvedIdentifier> {
    if !looks_like_url(id) {
        return None;
    }
    let parsed = Url::parse(id).ok()?;

    if let Some(prefix) = &config.local_resource_prefix {
        if let Some(rest) = id.strip_prefix(prefix.as_str()) {
            return Some(ResolvedIdentifier::path(format!(
                "/{}",
                rest.trim_start_matches('/')
            )));
        }
    }

    if parsed.scheme() == "file" {
        let rest = id.trim_start_matches("file://").trim_start_matches('/');
        // `file:///C:/x` carries the drive letter after the slashes; such a
        // remainder is already absolute and must not gain a leading `/`.
        if is_absolute_path(rest) {
            return Some(ResolvedIdentifier::path(rest.to_string()));
        }
        return Some(ResolvedIdentifier::path(format!("/{rest}")));
    }

    Some(ResolvedIdentifier::url(id.to_string()))
}

/// URL-shaped check that does not mistake Windows drive letters for schemes.
fn looks_like_url(id: &str) -> bool {
    if id.contains("://") {
        return Url::parse(id).is_ok();
    }
    // Scheme-only forms like `data:`; require a multi-char scheme so `c:/x`
    // stays a path.
    if let Some((scheme, _)) = id.split_once(':') {
        return scheme.len() > 1
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
            && Url::parse(id).is_ok();
    }
    false
}

/// Absolute filesystem path: unix, Windows drive, or UNC.
fn is_absolute_path(spec: &str) -> bool {
    if spec.starts_with('/') {
        return true;
    }

    let chars: Vec<char> = spec.chars().collect();
    if chars.len() >= 3
        && chars[0].is_ascii_alphabetic()
        && chars[1] == ':'
        && (chars[2] == '\\' || chars[2] == '/')
    {
        return true;
    }

    spec.starts_with("\\\\")
}
