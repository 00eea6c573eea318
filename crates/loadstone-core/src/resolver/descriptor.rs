//! Package descriptor `exports`/`imports` evaluation.
//!
//! Pure functions over parsed descriptor JSON:
//! - string, array (first element), and conditions-object targets
//! - condition preference order: `require`, `node`, `import`, `default`
//! - exact subpath keys and single-`*` wildcard keys with capture
//!   substitution (most specific pattern wins)
//! - `imports` map for `#`-prefixed private names

use serde_json::Value;

/// Conditions preferred when evaluating a conditions object, in order.
const CONDITIONS: [&str; 4] = ["require", "node", "import", "default"];

/// Outcome of descriptor evaluation for a relative module name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageTargetMatch {
    /// Relative file path inside the package (starts with `./`).
    Target(String),
    /// Descriptor has no exports map; legacy filesystem resolution applies.
    NoExportsMap,
    /// Descriptor has a map but nothing matched.
    NotFound,
}

/// Evaluate a descriptor for `relative` (`"."`, `"./sub"`, or `"#name"`).
///
/// Private names go through the `imports` map; everything else through
/// `exports`. The `"."` main-field fallback is the caller's concern.
#[must_use]
pub fn resolve_package_target(descriptor: &Value, relative: &str) -> PackageTargetMatch {
    if relative.starts_with('#') {
        return match resolve_imports_target(descriptor, relative) {
            Some(target) => PackageTargetMatch::Target(target),
            None => PackageTargetMatch::NotFound,
        };
    }

    let Some(exports) = descriptor.get("exports") else {
        return PackageTargetMatch::NoExportsMap;
    };

    match resolve_entry(exports, relative) {
        Some(target) => PackageTargetMatch::Target(target),
        None => PackageTargetMatch::NotFound,
    }
}

/// Resolve a `#`-prefixed private name through the `imports` map.
#[must_use]
pub fn resolve_imports_target(descriptor: &Value, name: &str) -> Option<String> {
    if !name.starts_with('#') {
        return None;
    }
    let imports = descriptor.get("imports")?.as_object()?;
    let target = imports.get(name)?;
    resolve_conditions_or_string(target)
}

/// Evaluate one exports-map node against a relative module name.
fn resolve_entry(value: &Value, relative: &str) -> Option<String> {
    match value {
        Value::String(target) => validate_target(target),
        Value::Array(targets) => targets.first().and_then(|v| resolve_entry(v, relative)),
        Value::Object(map) => {
            // Conditions first.
            for condition in CONDITIONS {
                if let Some(next) = map.get(condition) {
                    return resolve_entry(next, relative);
                }
            }

            // Exact subpath key.
            if let Some(next) = map.get(relative) {
                return resolve_conditions_or_string(next);
            }

            // Wildcard keys; most specific (longest) pattern wins.
            let mut matches: Vec<(&str, &Value, String)> = Vec::new();
            for (key, next) in map {
                if key.chars().filter(|&c| c == '*').count() != 1 {
                    continue;
                }
                if let Some(capture) = match_pattern(key, relative) {
                    matches.push((key.as_str(), next, capture));
                }
            }
            matches.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

            let (_, next, capture) = matches.first()?;
            let target = resolve_conditions_or_string(next)?;
            substitute_star(&target, capture)
        }
        _ => None,
    }
}

/// Resolve a matched key's value: string target or conditions object.
fn resolve_conditions_or_string(value: &Value) -> Option<String> {
    match value {
        Value::String(target) => validate_target(target),
        Value::Array(targets) => targets.first().and_then(resolve_conditions_or_string),
        Value::Object(map) => {
            for condition in CONDITIONS {
                if let Some(next) = map.get(condition) {
                    return resolve_conditions_or_string(next);
                }
            }
            None
        }
        _ => None,
    }
}

/// Match a single-`*` pattern key against a relative name, returning the
/// capture. `"./features/*"` against `"./features/foo"` captures `"foo"`.
fn match_pattern(pattern: &str, relative: &str) -> Option<String> {
    let star = pattern.find('*')?;
    let prefix = &pattern[..star];
    let suffix = &pattern[star + 1..];

    if !relative.starts_with(prefix) {
        return None;
    }
    if !suffix.is_empty() && !relative.ends_with(suffix) {
        return None;
    }

    let start = prefix.len();
    let end = relative.len() - suffix.len();
    if start > end {
        return None;
    }

    let capture = &relative[start..end];
    if capture.is_empty() {
        return None;
    }
    Some(capture.to_string())
}

/// Substitute the capture into the target's `*` placeholder, rejecting
/// traversal and non-relative results.
fn substitute_star(target: &str, capture: &str) -> Option<String> {
    if target.chars().filter(|&c| c == '*').count() != 1 {
        return None;
    }

    let result = target.replace('*', capture);
    if !result.starts_with("./") {
        return None;
    }
    if result.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(result)
}

/// Targets must be relative paths starting with `./`.
fn validate_target(target: &str) -> Option<String> {
    target.starts_with("./").then(|| target.to_string())
}
