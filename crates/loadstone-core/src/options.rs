//! Per-call require options.

use serde::{Deserialize, Serialize};

/// Policy controlling whether a cached module is trusted, revalidated, or
/// unconditionally reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheInvalidationMode {
    /// Trust a cache hit as-is.
    Never,
    /// Revalidate via timestamp comparison where the platform allows it.
    #[default]
    WhenPossible,
    /// Revalidate unconditionally; an unverifiable dependency is an error
    /// on the synchronous path.
    Always,
}

impl CacheInvalidationMode {
    /// Parse the camelCase name used in script-facing option literals.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "never" => Some(Self::Never),
            "whenPossible" => Some(Self::WhenPossible),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// Options accepted by `require` and `requireAsync`.
///
/// Both fields are optional: an unset invalidation mode inherits the mode of
/// the evaluation chain that triggered the call (or the engine default at the
/// root), and an unset parent path falls back to the engine's active source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequireOptions {
    pub cache_invalidation_mode: Option<CacheInvalidationMode>,
    pub parent_path: Option<String>,
}

impl RequireOptions {
    #[must_use]
    pub fn with_mode(mode: CacheInvalidationMode) -> Self {
        Self {
            cache_invalidation_mode: Some(mode),
            parent_path: None,
        }
    }

    #[must_use]
    pub fn with_parent(parent: impl Into<String>) -> Self {
        Self {
            cache_invalidation_mode: None,
            parent_path: Some(parent.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_name() {
        assert_eq!(
            CacheInvalidationMode::from_name("never"),
            Some(CacheInvalidationMode::Never)
        );
        assert_eq!(
            CacheInvalidationMode::from_name("whenPossible"),
            Some(CacheInvalidationMode::WhenPossible)
        );
        assert_eq!(
            CacheInvalidationMode::from_name("always"),
            Some(CacheInvalidationMode::Always)
        );
        assert_eq!(CacheInvalidationMode::from_name("sometimes"), None);
    }

    #[test]
    fn test_mode_serde_camel_case() {
        let json = serde_json::to_string(&CacheInvalidationMode::WhenPossible).unwrap();
        assert_eq!(json, "\"whenPossible\"");
    }
}
