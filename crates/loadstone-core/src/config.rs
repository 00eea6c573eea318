//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::options::CacheInvalidationMode;

/// Process-wide root configuration for the require engine.
///
/// All paths use forward slashes; the identifier resolver normalizes
/// backslashes before consulting any of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Storage root that `//`-prefixed identifiers resolve against.
    pub vault_root: String,
    /// Root that single-`/`-prefixed identifiers resolve against, and the
    /// second candidate root for package resolution.
    pub modules_root: String,
    /// Absolute directory that `~/`-prefixed identifiers resolve against.
    pub home_dir: String,
    /// Host-specific local-resource URL prefix that reclassifies as a path
    /// (e.g. `app://local/` on Electron hosts).
    pub local_resource_prefix: Option<String>,
    /// Prefix for the logical source URLs patched into generated source maps.
    pub logical_url_prefix: String,
    /// Cache-id namespace that `clear` must never evict.
    pub protected_prefix: String,
    /// Mode applied when a root call does not specify one.
    pub default_invalidation_mode: CacheInvalidationMode,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            vault_root: "/".to_string(),
            modules_root: "/".to_string(),
            home_dir: default_home_dir(),
            local_resource_prefix: None,
            logical_url_prefix: "app://host/".to_string(),
            protected_prefix: "host:".to_string(),
            default_invalidation_mode: CacheInvalidationMode::default(),
        }
    }
}

fn default_home_dir() -> String {
    dirs_next::home_dir()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roots() {
        let config = LoaderConfig::default();
        assert_eq!(config.vault_root, "/");
        assert_eq!(config.modules_root, "/");
        assert_eq!(
            config.default_invalidation_mode,
            CacheInvalidationMode::WhenPossible
        );
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"modulesRoot":"/vault/scripts"}"#).unwrap();
        assert_eq!(config.modules_root, "/vault/scripts");
        assert_eq!(config.protected_prefix, "host:");
    }
}
