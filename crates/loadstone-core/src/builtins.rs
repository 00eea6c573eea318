//! Host application bridge.
//!
//! A handful of module ids bypass resolution entirely: the host application
//! instance, the list of builtin module names, and the builtins themselves
//! (host API shims and whitelisted platform modules). The engine seeds the
//! first two into the cache at construction under the protected namespace and
//! loads builtins through the bridge on first require.

use crate::value::ModuleValue;

/// Cache id under which the host application instance is stored.
pub const HOST_INSTANCE_ID: &str = "host:app";

/// Cache id under which the builtin name list is stored.
pub const BUILTIN_LIST_ID: &str = "host:builtin-modules";

/// Trusted loader for host-provided modules.
pub trait HostBridge {
    /// The host application instance exposed to scripts.
    fn host_instance(&self) -> ModuleValue;

    /// Names of builtin modules this host provides.
    fn builtin_names(&self) -> Vec<String>;

    /// Load one builtin by name. `None` when the name is not a builtin.
    fn load_builtin(&self, name: &str) -> Option<ModuleValue>;
}

/// Bridge for hosts (and tests) with no builtin surface.
pub struct NullHostBridge;

impl HostBridge for NullHostBridge {
    fn host_instance(&self) -> ModuleValue {
        ModuleValue::object()
    }

    fn builtin_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn load_builtin(&self, _name: &str) -> Option<ModuleValue> {
        None
    }
}
