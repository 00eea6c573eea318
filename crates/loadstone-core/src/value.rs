//! Exports value model for loaded modules.
//!
//! A module's exports is one of a small set of shapes: parsed JSON, a mutable
//! string-keyed object the factory populates, an opaque host value, or a
//! pending handle standing in for a module whose factory is still running.
//! The pending handle is the explicit replacement for a lazily-forwarding
//! proxy: property access through it yields nothing until the owning cache
//! slot commits, after which it forwards to the final exports.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Value produced by evaluating a module.
///
/// Cloning is cheap: every variant is reference-counted, and clones share
/// identity (observable through [`ModuleValue::ptr_eq`]).
#[derive(Clone)]
pub enum ModuleValue {
    /// Immutable parsed JSON (`.json` modules, builtin descriptors).
    Json(Rc<serde_json::Value>),
    /// Mutable exports object, CommonJS `module.exports` style.
    Object(Rc<RefCell<BTreeMap<String, ModuleValue>>>),
    /// Opaque host-provided value (the host application instance, builtins).
    Host(Rc<dyn Any>),
    /// Placeholder for a module currently being evaluated.
    Pending(PendingHandle),
}

impl ModuleValue {
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(Rc::new(value))
    }

    /// Create an empty mutable exports object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    #[must_use]
    pub fn host<T: Any>(value: T) -> Self {
        Self::Host(Rc::new(value))
    }

    /// Look up a named property.
    ///
    /// Pending handles forward to the final exports once the module has
    /// loaded and return `None` before that.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ModuleValue> {
        match self {
            Self::Json(value) => value.get(key).cloned().map(ModuleValue::json),
            Self::Object(map) => map.borrow().get(key).cloned(),
            Self::Host(_) => None,
            Self::Pending(handle) => handle.get(key),
        }
    }

    /// Set a named property. Returns false for non-`Object` values.
    pub fn set(&self, key: impl Into<String>, value: ModuleValue) -> bool {
        match self {
            Self::Object(map) => {
                map.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn downcast_host<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            Self::Host(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Identity comparison: true when both values share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Host(a), Self::Host(b)) => Rc::ptr_eq(a, b),
            (Self::Pending(a), Self::Pending(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for ModuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Object(map) => f.debug_tuple("Object").field(&map.borrow().len()).finish(),
            Self::Host(_) => f.write_str("Host(..)"),
            Self::Pending(handle) => f
                .debug_tuple("Pending")
                .field(&handle.loaded())
                .finish(),
        }
    }
}

/// Handle installed in a cache slot while the module's factory runs.
#[derive(Clone)]
pub struct PendingHandle {
    state: Rc<RefCell<PendingState>>,
}

#[derive(Default)]
struct PendingState {
    resolved: Option<ModuleValue>,
}

impl PendingHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(PendingState::default())),
        }
    }

    pub(crate) fn resolve(&self, value: ModuleValue) {
        self.state.borrow_mut().resolved = Some(value);
    }

    /// Whether the owning module has finished loading.
    #[must_use]
    pub fn loaded(&self) -> bool {
        self.state.borrow().resolved.is_some()
    }

    /// Final exports of the owning module, once loaded.
    #[must_use]
    pub fn resolved(&self) -> Option<ModuleValue> {
        self.state.borrow().resolved.clone()
    }

    /// Deferred property access: forwards once loaded, `None` before.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ModuleValue> {
        self.resolved().and_then(|value| value.get(key))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}
