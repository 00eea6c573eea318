//! Module cache, dependency graph, and timestamp table.
//!
//! One [`ModuleRecord`] per resolved module identifier. While a factory runs
//! the record holds a [`PendingHandle`] placeholder with `loaded = false`;
//! re-entrant lookups during that window see the placeholder, which is how
//! circular requires are detected. The dependency edge set is rebuilt from
//! scratch on every (re-)evaluation and is consumed only by the staleness
//! pass, never for execution ordering.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::value::{ModuleValue, PendingHandle};

struct ModuleRecord {
    exports: ModuleValue,
    loaded: bool,
    pending: Option<PendingHandle>,
}

/// Cache lookup outcome for an existing record.
pub enum EntryState {
    /// Evaluation finished; the value is the final exports.
    Loaded(ModuleValue),
    /// Evaluation in progress; the value is the placeholder.
    InFlight(ModuleValue),
}

/// Process-scoped module cache. Interior-mutable; the engine is
/// single-threaded so plain `RefCell` suffices.
pub struct ModuleCache {
    records: RefCell<HashMap<String, ModuleRecord>>,
    deps: RefCell<HashMap<String, Vec<String>>>,
    timestamps: RefCell<HashMap<String, u64>>,
    protected: RefCell<HashSet<String>>,
    protected_prefix: String,
}

impl ModuleCache {
    #[must_use]
    pub fn new(protected_prefix: impl Into<String>) -> Self {
        Self {
            records: RefCell::new(HashMap::new()),
            deps: RefCell::new(HashMap::new()),
            timestamps: RefCell::new(HashMap::new()),
            protected: RefCell::new(HashSet::new()),
            protected_prefix: protected_prefix.into(),
        }
    }

    /// Exports of `id`, only if evaluation has completed.
    #[must_use]
    pub fn get_cached(&self, id: &str) -> Option<ModuleValue> {
        let records = self.records.borrow();
        let record = records.get(id)?;
        record.loaded.then(|| record.exports.clone())
    }

    #[must_use]
    pub fn entry_state(&self, id: &str) -> Option<EntryState> {
        let records = self.records.borrow();
        let record = records.get(id)?;
        if record.loaded {
            Some(EntryState::Loaded(record.exports.clone()))
        } else {
            Some(EntryState::InFlight(record.exports.clone()))
        }
    }

    /// Install a fresh placeholder for `id` and return its handle.
    ///
    /// Replaces a loaded record or creates a missing one. An in-flight record
    /// keeps its existing placeholder (reentrancy is the caller's circular
    /// case, not a new evaluation).
    pub fn begin_evaluation(&self, id: &str) -> PendingHandle {
        let mut records = self.records.borrow_mut();
        if let Some(record) = records.get(id) {
            if !record.loaded {
                if let Some(handle) = &record.pending {
                    return handle.clone();
                }
            }
        }
        let handle = PendingHandle::new();
        records.insert(
            id.to_string(),
            ModuleRecord {
                exports: ModuleValue::Pending(handle.clone()),
                loaded: false,
                pending: Some(handle.clone()),
            },
        );
        handle
    }

    /// Store the final exports for `id` and resolve its placeholder.
    ///
    /// If the committed value is the record's own placeholder (a factory that
    /// returned `module.exports` untouched), the record is left pointing at
    /// the placeholder's eventual resolution rather than overwritten with a
    /// self-reference.
    pub fn commit(&self, id: &str, exports: ModuleValue) {
        let mut records = self.records.borrow_mut();
        let record = records.entry(id.to_string()).or_insert_with(|| ModuleRecord {
            exports: ModuleValue::object(),
            loaded: false,
            pending: None,
        });
        let own_placeholder = match (&exports, &record.pending) {
            (ModuleValue::Pending(handle), Some(pending)) => handle.ptr_eq(pending),
            _ => false,
        };
        if !own_placeholder {
            if let Some(pending) = record.pending.take() {
                pending.resolve(exports.clone());
            }
            record.exports = exports;
        }
        record.loaded = true;
    }

    /// Store an already-final value (JSON modules, aliases, builtins).
    pub fn store(&self, id: &str, exports: ModuleValue) {
        self.records.borrow_mut().insert(
            id.to_string(),
            ModuleRecord {
                exports,
                loaded: true,
                pending: None,
            },
        );
    }

    /// Mark `id` as never evicted by [`ModuleCache::clear`].
    pub fn protect(&self, id: &str) {
        self.protected.borrow_mut().insert(id.to_string());
    }

    /// Delete the record for `id` entirely.
    pub fn invalidate(&self, id: &str) {
        self.records.borrow_mut().remove(id);
        self.deps.borrow_mut().remove(id);
        self.timestamps.borrow_mut().remove(id);
    }

    /// Evict everything outside the protected host namespace.
    pub fn clear(&self) {
        let protected = self.protected.borrow();
        self.records
            .borrow_mut()
            .retain(|id, _| id.starts_with(&self.protected_prefix) || protected.contains(id));
        self.deps.borrow_mut().clear();
        self.timestamps.borrow_mut().clear();
    }

    /// Evict everything, protected entries included (engine teardown).
    pub fn clear_all(&self) {
        self.records.borrow_mut().clear();
        self.deps.borrow_mut().clear();
        self.timestamps.borrow_mut().clear();
        self.protected.borrow_mut().clear();
    }

    /// Forget recorded edges for `parent` ahead of a re-evaluation.
    pub fn reset_dependencies(&self, parent: &str) {
        self.deps.borrow_mut().remove(parent);
    }

    /// Record that `parent` required `raw` during its current evaluation.
    pub fn record_dependency(&self, parent: &str, raw: &str) {
        let mut deps = self.deps.borrow_mut();
        let edges = deps.entry(parent.to_string()).or_default();
        if !edges.iter().any(|existing| existing == raw) {
            edges.push(raw.to_string());
        }
    }

    /// Raw identifiers `parent` required, in declaration order.
    #[must_use]
    pub fn dependencies(&self, parent: &str) -> Vec<String> {
        self.deps.borrow().get(parent).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn timestamp(&self, path: &str) -> Option<u64> {
        self.timestamps.borrow().get(path).copied()
    }

    pub fn set_timestamp(&self, path: &str, timestamp: u64) {
        self.timestamps
            .borrow_mut()
            .insert(path.to_string(), timestamp);
    }
}
