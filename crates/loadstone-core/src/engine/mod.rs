//! The require engine.
//!
//! Ties the resolver, cache, transform pipeline, and injected collaborators
//! together behind `require` / `requireAsync` entry points. The engine is
//! single-threaded by design: state lives behind `Rc`/`RefCell`, futures are
//! `!Send`, and re-entrancy (a factory requiring more modules while its own
//! evaluation is on the stack) is the normal case, not an exception.

mod invalidate;

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::builtins::{HostBridge, NullHostBridge, BUILTIN_LIST_ID, HOST_INSTANCE_ID};
use crate::cache::{EntryState, ModuleCache};
use crate::capability::{FsCapability, UrlFetcher};
use crate::config::LoaderConfig;
use crate::error::Error;
use crate::evaluate::{Evaluator, PassthroughTranspiler, Transpiler};
use crate::options::{CacheInvalidationMode, RequireOptions};
use crate::resolver::{self, split_query, ResolvedType};
use crate::scan::{scan_require_calls, ScannedRequire};
use crate::value::ModuleValue;

/// Collaborators and configuration handed to [`RequireEngine::new`].
pub struct EngineOptions {
    pub config: LoaderConfig,
    pub fs: Rc<dyn FsCapability>,
    pub evaluator: Rc<dyn Evaluator>,
    pub transpiler: Rc<dyn Transpiler>,
    pub fetcher: Option<Rc<dyn UrlFetcher>>,
    pub bridge: Rc<dyn HostBridge>,
}

impl EngineOptions {
    #[must_use]
    pub fn new(config: LoaderConfig, fs: Rc<dyn FsCapability>, evaluator: Rc<dyn Evaluator>) -> Self {
        Self {
            config,
            fs,
            evaluator,
            transpiler: Rc::new(PassthroughTranspiler),
            fetcher: None,
            bridge: Rc::new(NullHostBridge),
        }
    }

    #[must_use]
    pub fn transpiler(mut self, transpiler: Rc<dyn Transpiler>) -> Self {
        self.transpiler = transpiler;
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Rc<dyn UrlFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn bridge(mut self, bridge: Rc<dyn HostBridge>) -> Self {
        self.bridge = bridge;
        self
    }
}

pub(crate) struct EngineInner {
    pub(crate) config: LoaderConfig,
    pub(crate) fs: Rc<dyn FsCapability>,
    pub(crate) fetcher: Option<Rc<dyn UrlFetcher>>,
    pub(crate) transpiler: Rc<dyn Transpiler>,
    pub(crate) evaluator: Rc<dyn Evaluator>,
    pub(crate) bridge: Rc<dyn HostBridge>,
    pub(crate) cache: ModuleCache,
    /// Path of the module whose code is currently executing; the implicit
    /// parent for requires that do not name one.
    pub(crate) active_source: RefCell<Option<String>>,
    pass_depth: Cell<u32>,
    /// Paths validated during the current root pass.
    pub(crate) in_chain: RefCell<HashSet<String>>,
}

/// The module-loading engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RequireEngine {
    inner: Rc<EngineInner>,
}

impl RequireEngine {
    /// Build an engine and seed the protected host entries.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        let cache = ModuleCache::new(options.config.protected_prefix.clone());
        let engine = Self {
            inner: Rc::new(EngineInner {
                config: options.config,
                fs: options.fs,
                fetcher: options.fetcher,
                transpiler: options.transpiler,
                evaluator: options.evaluator,
                bridge: options.bridge,
                cache,
                active_source: RefCell::new(None),
                pass_depth: Cell::new(0),
                in_chain: RefCell::new(HashSet::new()),
            }),
        };

        let inner = &engine.inner;
        inner.cache.store(HOST_INSTANCE_ID, inner.bridge.host_instance());
        inner.cache.protect(HOST_INSTANCE_ID);
        let names = inner.bridge.builtin_names();
        inner
            .cache
            .store(BUILTIN_LIST_ID, ModuleValue::json(serde_json::Value::from(names)));
        inner.cache.protect(BUILTIN_LIST_ID);
        engine
    }

    /// Synchronous require with default options.
    pub fn require(&self, id: &str) -> Result<ModuleValue, Error> {
        self.require_with(id, &RequireOptions::default())
    }

    /// Synchronous require.
    ///
    /// Fails when the id resolves to an uncached URL, or when the platform
    /// lacks synchronous I/O and a miss or stale entry forces a re-read.
    pub fn require_with(&self, id: &str, options: &RequireOptions) -> Result<ModuleValue, Error> {
        let mode = options
            .cache_invalidation_mode
            .unwrap_or(self.inner.config.default_invalidation_mode);
        let parent = options
            .parent_path
            .clone()
            .or_else(|| self.inner.active_source.borrow().clone());
        let _pass = PassGuard::enter(&self.inner);
        self.require_scoped_sync(id, mode, parent.as_deref())
    }

    /// Asynchronous require with default options.
    pub async fn require_async(&self, id: &str) -> Result<ModuleValue, Error> {
        self.require_with_async(id, &RequireOptions::default()).await
    }

    /// Asynchronous require. Supports all resolved types, URLs included.
    pub async fn require_with_async(
        &self,
        id: &str,
        options: &RequireOptions,
    ) -> Result<ModuleValue, Error> {
        let mode = options
            .cache_invalidation_mode
            .unwrap_or(self.inner.config.default_invalidation_mode);
        let parent = options
            .parent_path
            .clone()
            .or_else(|| self.inner.active_source.borrow().clone());
        let _pass = PassGuard::enter(&self.inner);
        self.require_scoped_async(id, mode, parent.as_deref()).await
    }

    /// Load already-in-hand source text as a module, bypassing resolution.
    ///
    /// `url_suffix`, when present, additionally aliases the result under
    /// `<path>?<suffix>` so repeated loads of the same parameterized snippet
    /// short-circuit.
    pub async fn require_string_async(
        &self,
        content: &str,
        path: &str,
        url_suffix: Option<&str>,
    ) -> Result<ModuleValue, Error> {
        let _pass = PassGuard::enter(&self.inner);
        let mode = self.inner.config.default_invalidation_mode;
        let value = self.evaluate_text_async(content, path, mode).await?;
        if let Some(suffix) = url_suffix {
            self.inner.cache.store(&format!("{path}?{suffix}"), value.clone());
        }
        Ok(value)
    }

    /// Two-phase deferred-resolution wrapper.
    ///
    /// Scans `source` for literal `require(...)` calls, pre-resolves each one
    /// asynchronously to prime the cache, then invokes `body` synchronously
    /// with a require handle that forces `Never` invalidation (priming just
    /// happened; repeating a timestamp check mid-call is neither needed nor
    /// safe). Dynamic arguments are skipped with a warning.
    pub async fn require_async_wrapper<T>(
        &self,
        source: &str,
        parent: Option<&str>,
        body: impl FnOnce(&PrimedRequire) -> Result<T, Error>,
    ) -> Result<T, Error> {
        for call in scan_require_calls(source) {
            match call {
                ScannedRequire::Literal { spec, options } => {
                    let mut options = options.unwrap_or_default();
                    if options.parent_path.is_none() {
                        options.parent_path = parent.map(str::to_string);
                    }
                    self.require_with_async(&spec, &options).await?;
                }
                ScannedRequire::Dynamic { argument } => {
                    warn!(%argument, "dynamic require argument cannot be pre-resolved, skipping");
                }
            }
        }
        let primed = PrimedRequire {
            engine: self.clone(),
            parent: parent.map(str::to_string),
        };
        body(&primed)
    }

    /// Evict everything outside the protected host namespace.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Tear the engine down: evict everything, protected entries included.
    pub fn uninstall(&self) {
        self.inner.cache.clear_all();
        self.inner.active_source.replace(None);
    }

    /// Set the implicit parent for requires that do not name one.
    pub fn set_active_source(&self, path: impl Into<String>) {
        self.inner.active_source.replace(Some(path.into()));
    }

    pub fn clear_active_source(&self) {
        self.inner.active_source.replace(None);
    }

    #[must_use]
    pub fn cache(&self) -> &ModuleCache {
        &self.inner.cache
    }

    fn require_scoped_sync(
        &self,
        id: &str,
        mode: CacheInvalidationMode,
        parent: Option<&str>,
    ) -> Result<ModuleValue, Error> {
        if let Some(value) = self.special_module(id) {
            return Ok(value);
        }

        let resolved = resolver::resolve(&self.inner.config, id, parent);
        debug!(id, resolved = %resolved.id.escape_debug(), kind = ?resolved.kind, "resolved identifier");
        match resolved.kind {
            ResolvedType::Url => self.require_url_sync(&resolved.id, mode),
            ResolvedType::Path => {
                if let Some(value) = self.cached_by_policy(&resolved.id, mode, true) {
                    return Ok(value);
                }
                let (clean, _) = split_query(&resolved.id);
                let path = self.find_file_sync(clean)?;
                let value = self.load_path_sync(&path, mode)?;
                self.alias(&resolved.id, &path, &value);
                Ok(value)
            }
            ResolvedType::Module => {
                if let Some(value) = self.cached_by_policy(&resolved.id, mode, true) {
                    return Ok(value);
                }
                let (parent_dir, name) = resolver::split_module_id(&resolved.id)
                    .ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
                let path = resolver::resolve_package_path_sync(
                    &self.inner.config,
                    self.inner.fs.as_ref(),
                    parent_dir,
                    name,
                )?;
                let value = self.load_path_sync(&path, mode)?;
                self.alias(&resolved.id, &path, &value);
                Ok(value)
            }
        }
    }

    async fn require_scoped_async(
        &self,
        id: &str,
        mode: CacheInvalidationMode,
        parent: Option<&str>,
    ) -> Result<ModuleValue, Error> {
        if let Some(value) = self.special_module(id) {
            return Ok(value);
        }

        let resolved = resolver::resolve(&self.inner.config, id, parent);
        debug!(id, resolved = %resolved.id.escape_debug(), kind = ?resolved.kind, "resolved identifier");
        match resolved.kind {
            ResolvedType::Url => self.require_url_async(&resolved.id, mode).await,
            ResolvedType::Path => {
                if let Some(value) = self.cached_by_policy(&resolved.id, mode, false) {
                    return Ok(value);
                }
                let (clean, _) = split_query(&resolved.id);
                let path = self.find_file_async(clean).await?;
                let value = self.load_path_async(&path, mode).await?;
                self.alias(&resolved.id, &path, &value);
                Ok(value)
            }
            ResolvedType::Module => {
                if let Some(value) = self.cached_by_policy(&resolved.id, mode, false) {
                    return Ok(value);
                }
                let (parent_dir, name) = resolver::split_module_id(&resolved.id)
                    .ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
                let path = resolver::resolve_package_path_async(
                    &self.inner.config,
                    self.inner.fs.as_ref(),
                    parent_dir,
                    name,
                )
                .await?;
                let value = self.load_path_async(&path, mode).await?;
                self.alias(&resolved.id, &path, &value);
                Ok(value)
            }
        }
    }

    /// Host instance, builtin list, and builtins bypass the pipeline.
    fn special_module(&self, id: &str) -> Option<ModuleValue> {
        let (clean, _) = split_query(id);
        if clean.starts_with(&self.inner.config.protected_prefix) {
            return self.inner.cache.get_cached(clean);
        }
        if self.inner.bridge.builtin_names().iter().any(|n| n == clean) {
            if let Some(value) = self.inner.cache.get_cached(clean) {
                return Some(value);
            }
            if let Some(value) = self.inner.bridge.load_builtin(clean) {
                self.inner.cache.store(clean, value.clone());
                self.inner.cache.protect(clean);
                return Some(value);
            }
        }
        None
    }

    pub(crate) fn is_special_id(&self, id: &str) -> bool {
        let (clean, _) = split_query(id);
        clean.starts_with(&self.inner.config.protected_prefix)
            || self.inner.bridge.builtin_names().iter().any(|n| n == clean)
    }

    /// Cache-hit policy for a lookup by the query-included resolved id.
    fn cached_by_policy(
        &self,
        cache_id: &str,
        mode: CacheInvalidationMode,
        sync_path: bool,
    ) -> Option<ModuleValue> {
        match self.inner.cache.entry_state(cache_id)? {
            EntryState::InFlight(placeholder) => {
                warn!(id = %cache_id.escape_debug(), "circular dependency, returning in-flight exports");
                Some(placeholder)
            }
            EntryState::Loaded(value) => {
                let (clean, query) = split_query(cache_id);
                if self.inner.in_chain.borrow().contains(clean) {
                    return Some(value);
                }
                match mode {
                    CacheInvalidationMode::Never => Some(value),
                    CacheInvalidationMode::WhenPossible if query.is_some() => Some(value),
                    CacheInvalidationMode::WhenPossible
                        if sync_path && !self.inner.fs.supports_sync_io() =>
                    {
                        warn!(
                            id = %cache_id.escape_debug(),
                            "cannot revalidate without synchronous file access, returning cached"
                        );
                        Some(value)
                    }
                    _ => None,
                }
            }
        }
    }

    fn require_url_sync(&self, url: &str, mode: CacheInvalidationMode) -> Result<ModuleValue, Error> {
        match self.inner.cache.entry_state(url) {
            Some(EntryState::InFlight(placeholder)) => {
                warn!(id = url, "circular dependency, returning in-flight exports");
                Ok(placeholder)
            }
            Some(EntryState::Loaded(value)) => match mode {
                CacheInvalidationMode::Never => Ok(value),
                CacheInvalidationMode::WhenPossible => {
                    warn!(id = url, "URL staleness is unverifiable synchronously, returning cached");
                    Ok(value)
                }
                CacheInvalidationMode::Always => {
                    Err(Error::UrlStalenessUnverifiable(url.to_string()))
                }
            },
            None => Err(Error::SyncUrlRequire(url.to_string())),
        }
    }

    async fn require_url_async(
        &self,
        url: &str,
        mode: CacheInvalidationMode,
    ) -> Result<ModuleValue, Error> {
        match self.inner.cache.entry_state(url) {
            Some(EntryState::InFlight(placeholder)) => {
                warn!(id = url, "circular dependency, returning in-flight exports");
                return Ok(placeholder);
            }
            Some(EntryState::Loaded(value)) => {
                if mode == CacheInvalidationMode::Never {
                    return Ok(value);
                }
                // URLs have no timestamp to compare; anything but `Never`
                // refetches.
            }
            None => {}
        }

        let fetcher = self
            .inner
            .fetcher
            .clone()
            .ok_or_else(|| Error::other(format!("no URL fetcher installed, cannot load '{url}'")))?;
        let content = fetcher.fetch(url).await?;
        self.evaluate_text_async(&content, url, mode).await
    }

    fn find_file_sync(&self, clean: &str) -> Result<String, Error> {
        resolver::find_existing_file_sync(self.inner.fs.as_ref(), clean)?
            .ok_or_else(|| Error::FileNotFound(clean.to_string()))
    }

    async fn find_file_async(&self, clean: &str) -> Result<String, Error> {
        resolver::find_existing_file_async(self.inner.fs.as_ref(), clean)
            .await?
            .ok_or_else(|| Error::FileNotFound(clean.to_string()))
    }

    /// Alias the requested id onto the loaded value when they differ.
    fn alias(&self, requested: &str, path: &str, value: &ModuleValue) {
        if requested != path {
            self.inner.cache.store(requested, value.clone());
        }
    }
}

/// Depth-counted guard for one root require pass.
///
/// The in-chain marker set survives nested requires within the pass and is
/// cleared when the outermost guard drops, errors included.
struct PassGuard<'a> {
    inner: &'a EngineInner,
}

impl<'a> PassGuard<'a> {
    fn enter(inner: &'a EngineInner) -> Self {
        inner.pass_depth.set(inner.pass_depth.get() + 1);
        Self { inner }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        let depth = self.inner.pass_depth.get().saturating_sub(1);
        self.inner.pass_depth.set(depth);
        if depth == 0 {
            self.inner.in_chain.borrow_mut().clear();
        }
    }
}

/// Require handle passed to a deferred-resolution body after priming.
pub struct PrimedRequire {
    engine: RequireEngine,
    parent: Option<String>,
}

impl PrimedRequire {
    /// Synchronous require against the just-primed cache.
    pub fn require(&self, id: &str) -> Result<ModuleValue, Error> {
        let options = RequireOptions {
            cache_invalidation_mode: Some(CacheInvalidationMode::Never),
            parent_path: self.parent.clone(),
        };
        self.engine.require_with(id, &options)
    }
}

/// Per-evaluation environment handed to a [`crate::evaluate::ModuleFactory`].
///
/// Carries the child-require bound to this module (which records dependency
/// edges and inherits the chain's invalidation mode), the mutable exports
/// object, and the module's captured source text for the deferred-resolution
/// wrapper.
pub struct FactoryContext {
    engine: RequireEngine,
    module_path: String,
    mode: CacheInvalidationMode,
    exports: ModuleValue,
    source: String,
}

impl FactoryContext {
    pub(crate) fn new(
        engine: RequireEngine,
        module_path: &str,
        mode: CacheInvalidationMode,
        source: &str,
    ) -> Self {
        Self {
            engine,
            module_path: module_path.to_string(),
            mode,
            exports: ModuleValue::object(),
            source: source.to_string(),
        }
    }

    /// Child require: records a dependency edge and resolves relative to
    /// this module.
    pub fn require(&self, id: &str) -> Result<ModuleValue, Error> {
        self.require_opts(id, &RequireOptions::default())
    }

    pub fn require_opts(&self, id: &str, options: &RequireOptions) -> Result<ModuleValue, Error> {
        self.engine
            .inner
            .cache
            .record_dependency(&self.module_path, id);
        let options = self.child_options(options);
        self.engine.require_with(id, &options)
    }

    pub fn require_async<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<ModuleValue, Error>> {
        self.require_async_opts(id, RequireOptions::default())
    }

    pub fn require_async_opts<'a>(
        &'a self,
        id: &'a str,
        options: RequireOptions,
    ) -> LocalBoxFuture<'a, Result<ModuleValue, Error>> {
        self.engine
            .inner
            .cache
            .record_dependency(&self.module_path, id);
        let options = self.child_options(&options);
        Box::pin(async move { self.engine.require_with_async(id, &options).await })
    }

    /// Deferred-resolution wrapper over this module's own source text.
    ///
    /// Literal requires found in the source are recorded as dependency edges
    /// before priming, so they participate in staleness checks like direct
    /// calls do.
    pub fn require_async_wrapper<'a, T: 'a>(
        &'a self,
        body: impl FnOnce(&PrimedRequire) -> Result<T, Error> + 'a,
    ) -> LocalBoxFuture<'a, Result<T, Error>> {
        Box::pin(async move {
            for call in scan_require_calls(&self.source) {
                if let ScannedRequire::Literal { spec, .. } = call {
                    self.engine
                        .inner
                        .cache
                        .record_dependency(&self.module_path, &spec);
                }
            }
            self.engine
                .require_async_wrapper(&self.source, Some(&self.module_path), body)
                .await
        })
    }

    /// The mutable exports object for this evaluation.
    #[must_use]
    pub fn exports(&self) -> ModuleValue {
        self.exports.clone()
    }

    pub fn set_export(&self, key: impl Into<String>, value: ModuleValue) -> bool {
        self.exports.set(key, value)
    }

    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    #[must_use]
    pub fn mode(&self) -> CacheInvalidationMode {
        self.mode
    }

    /// Source text of the module being evaluated.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    fn child_options(&self, options: &RequireOptions) -> RequireOptions {
        RequireOptions {
            cache_invalidation_mode: Some(
                options.cache_invalidation_mode.unwrap_or(self.mode),
            ),
            parent_path: Some(
                options
                    .parent_path
                    .clone()
                    .unwrap_or_else(|| self.module_path.clone()),
            ),
        }
    }
}
