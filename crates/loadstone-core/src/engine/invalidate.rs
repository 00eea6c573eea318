//! Staleness checking and module evaluation.
//!
//! `check_path_*` is the recursive revalidation pass: it walks the recorded
//! dependency edges, reloads anything whose newest observed timestamp exceeds
//! the one recorded at load time, and returns the effective timestamp so
//! parents can compare against their own. `evaluate_text_*` runs the transform
//! pipeline and the module factory, committing the result to the cache.

use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::cache::EntryState;
use crate::error::Error;
use crate::options::CacheInvalidationMode;
use crate::resolver::{self, split_query, ResolvedType};
use crate::transform;
use crate::value::ModuleValue;

use super::{FactoryContext, RequireEngine};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn is_json_path(path: &str) -> bool {
    path.ends_with(".json")
}

impl RequireEngine {
    /// Load a resolved file path on the synchronous path, honoring `mode`.
    pub(crate) fn load_path_sync(
        &self,
        path: &str,
        mode: CacheInvalidationMode,
    ) -> Result<ModuleValue, Error> {
        match self.inner.cache.entry_state(path) {
            Some(EntryState::InFlight(placeholder)) => {
                warn!(path, "circular dependency, returning in-flight exports");
                return Ok(placeholder);
            }
            Some(EntryState::Loaded(cached)) => {
                if self.inner.in_chain.borrow().contains(path)
                    || mode == CacheInvalidationMode::Never
                {
                    return Ok(cached);
                }
                if !self.inner.fs.supports_sync_io() {
                    warn!(path, "cannot revalidate without synchronous file access, returning cached");
                    return Ok(cached);
                }
            }
            None => {}
        }

        self.check_path_sync(path, mode)?;
        self.inner
            .cache
            .get_cached(path)
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    /// Async form of [`RequireEngine::load_path_sync`].
    pub(crate) async fn load_path_async(
        &self,
        path: &str,
        mode: CacheInvalidationMode,
    ) -> Result<ModuleValue, Error> {
        match self.inner.cache.entry_state(path) {
            Some(EntryState::InFlight(placeholder)) => {
                warn!(path, "circular dependency, returning in-flight exports");
                return Ok(placeholder);
            }
            Some(EntryState::Loaded(cached)) => {
                if self.inner.in_chain.borrow().contains(path)
                    || mode == CacheInvalidationMode::Never
                {
                    return Ok(cached);
                }
            }
            None => {}
        }

        self.check_path_async(path, mode).await?;
        self.inner
            .cache
            .get_cached(path)
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    /// Revalidate `path`, reloading it if stale, and return its effective
    /// timestamp.
    ///
    /// A path already visited in this root pass returns its recorded
    /// timestamp immediately, which keeps dependency cycles finite; the marks
    /// persist for sibling checks and are cleared by the pass guard. After a
    /// reload the recorded timestamp is the maximum over the file and its
    /// freshly recorded dependencies, so an unchanged parent does not appear
    /// stale merely because a dependency file is newer than it.
    fn check_path_sync(&self, path: &str, mode: CacheInvalidationMode) -> Result<u64, Error> {
        let visited = !self.inner.in_chain.borrow_mut().insert(path.to_string());
        if visited && self.inner.cache.entry_state(path).is_some() {
            return Ok(self.inner.cache.timestamp(path).unwrap_or(0));
        }

        let recorded = self.inner.cache.timestamp(path).unwrap_or(0);
        let newest = self.dependency_max_sync(path, mode)?;
        if self.inner.cache.get_cached(path).is_some() && newest <= recorded {
            return Ok(recorded.max(newest));
        }

        if self.inner.cache.get_cached(path).is_some() {
            debug!(path, "stale, reloading");
        }
        let source = self.inner.fs.read_file_sync(path)?;
        self.evaluate_text_sync(&source, path, mode)?;

        // Dependencies are recorded now; store the dependency-inclusive max.
        let loaded = self.dependency_max_sync(path, mode)?;
        self.inner.cache.set_timestamp(path, loaded);
        Ok(loaded)
    }

    fn check_path_async<'a>(
        &'a self,
        path: &'a str,
        mode: CacheInvalidationMode,
    ) -> LocalBoxFuture<'a, Result<u64, Error>> {
        Box::pin(async move {
            let visited = !self.inner.in_chain.borrow_mut().insert(path.to_string());
            if visited && self.inner.cache.entry_state(path).is_some() {
                return Ok(self.inner.cache.timestamp(path).unwrap_or(0));
            }

            let recorded = self.inner.cache.timestamp(path).unwrap_or(0);
            let newest = self.dependency_max_async(path, mode).await?;
            if self.inner.cache.get_cached(path).is_some() && newest <= recorded {
                return Ok(recorded.max(newest));
            }

            if self.inner.cache.get_cached(path).is_some() {
                debug!(path, "stale, reloading");
            }
            let source = self.inner.fs.read_file(path).await?;
            self.evaluate_text_async(&source, path, mode).await?;

            let loaded = self.dependency_max_async(path, mode).await?;
            self.inner.cache.set_timestamp(path, loaded);
            Ok(loaded)
        })
    }

    /// Max over the file's own timestamp and everything reachable through
    /// its recorded dependency edges, revalidating dependencies on the way.
    fn dependency_max_sync(&self, path: &str, mode: CacheInvalidationMode) -> Result<u64, Error> {
        let mut max = self
            .inner
            .fs
            .get_timestamp_sync(path)
            .unwrap_or_else(|_| now_millis());
        for raw in self.inner.cache.dependencies(path) {
            if self.is_special_id(&raw) {
                continue;
            }
            let resolved = resolver::resolve(&self.inner.config, &raw, Some(path));
            match resolved.kind {
                ResolvedType::Path => {
                    let (clean, _) = split_query(&resolved.id);
                    match resolver::find_existing_file_sync(self.inner.fs.as_ref(), clean)? {
                        Some(dep) => max = max.max(self.check_path_sync(&dep, mode)?),
                        None => max = max.max(now_millis()),
                    }
                }
                ResolvedType::Module => {
                    if let Some((parent_dir, name)) = resolver::split_module_id(&resolved.id) {
                        for descriptor in resolver::descriptor_paths_sync(
                            &self.inner.config,
                            self.inner.fs.as_ref(),
                            parent_dir,
                            name,
                        )? {
                            if let Ok(ts) = self.inner.fs.get_timestamp_sync(&descriptor) {
                                max = max.max(ts);
                            }
                        }
                    }
                }
                ResolvedType::Url => match mode {
                    CacheInvalidationMode::Never => {}
                    CacheInvalidationMode::WhenPossible => max = max.max(now_millis()),
                    CacheInvalidationMode::Always => {
                        return Err(Error::UrlStalenessUnverifiable(resolved.id));
                    }
                },
            }
        }
        Ok(max)
    }

    /// Async form of [`RequireEngine::dependency_max_sync`]. URL dependencies
    /// count as "changed now" under every mode but `Never`, since the async
    /// path can refetch them.
    fn dependency_max_async<'a>(
        &'a self,
        path: &'a str,
        mode: CacheInvalidationMode,
    ) -> LocalBoxFuture<'a, Result<u64, Error>> {
        Box::pin(async move {
            let mut max = match self.inner.fs.get_timestamp(path).await {
                Ok(ts) => ts,
                Err(_) => now_millis(),
            };
            for raw in self.inner.cache.dependencies(path) {
                if self.is_special_id(&raw) {
                    continue;
                }
                let resolved = resolver::resolve(&self.inner.config, &raw, Some(path));
                match resolved.kind {
                    ResolvedType::Path => {
                        let (clean, _) = split_query(&resolved.id);
                        match resolver::find_existing_file_async(self.inner.fs.as_ref(), clean)
                            .await?
                        {
                            Some(dep) => {
                                max = max.max(self.check_path_async(&dep, mode).await?);
                            }
                            None => max = max.max(now_millis()),
                        }
                    }
                    ResolvedType::Module => {
                        if let Some((parent_dir, name)) = resolver::split_module_id(&resolved.id)
                        {
                            for descriptor in resolver::descriptor_paths_async(
                                &self.inner.config,
                                self.inner.fs.as_ref(),
                                parent_dir,
                                name,
                            )
                            .await?
                            {
                                if let Ok(ts) = self.inner.fs.get_timestamp(&descriptor).await {
                                    max = max.max(ts);
                                }
                            }
                        }
                    }
                    ResolvedType::Url => {
                        if mode != CacheInvalidationMode::Never {
                            max = max.max(now_millis());
                        }
                    }
                }
            }
            Ok(max)
        })
    }

    /// Transform `source` and run its factory synchronously.
    pub(crate) fn evaluate_text_sync(
        &self,
        source: &str,
        path: &str,
        mode: CacheInvalidationMode,
    ) -> Result<ModuleValue, Error> {
        if is_json_path(path) {
            return self.commit_json(source, path);
        }

        let compiled = transform::compile(
            self.inner.transpiler.as_ref(),
            source,
            path,
            resolver::parent_dir(path),
            &self.inner.config.logical_url_prefix,
        )?;
        if compiled.has_top_level_await {
            return Err(Error::TopLevelAwaitInSync(path.to_string()));
        }

        self.inner.cache.begin_evaluation(path);
        self.inner.cache.reset_dependencies(path);
        let factory = self.inner.evaluator.instantiate(&compiled)?;
        let ctx = FactoryContext::new(self.clone(), path, mode, source);

        let previous = self.inner.active_source.replace(Some(path.to_string()));
        let outcome = factory.call_sync(&ctx);
        self.inner.active_source.replace(previous);

        self.commit_outcome(outcome, &ctx, path)
    }

    /// Async form of [`RequireEngine::evaluate_text_sync`]; the only path
    /// that may run top-level-await factories.
    pub(crate) async fn evaluate_text_async(
        &self,
        source: &str,
        path: &str,
        mode: CacheInvalidationMode,
    ) -> Result<ModuleValue, Error> {
        if is_json_path(split_query(path).0) {
            return self.commit_json(source, path);
        }

        let compiled = transform::compile(
            self.inner.transpiler.as_ref(),
            source,
            path,
            resolver::parent_dir(path),
            &self.inner.config.logical_url_prefix,
        )?;

        self.inner.cache.begin_evaluation(path);
        self.inner.cache.reset_dependencies(path);
        let factory = self.inner.evaluator.instantiate(&compiled)?;
        let ctx = FactoryContext::new(self.clone(), path, mode, source);

        let previous = self.inner.active_source.replace(Some(path.to_string()));
        let outcome = factory.call_async(&ctx).await;
        self.inner.active_source.replace(previous);

        self.commit_outcome(outcome, &ctx, path)
    }

    fn commit_json(&self, source: &str, path: &str) -> Result<ModuleValue, Error> {
        let parsed: serde_json::Value =
            serde_json::from_str(source).map_err(|source| Error::JsonParse {
                path: path.to_string(),
                source,
            })?;
        let value = ModuleValue::json(parsed);
        self.inner.cache.store(path, value.clone());
        self.record_load_timestamp(path);
        self.inner.in_chain.borrow_mut().insert(path.to_string());
        Ok(value)
    }

    fn commit_outcome(
        &self,
        outcome: Result<Option<ModuleValue>, Error>,
        ctx: &FactoryContext,
        path: &str,
    ) -> Result<ModuleValue, Error> {
        let exports = match outcome {
            Ok(Some(value)) => value,
            Ok(None) => ctx.exports(),
            Err(source) => {
                self.inner.cache.invalidate(path);
                return Err(Error::Load {
                    path: path.to_string(),
                    source: Box::new(source),
                });
            }
        };
        self.inner.cache.commit(path, exports.clone());
        self.record_load_timestamp(path);
        self.inner.in_chain.borrow_mut().insert(path.to_string());
        Ok(self.inner.cache.get_cached(path).unwrap_or(exports))
    }

    /// Record the timestamp the loaded content was observed at. Sources with
    /// no timestamp (URLs, ad-hoc strings) record the current time.
    fn record_load_timestamp(&self, path: &str) {
        let ts = if self.inner.fs.supports_sync_io() {
            self.inner
                .fs
                .get_timestamp_sync(path)
                .unwrap_or_else(|_| now_millis())
        } else {
            now_millis()
        };
        self.inner.cache.set_timestamp(path, ts);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use futures::future::LocalBoxFuture;
    use serde_json::json;

    use crate::capability::FsCapability;
    use crate::config::LoaderConfig;
    use crate::engine::{EngineOptions, FactoryContext, RequireEngine};
    use crate::error::Error;
    use crate::evaluate::{Evaluator, FnModuleFactory, ModuleFactory};
    use crate::options::{CacheInvalidationMode, RequireOptions};
    use crate::transform::CompiledModule;
    use crate::value::ModuleValue;

    /// In-memory filesystem with writable contents and counter timestamps.
    struct MapFs {
        files: RefCell<HashMap<String, (String, u64)>>,
        clock: Cell<u64>,
        sync_io: bool,
    }

    impl MapFs {
        fn new(files: &[(&str, &str)]) -> Rc<Self> {
            let fs = Rc::new(Self {
                files: RefCell::new(HashMap::new()),
                clock: Cell::new(0),
                sync_io: true,
            });
            for (path, content) in files {
                fs.write(path, content);
            }
            fs
        }

        fn async_only(files: &[(&str, &str)]) -> Rc<Self> {
            let fs = Self::new(files);
            let cloned = fs.files.borrow().clone();
            Rc::new(Self {
                files: RefCell::new(cloned),
                clock: Cell::new(fs.clock.get()),
                sync_io: false,
            })
        }

        fn write(&self, path: &str, content: &str) {
            let ts = self.clock.get() + 1;
            self.clock.set(ts);
            self.files
                .borrow_mut()
                .insert(path.to_string(), (content.to_string(), ts));
        }
    }

    impl FsCapability for MapFs {
        fn supports_sync_io(&self) -> bool {
            self.sync_io
        }

        fn exists_file(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
            let result = Ok(self.files.borrow().contains_key(path));
            Box::pin(async move { result })
        }

        fn exists_dir(&self, path: &str) -> LocalBoxFuture<'_, Result<bool, Error>> {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let result = Ok(self.files.borrow().keys().any(|k| k.starts_with(&prefix)));
            Box::pin(async move { result })
        }

        fn get_timestamp(&self, path: &str) -> LocalBoxFuture<'_, Result<u64, Error>> {
            let result = self
                .files
                .borrow()
                .get(path)
                .map(|(_, ts)| *ts)
                .ok_or_else(|| Error::FileNotFound(path.to_string()));
            Box::pin(async move { result })
        }

        fn read_file(&self, path: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
            let result = self
                .files
                .borrow()
                .get(path)
                .map(|(content, _)| content.clone())
                .ok_or_else(|| Error::FileNotFound(path.to_string()));
            Box::pin(async move { result })
        }

        fn exists_file_sync(&self, path: &str) -> Result<bool, Error> {
            if !self.sync_io {
                return Err(Error::SyncIoUnsupported);
            }
            Ok(self.files.borrow().contains_key(path))
        }

        fn exists_dir_sync(&self, path: &str) -> Result<bool, Error> {
            if !self.sync_io {
                return Err(Error::SyncIoUnsupported);
            }
            let prefix = format!("{}/", path.trim_end_matches('/'));
            Ok(self.files.borrow().keys().any(|k| k.starts_with(&prefix)))
        }

        fn get_timestamp_sync(&self, path: &str) -> Result<u64, Error> {
            if !self.sync_io {
                return Err(Error::SyncIoUnsupported);
            }
            self.files
                .borrow()
                .get(path)
                .map(|(_, ts)| *ts)
                .ok_or_else(|| Error::FileNotFound(path.to_string()))
        }

        fn read_file_sync(&self, path: &str) -> Result<String, Error> {
            if !self.sync_io {
                return Err(Error::SyncIoUnsupported);
            }
            self.files
                .borrow()
                .get(path)
                .map(|(content, _)| content.clone())
                .ok_or_else(|| Error::FileNotFound(path.to_string()))
        }
    }

    /// Line-directive evaluator: `require <spec>` pulls in a dependency,
    /// `export <key> <json>` sets an export. Counts factory invocations.
    struct DirectiveEvaluator {
        evals: Rc<Cell<usize>>,
    }

    impl DirectiveEvaluator {
        fn new() -> (Self, Rc<Cell<usize>>) {
            let evals = Rc::new(Cell::new(0));
            (
                Self {
                    evals: Rc::clone(&evals),
                },
                evals,
            )
        }
    }

    impl Evaluator for DirectiveEvaluator {
        fn instantiate(&self, compiled: &CompiledModule) -> Result<Box<dyn ModuleFactory>, Error> {
            let code = compiled.code.clone();
            let evals = Rc::clone(&self.evals);
            Ok(Box::new(FnModuleFactory(move |ctx: &FactoryContext| {
                evals.set(evals.get() + 1);
                for line in code.lines() {
                    let line = line.trim();
                    if let Some(spec) = line.strip_prefix("require ") {
                        ctx.require(spec.trim())?;
                    } else if let Some(rest) = line.strip_prefix("export ") {
                        let (key, raw) = rest.split_once(' ').unwrap_or((rest, "null"));
                        let value = serde_json::from_str(raw)
                            .map_err(|e| Error::other(e.to_string()))?;
                        ctx.set_export(key, ModuleValue::json(value));
                    }
                }
                Ok(None)
            })))
        }
    }

    fn engine_over(fs: Rc<MapFs>) -> (RequireEngine, Rc<Cell<usize>>) {
        let (evaluator, evals) = DirectiveEvaluator::new();
        let engine = RequireEngine::new(EngineOptions::new(
            LoaderConfig::default(),
            fs,
            Rc::new(evaluator),
        ));
        (engine, evals)
    }

    #[test]
    fn test_require_json_module() {
        let fs = MapFs::new(&[("/data.json", r#"{"answer": 42}"#)]);
        let (engine, evals) = engine_over(fs);
        let value = engine.require("/data.json").unwrap();
        assert_eq!(value.get("answer").unwrap().as_json().unwrap(), &json!(42));
        // JSON bypasses the factory pipeline entirely.
        assert_eq!(evals.get(), 0);
    }

    #[test]
    fn test_require_caches_until_file_changes() {
        let fs = MapFs::new(&[("/a.js", "export x 1")]);
        let (engine, evals) = engine_over(Rc::clone(&fs));

        let first = engine.require("/a.js").unwrap();
        let second = engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 1);
        assert!(first.ptr_eq(&second));

        fs.write("/a.js", "export x 2");
        let third = engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);
        assert_eq!(third.get("x").unwrap().as_json().unwrap(), &json!(2));
    }

    #[test]
    fn test_mode_never_trusts_stale_cache() {
        let fs = MapFs::new(&[("/a.js", "export x 1")]);
        let (engine, evals) = engine_over(Rc::clone(&fs));

        engine.require("/a.js").unwrap();
        fs.write("/a.js", "export x 2");
        let value = engine
            .require_with(
                "/a.js",
                &RequireOptions::with_mode(CacheInvalidationMode::Never),
            )
            .unwrap();
        assert_eq!(evals.get(), 1);
        assert_eq!(value.get("x").unwrap().as_json().unwrap(), &json!(1));
    }

    #[test]
    fn test_suffix_probe_finds_typescript_file() {
        let fs = MapFs::new(&[("/util.ts", "export kind \"ts\"")]);
        let (engine, _) = engine_over(fs);
        let value = engine.require("/util").unwrap();
        assert_eq!(value.get("kind").unwrap().as_json().unwrap(), &json!("ts"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let fs = MapFs::new(&[]);
        let (engine, _) = engine_over(fs);
        let err = engine.require("/nope.js").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(path) if path == "/nope.js"));
    }

    #[test]
    fn test_sync_url_require_is_an_error() {
        let fs = MapFs::new(&[]);
        let (engine, _) = engine_over(fs);
        let err = engine.require("https://example.com/mod.js").unwrap_err();
        assert!(matches!(err, Error::SyncUrlRequire(_)));
    }

    #[test]
    fn test_sync_require_fails_without_sync_io() {
        let fs = MapFs::async_only(&[("/a.js", "export x 1")]);
        let (engine, _) = engine_over(fs);
        let err = engine.require("/a.js").unwrap_err();
        assert!(matches!(err, Error::SyncIoUnsupported));
    }

    #[tokio::test]
    async fn test_async_require_works_without_sync_io() {
        let fs = MapFs::async_only(&[("/a.js", "export x 1")]);
        let (engine, _) = engine_over(fs);
        let value = engine.require_async("/a.js").await.unwrap();
        assert_eq!(value.get("x").unwrap().as_json().unwrap(), &json!(1));
    }

    #[test]
    fn test_circular_requires_complete() {
        let fs = MapFs::new(&[
            ("/a.js", "require ./b.js\nexport from \"a\""),
            ("/b.js", "require ./a.js\nexport from \"b\""),
        ]);
        let (engine, evals) = engine_over(fs);
        let value = engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);
        assert_eq!(value.get("from").unwrap().as_json().unwrap(), &json!("a"));
        assert_eq!(engine.cache().dependencies("/a.js"), vec!["./b.js"]);
        assert_eq!(engine.cache().dependencies("/b.js"), vec!["./a.js"]);
    }

    #[test]
    fn test_dependency_change_reloads_parent_once() {
        let fs = MapFs::new(&[
            ("/a.js", "require ./b.js\nexport who \"a\""),
            ("/b.js", "export who \"b\""),
        ]);
        let (engine, evals) = engine_over(Rc::clone(&fs));

        engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);
        engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);

        fs.write("/b.js", "export who \"b2\"");
        engine.require("/a.js").unwrap();
        // Both the parent and the changed dependency re-evaluate, once each.
        assert_eq!(evals.get(), 4);
        engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 4);
    }

    #[test]
    fn test_query_id_shares_value_but_skips_revalidation() {
        let fs = MapFs::new(&[("/a.js", "export x 1")]);
        let (engine, evals) = engine_over(Rc::clone(&fs));

        engine.require("/a.js?tag=1").unwrap();
        assert_eq!(evals.get(), 1);

        fs.write("/a.js", "export x 2");
        // Query-suffixed ids are never auto-revalidated under whenPossible.
        let queried = engine.require("/a.js?tag=1").unwrap();
        assert_eq!(evals.get(), 1);
        assert_eq!(queried.get("x").unwrap().as_json().unwrap(), &json!(1));

        // The clean path still revalidates normally.
        let plain = engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);
        assert_eq!(plain.get("x").unwrap().as_json().unwrap(), &json!(2));
    }

    #[test]
    fn test_top_level_await_rejected_on_sync_path() {
        let fs = MapFs::new(&[("/tla.js", "const x = await load();")]);
        let (engine, _) = engine_over(fs);
        let err = engine.require("/tla.js").unwrap_err();
        assert!(matches!(err, Error::TopLevelAwaitInSync(_)));
    }

    #[test]
    fn test_clear_cache_forces_reevaluation() {
        let fs = MapFs::new(&[("/a.js", "export x 1")]);
        let (engine, evals) = engine_over(fs);
        engine.require("/a.js").unwrap();
        engine.clear_cache();
        engine.require("/a.js").unwrap();
        assert_eq!(evals.get(), 2);
    }

    #[test]
    fn test_factory_error_leaves_no_cache_entry() {
        let fs = MapFs::new(&[("/bad.js", "export x not-json")]);
        let (engine, _) = engine_over(fs);
        let err = engine.require("/bad.js").unwrap_err();
        assert!(matches!(err, Error::Load { ref path, .. } if path == "/bad.js"));
        assert!(engine.cache().get_cached("/bad.js").is_none());
    }

    #[tokio::test]
    async fn test_require_string_async_aliases_suffix() {
        let fs = MapFs::new(&[]);
        let (engine, evals) = engine_over(fs);
        let value = engine
            .require_string_async("export x 9", "/snippet.js", Some("block=1"))
            .await
            .unwrap();
        assert_eq!(value.get("x").unwrap().as_json().unwrap(), &json!(9));
        assert_eq!(evals.get(), 1);
        assert!(engine.cache().get_cached("/snippet.js?block=1").is_some());
    }
}
