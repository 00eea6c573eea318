#![allow(dead_code)]

//! Shared test collaborators.
//!
//! The engine needs an evaluator to do anything observable; these tests drive
//! it with a line-directive interpreter standing in for a script runtime.
//! `require <spec>` pulls in a dependency, `export <key> <json>` sets an
//! export. The factory counts invocations so staleness behavior is visible.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use loadstone_core::{
    CompiledModule, EngineOptions, Error, Evaluator, FactoryContext, FsCapability, HostBridge,
    LoaderConfig, ModuleFactory, ModuleValue, RequireEngine, UrlFetcher,
};

pub struct DirectiveEvaluator {
    evals: Rc<Cell<usize>>,
}

impl DirectiveEvaluator {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
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
        Ok(Box::new(DirectiveFactory {
            code: compiled.code.clone(),
            evals: Rc::clone(&self.evals),
        }))
    }
}

struct DirectiveFactory {
    code: String,
    evals: Rc<Cell<usize>>,
}

impl ModuleFactory for DirectiveFactory {
    fn call_sync(&self, ctx: &FactoryContext) -> Result<Option<ModuleValue>, Error> {
        self.evals.set(self.evals.get() + 1);
        for line in self.code.lines() {
            let line = line.trim();
            if let Some(spec) = line.strip_prefix("require ") {
                ctx.require(spec.trim())?;
            } else if let Some(rest) = line.strip_prefix("export ") {
                export_directive(ctx, rest)?;
            }
        }
        Ok(None)
    }

    fn call_async<'a>(
        &'a self,
        ctx: &'a FactoryContext,
    ) -> LocalBoxFuture<'a, Result<Option<ModuleValue>, Error>> {
        Box::pin(async move {
            self.evals.set(self.evals.get() + 1);
            for line in self.code.lines() {
                let line = line.trim();
                if let Some(spec) = line.strip_prefix("require ") {
                    ctx.require_async(spec.trim()).await?;
                } else if let Some(rest) = line.strip_prefix("export ") {
                    export_directive(ctx, rest)?;
                }
            }
            Ok(None)
        })
    }
}

fn export_directive(ctx: &FactoryContext, rest: &str) -> Result<(), Error> {
    let (key, raw) = rest.split_once(' ').unwrap_or((rest, "null"));
    let value = serde_json::from_str(raw).map_err(|e| Error::other(e.to_string()))?;
    ctx.set_export(key, ModuleValue::json(value));
    Ok(())
}

pub fn engine_over(
    config: LoaderConfig,
    fs: Rc<dyn FsCapability>,
) -> (RequireEngine, Rc<Cell<usize>>) {
    let (evaluator, evals) = DirectiveEvaluator::new();
    let engine = RequireEngine::new(EngineOptions::new(config, fs, Rc::new(evaluator)));
    (engine, evals)
}

pub fn engine_with_fetcher(
    config: LoaderConfig,
    fs: Rc<dyn FsCapability>,
    fetcher: Rc<dyn UrlFetcher>,
) -> (RequireEngine, Rc<Cell<usize>>) {
    let (evaluator, evals) = DirectiveEvaluator::new();
    let engine = RequireEngine::new(
        EngineOptions::new(config, fs, Rc::new(evaluator)).fetcher(fetcher),
    );
    (engine, evals)
}

/// Fetcher over a fixed url-to-body map, counting fetches. Unknown urls
/// report a 404.
pub struct CountingFetcher {
    bodies: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl CountingFetcher {
    pub fn new(bodies: &[(&str, &str)]) -> Rc<Self> {
        Rc::new(Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| ((*url).to_string(), (*body).to_string()))
                .collect(),
            fetches: Cell::new(0),
        })
    }
}

impl UrlFetcher for CountingFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
        self.fetches.set(self.fetches.get() + 1);
        let result = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| Error::FetchStatus {
                url: url.to_string(),
                status: 404,
            });
        Box::pin(async move { result })
    }
}

/// Bridge exposing one builtin and a tagged host instance.
pub struct TestBridge;

impl HostBridge for TestBridge {
    fn host_instance(&self) -> ModuleValue {
        let app = ModuleValue::object();
        app.set("kind", ModuleValue::json(serde_json::json!("host-app")));
        app
    }

    fn builtin_names(&self) -> Vec<String> {
        vec!["host-utils".to_string()]
    }

    fn load_builtin(&self, name: &str) -> Option<ModuleValue> {
        (name == "host-utils").then(|| {
            let exports = ModuleValue::object();
            exports.set("version", ModuleValue::json(serde_json::json!(1)));
            exports
        })
    }
}
