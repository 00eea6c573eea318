//! Evaluation collaborators.
//!
//! The engine does not embed a script interpreter. Two seams are injected at
//! install time: the [`Transpiler`] converts module syntax into loadable
//! statements (the `compileToLoadable` black box), and the [`Evaluator`]
//! turns a compiled module into a callable [`ModuleFactory`]. Hosts bridge
//! these to whatever execution environment they embed; tests drive them with
//! plain closures.

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::engine::FactoryContext;
use crate::error::Error as LoadError;
use crate::value::ModuleValue;

/// Failure inside the transpiler collaborator.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TranspileError {
    pub message: String,
}

impl TranspileError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Raw transpiler output before factory wrapping.
#[derive(Debug, Clone)]
pub struct TranspileOutput {
    pub code: String,
    /// Structured source map, when the transpiler produces one.
    pub source_map: Option<serde_json::Value>,
}

/// Source-to-source collaborator: module syntax in, CJS-style statements out.
pub trait Transpiler {
    fn compile_to_loadable(
        &self,
        source: &str,
        filename: &str,
        dir: &str,
    ) -> Result<TranspileOutput, TranspileError>;
}

/// Transpiler for sources that are already in loadable form.
pub struct PassthroughTranspiler;

impl Transpiler for PassthroughTranspiler {
    fn compile_to_loadable(
        &self,
        source: &str,
        _filename: &str,
        _dir: &str,
    ) -> Result<TranspileOutput, TranspileError> {
        Ok(TranspileOutput {
            code: source.to_string(),
            source_map: None,
        })
    }
}

/// Instantiates a callable factory from compiled module code.
pub trait Evaluator {
    fn instantiate(
        &self,
        compiled: &crate::transform::CompiledModule,
    ) -> Result<Box<dyn ModuleFactory>, LoadError>;
}

/// A module factory: the executable form of one module.
///
/// The factory returns the module's exports, or `None` to use the exports
/// object it populated through the context (CommonJS `exports.foo = ..`
/// style). The async form exists for modules with top-level await and for
/// platforms without synchronous I/O; the default delegates to the sync form.
pub trait ModuleFactory {
    fn call_sync(&self, ctx: &FactoryContext) -> Result<Option<ModuleValue>, LoadError>;

    fn call_async<'a>(
        &'a self,
        ctx: &'a FactoryContext,
    ) -> LocalBoxFuture<'a, Result<Option<ModuleValue>, LoadError>> {
        Box::pin(async move { self.call_sync(ctx) })
    }
}

/// Factory backed by a plain closure; the usual host-bridge building block.
pub struct FnModuleFactory<F>(pub F)
where
    F: Fn(&FactoryContext) -> Result<Option<ModuleValue>, LoadError>;

impl<F> ModuleFactory for FnModuleFactory<F>
where
    F: Fn(&FactoryContext) -> Result<Option<ModuleValue>, LoadError>,
{
    fn call_sync(&self, ctx: &FactoryContext) -> Result<Option<ModuleValue>, LoadError> {
        (self.0)(ctx)
    }
}
