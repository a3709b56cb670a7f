//! Module runner and run orchestrator.
//!
//! The runner walks a compiled graph in dependency-first order: every
//! dependency is executed (its exports object obtained) before the module
//! itself is invoked. The cache memoizes compilation only, so a dependency
//! referenced from two modules runs once per reference, repeating its
//! top-level side effects. That is the contract, not an accident.

use crate::cache::ModuleCache;
use crate::compile::{compile_module, ModuleDef};
use crate::error::Result;
use crate::interp::Interpreter;
use crate::meta::canonicalize;
use crate::store::FileStore;
use crate::value::Value;

/// Execute a compiled module and return its exports object.
pub fn run_module(def: &ModuleDef, cache: &ModuleCache, interp: &Interpreter) -> Result<Value> {
    let mut dep_exports = Vec::with_capacity(def.deps.len());
    for dep in &def.deps {
        // The compiler finished every dependency before caching this module.
        if let Some(dep_def) = cache.get(dep) {
            dep_exports.push(run_module(dep_def, cache, interp)?);
        }
    }
    Ok(def.module.invoke(dep_exports, interp)?)
}

/// Top-level run: reset the cache, compile the entry file and its transitive
/// dependencies, execute the graph. The entry's exports are discarded; the
/// run's observable outcome is the side effects the modules perform.
pub async fn run<S: FileStore>(
    store: &S,
    entry_path: &str,
    cache: &mut ModuleCache,
    interp: &Interpreter,
) -> Result<()> {
    tracing::info!(entry = %entry_path, "starting run");
    cache.reset();

    let mut entry = canonicalize(entry_path);
    let entry_def = compile_module(&mut entry, store, cache).await?;
    run_module(&entry_def, cache, interp)?;

    Ok(())
}
