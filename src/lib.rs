//! # tinypack
//!
//! A minimal in-memory ES module bundler and loader. Given a set of source
//! files using `import`/`export` syntax, it:
//!
//! 1. canonicalizes each file path into a stable identifier that doubles as
//!    the module cache key ([`meta`]),
//! 2. rewrites module syntax into plain references against dependency
//!    parameters ([`rewrite`]),
//! 3. compiles each file into a callable unit taking its dependencies'
//!    exports as arguments, memoized per canonical name ([`compile`],
//!    [`cache`]),
//! 4. executes the graph in dependency-first order ([`runner`]).
//!
//! ## Invariants
//!
//! 1. **Canonical names are injective**: distinct paths never share a cache
//!    key or a generated identifier.
//! 2. **Compile at most once**: the cache is consulted before every
//!    recursive compilation, so a diamond-shared dependency compiles once
//!    per run.
//! 3. **Execute once per reference**: the runner deliberately re-executes a
//!    dependency for each module that imports it; the cache memoizes
//!    compilation, not execution.
//! 4. **Dependency-first**: a module's callable is only invoked after every
//!    dependency has produced its exports object, and a dependency's errors
//!    surface before its dependents are attempted.
//!
//! Circular imports are not detected; a cycle recurses until resources run
//! out. Re-running after changing sources is safe because each top-level run
//! resets the cache.

pub mod cache;
pub mod compile;
pub mod console;
pub mod error;
pub mod interp;
pub mod ir;
pub mod lower;
pub mod meta;
pub mod rewrite;
pub mod runner;
pub mod store;
pub mod value;

#[cfg(test)]
mod bundle_tests;

pub use cache::ModuleCache;
pub use compile::{compile_module, ModuleDef, ModuleFn};
pub use console::{ConsoleSink, LogLevel, RecordingSink, StdoutSink};
pub use error::{Error, Result};
pub use interp::{Interpreter, RuntimeError};
pub use meta::{canonicalize, ExportMap, FileMetaData, DEFAULT_EXPORT};
pub use rewrite::rewrite_module;
pub use runner::{run, run_module};
pub use store::{FileStore, MemoryFileStore, StoreError};
pub use value::Value;
