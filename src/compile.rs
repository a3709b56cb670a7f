//! Module compiler.
//!
//! Drives one file from source text to a cached, callable unit:
//!
//! 1. read the source from the file store (a missing file is reported with
//!    the path that failed),
//! 2. rewrite import/export syntax, populating the file's metadata,
//! 3. append a return statement building the exports object,
//! 4. compile each dependency depth-first, consulting the cache so a
//!    diamond-shared dependency compiles at most once per run,
//! 5. synthesize a callable whose parameters are the dependencies' canonical
//!    names, and cache it.
//!
//! Dependencies compile strictly one at a time, in declaration order, each
//! fully finished before the next sibling starts. An error anywhere aborts
//! the whole chain; cache entries for already-completed dependencies stay.

use std::rc::Rc;

use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::cache::ModuleCache;
use crate::error::{Error, Result};
use crate::interp::{Interpreter, RuntimeError};
use crate::ir::Stmt;
use crate::lower::lower_function_body;
use crate::meta::{ExportMap, FileMetaData};
use crate::rewrite::rewrite_module;
use crate::store::FileStore;
use crate::value::Value;

/// A synthesized callable: one positional parameter per dependency, body
/// executed against the interpreter's globals, returning the exports object.
#[derive(Debug, Clone)]
pub struct ModuleFn {
    params: Vec<String>,
    body: Rc<Vec<Stmt>>,
}

impl ModuleFn {
    /// Build an invokable unit from a parameter list and a body of source
    /// text, the way JavaScript's `new Function(...params, body)` does:
    /// wrap, parse once, lower to the owned instruction set.
    pub fn synthesize(params: &[String], body: &str, path: &str) -> Result<Self> {
        let source = format!(
            "function __module__({}) {{\n{}\n}}",
            params.join(", "),
            body
        );

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &source, SourceType::default()).parse();
        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Parse {
                path: path.to_string(),
                message,
            });
        }

        let body = match ret.program.body.first() {
            Some(Statement::FunctionDeclaration(func)) => match &func.body {
                Some(func_body) => lower_function_body(func_body).map_err(|e| Error::Unsupported {
                    path: path.to_string(),
                    construct: e.construct,
                })?,
                None => Vec::new(),
            },
            _ => {
                return Err(Error::Parse {
                    path: path.to_string(),
                    message: "synthesized unit did not parse to a function".to_string(),
                })
            }
        };

        Ok(ModuleFn {
            params: params.to_vec(),
            body: Rc::new(body),
        })
    }

    /// Number of dependency parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn invoke(
        &self,
        args: Vec<Value>,
        interp: &Interpreter,
    ) -> std::result::Result<Value, RuntimeError> {
        interp.call_synthesized(&self.params, &self.body, args)
    }
}

/// A compiled unit plus the canonical names of its dependencies, in the
/// callable's parameter order.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub module: ModuleFn,
    pub deps: Vec<String>,
}

/// Compile `meta`'s file and, transitively, everything it imports.
pub async fn compile_module<S: FileStore>(
    meta: &mut FileMetaData,
    store: &S,
    cache: &mut ModuleCache,
) -> Result<ModuleDef> {
    tracing::debug!(path = %meta.path, "compiling module");

    let source = store.read_file(&meta.path).await.map_err(Error::from)?;

    let mut transformed = rewrite_module(&source, meta)?;
    transformed.push_str(&export_return_statement(&meta.exports));

    for dep in &mut meta.deps {
        if cache.get(&dep.canonical_name).is_none() {
            Box::pin(compile_module(dep, store, cache)).await?;
        }
    }

    let dep_args: Vec<String> = meta.deps.iter().map(|d| d.canonical_name.clone()).collect();
    let module = ModuleFn::synthesize(&dep_args, &transformed, &meta.path)?;
    let def = ModuleDef {
        module,
        deps: dep_args,
    };
    cache.set(meta.canonical_name.clone(), def.clone());

    Ok(def)
}

/// `;return {exported: local, ...};` over every non-blank export entry.
///
/// Blank local bindings (an anonymous default export) are dropped. Exported
/// names that are not identifier-shaped are quoted so the synthesized unit
/// always parses.
fn export_return_statement(exports: &ExportMap) -> String {
    let entries: Vec<String> = exports
        .iter()
        .filter(|(_, local)| !local.trim().is_empty())
        .map(|(exported, local)| format!("{}: {}", object_key(exported), local))
        .collect();
    format!(";return {{{}}};", entries.join(","))
}

fn object_key(name: &str) -> String {
    let identifier_shaped = !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if identifier_shaped {
        name.to_string()
    } else {
        match serde_json::to_string(name) {
            Ok(quoted) => quoted,
            Err(_) => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::DEFAULT_EXPORT;

    #[test]
    fn return_statement_lists_exports_in_order() {
        let mut exports = ExportMap::new();
        exports.set("value", "value");
        exports.set(DEFAULT_EXPORT, "counter");

        assert_eq!(
            export_return_statement(&exports),
            ";return {value: value,___default: counter};"
        );
    }

    #[test]
    fn return_statement_drops_blank_bindings() {
        let mut exports = ExportMap::new();
        exports.set(DEFAULT_EXPORT, "");
        assert_eq!(export_return_statement(&exports), ";return {};");
    }

    #[test]
    fn return_statement_quotes_awkward_keys() {
        let mut exports = ExportMap::new();
        exports.set("kebab-name", "value");
        assert_eq!(
            export_return_statement(&exports),
            ";return {\"kebab-name\": value};"
        );
    }

    #[test]
    fn synthesized_arity_matches_params() {
        let module = ModuleFn::synthesize(
            &["_A_000000".to_string(), "_B_000000".to_string()],
            "return {};",
            "./test.js",
        )
        .unwrap();
        assert_eq!(module.arity(), 2);
    }

    #[test]
    fn synthesis_rejects_unparseable_bodies() {
        let err = ModuleFn::synthesize(&[], "return {", "./broken.js").unwrap_err();
        assert!(matches!(err, Error::Parse { path, .. } if path == "./broken.js"));
    }

    #[test]
    fn synthesis_rejects_unsupported_syntax() {
        let err = ModuleFn::synthesize(&[], "class X {} return {};", "./fancy.js").unwrap_err();
        match err {
            Error::Unsupported { path, construct } => {
                assert_eq!(path, "./fancy.js");
                assert_eq!(construct, "class declaration");
            }
            other => panic!("expected unsupported-syntax error, got {:?}", other),
        }
    }
}
