//! End-to-end bundling and execution scenarios.
//!
//! Each test builds its own store, cache, and interpreter; console output is
//! captured through a recording sink and asserted exactly.

use std::rc::Rc;

use crate::cache::ModuleCache;
use crate::compile::compile_module;
use crate::console::RecordingSink;
use crate::error::Error;
use crate::interp::{apply, Interpreter};
use crate::meta::{canonicalize, DEFAULT_EXPORT};
use crate::runner::{run, run_module};
use crate::store::MemoryFileStore;
use crate::value::Value;

fn recording_interpreter() -> (Rc<RecordingSink>, Interpreter) {
    let sink = RecordingSink::new();
    let interp = Interpreter::new(sink.clone());
    (sink, interp)
}

#[tokio::test]
async fn compiles_a_module_with_no_dependencies() {
    let store = MemoryFileStore::with_files([("./hello.js", "console.info('hello from tinypack');")]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    let mut meta = canonicalize("./hello.js");
    let def = compile_module(&mut meta, &store, &mut cache).await.unwrap();

    assert_eq!(def.deps.len(), 0);
    assert_eq!(def.module.arity(), 0);

    def.module.invoke(Vec::new(), &interp).unwrap();
    assert_eq!(sink.messages(), vec!["hello from tinypack"]);
}

#[tokio::test]
async fn invoking_a_module_returns_its_default_export() {
    let store = MemoryFileStore::with_files([(
        "./hello.js",
        "function hello() { console.info('hello from export'); }
        export default hello;",
    )]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    let mut meta = canonicalize("./hello.js");
    let def = compile_module(&mut meta, &store, &mut cache).await.unwrap();
    let exports = def.module.invoke(Vec::new(), &interp).unwrap();

    let default = exports.get_prop(DEFAULT_EXPORT).unwrap();
    apply(&default, Vec::new(), "hello").unwrap();

    assert_eq!(sink.messages(), vec!["hello from export"]);
}

#[tokio::test]
async fn exports_object_carries_named_and_default_entries() {
    let store = MemoryFileStore::with_files([(
        "./values.js",
        "const value = 2;
        function greet() { return 'hi'; }
        export { value, greet as hello };
        export default value;",
    )]);
    let mut cache = ModuleCache::new();
    let (_sink, interp) = recording_interpreter();

    let mut meta = canonicalize("./values.js");
    let def = compile_module(&mut meta, &store, &mut cache).await.unwrap();
    let exports = def.module.invoke(Vec::new(), &interp).unwrap();

    assert_eq!(exports.get_prop("value"), Some(Value::Number(2.0)));
    assert_eq!(exports.get_prop(DEFAULT_EXPORT), Some(Value::Number(2.0)));
    let greet = exports.get_prop("hello").unwrap();
    let greeting = apply(&greet, Vec::new(), "hello").unwrap();
    assert_eq!(greeting, Value::string("hi"));
}

#[tokio::test]
async fn dependencies_are_compiled_into_the_cache() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('hello from dep injection'); }
            export default welcome;",
        ),
        (
            "./hello.js",
            "import welcome from './welcome.js';
            welcome();",
        ),
    ]);
    let mut cache = ModuleCache::new();

    let mut meta = canonicalize("./hello.js");
    compile_module(&mut meta, &store, &mut cache).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&canonicalize("./welcome.js").canonical_name));
    assert!(cache.contains(&canonicalize("./hello.js").canonical_name));
}

#[tokio::test]
async fn runs_modules_with_default_import_and_export() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('hello from default import/export modules'); }
            export default welcome;",
        ),
        (
            "./hello.js",
            "import welcome from './welcome.js';
            welcome();",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["hello from default import/export modules"]
    );
}

#[tokio::test]
async fn runs_modules_with_named_imports_and_exports() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('hello from named import/export modules'); }
            export { welcome };",
        ),
        (
            "./hello.js",
            "import { welcome } from './welcome.js';
            welcome();",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["hello from named import/export modules"]
    );
}

#[tokio::test]
async fn runs_modules_with_renamed_imports() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('hello from renamed import modules'); }
            export { welcome };",
        ),
        (
            "./hello.js",
            "import { welcome as hello } from './welcome.js';
            hello();",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();

    assert_eq!(sink.messages(), vec!["hello from renamed import modules"]);
}

#[tokio::test]
async fn runs_modules_with_renamed_exports() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('hello from renamed exports modules'); }
            export { welcome as something };",
        ),
        (
            "./hello.js",
            "import { something as hello } from './welcome.js';
            hello();",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();

    assert_eq!(sink.messages(), vec!["hello from renamed exports modules"]);
}

#[tokio::test]
async fn missing_module_fails_with_its_path() {
    let store = MemoryFileStore::with_files([(
        "./hello.js",
        "import { something as hello } from './welcome.js';
        hello();",
    )]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    let err = run(&store, "./hello.js", &mut cache, &interp)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "module ./welcome.js does not exist");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn missing_entry_fails_with_its_path() {
    let store = MemoryFileStore::new();
    let mut cache = ModuleCache::new();
    let (_sink, interp) = recording_interpreter();

    let err = run(&store, "./hello.js", &mut cache, &interp)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ModuleNotFound { path } if path == "./hello.js"));
}

#[tokio::test]
async fn error_in_a_deep_dependency_propagates() {
    let store = MemoryFileStore::with_files([
        (
            "./main.js",
            "import './a.js';
            console.info('main ran');",
        ),
        (
            "./a.js",
            "import './missing.js';
            console.info('a ran');",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    let err = run(&store, "./main.js", &mut cache, &interp)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ModuleNotFound { path } if path == "./missing.js"));
    // Nothing executed.
    assert!(sink.is_empty());
}

#[tokio::test]
async fn diamond_dependency_compiles_once_but_runs_per_reference() {
    let store = MemoryFileStore::with_files([
        ("./common.js", "console.info('common ran');"),
        (
            "./a.js",
            "import './common.js';
            console.info('a ran');",
        ),
        (
            "./b.js",
            "import './common.js';
            console.info('b ran');",
        ),
        (
            "./main.js",
            "import './a.js';
            import './b.js';
            console.info('main ran');",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./main.js", &mut cache, &interp).await.unwrap();

    // One compiled unit per distinct file.
    assert_eq!(cache.len(), 4);

    // Execution is dependency-first and repeats the shared module once per
    // reference path.
    assert_eq!(
        sink.messages(),
        vec!["common ran", "a ran", "common ran", "b ran", "main ran"]
    );
}

#[tokio::test]
async fn rerunning_resets_the_cache_and_repeats_side_effects() {
    let store = MemoryFileStore::with_files([("./hello.js", "console.info('ran');")]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();
    run(&store, "./hello.js", &mut cache, &interp).await.unwrap();

    assert_eq!(sink.messages(), vec!["ran", "ran"]);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn run_module_reexecutes_an_already_run_graph() {
    let store = MemoryFileStore::with_files([
        (
            "./welcome.js",
            "function welcome() { console.info('dep ran'); }
            export default welcome;",
        ),
        (
            "./hello.js",
            "import welcome from './welcome.js';
            welcome();",
        ),
    ]);
    let mut cache = ModuleCache::new();
    let (sink, interp) = recording_interpreter();

    let mut meta = canonicalize("./hello.js");
    let def = compile_module(&mut meta, &store, &mut cache).await.unwrap();

    run_module(&def, &cache, &interp).unwrap();
    run_module(&def, &cache, &interp).unwrap();

    assert_eq!(sink.messages(), vec!["dep ran", "dep ran"]);
}

#[tokio::test]
async fn runtime_faults_surface_as_errors() {
    let store = MemoryFileStore::with_files([("./hello.js", "nothing();")]);
    let mut cache = ModuleCache::new();
    let (_sink, interp) = recording_interpreter();

    let err = run(&store, "./hello.js", &mut cache, &interp)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Runtime(_)));
    assert_eq!(err.to_string(), "nothing is not defined");
}
