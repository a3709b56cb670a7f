//! Compiled-module cache.
//!
//! Maps canonical names to compiled units for the duration of one run. The
//! cache memoizes *compilation* only; the runner re-executes a cached module
//! once per reference. One instance is shared by the compiler and runner of
//! a run and reset at the start of the next, so re-running with modified
//! sources never observes stale compiled units.

use std::collections::HashMap;

use crate::compile::ModuleDef;

#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<String, ModuleDef>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, canonical_name: &str) -> Option<&ModuleDef> {
        self.modules.get(canonical_name)
    }

    pub fn set(&mut self, canonical_name: String, module: ModuleDef) {
        self.modules.insert(canonical_name, module);
    }

    pub fn contains(&self, canonical_name: &str) -> bool {
        self.modules.contains_key(canonical_name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Discard every entry. Called once per top-level run.
    pub fn reset(&mut self) {
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ModuleFn;

    fn empty_module() -> ModuleDef {
        ModuleDef {
            module: ModuleFn::synthesize(&[], "return {};", "./test.js").unwrap(),
            deps: Vec::new(),
        }
    }

    #[test]
    fn set_then_get() {
        let mut cache = ModuleCache::new();
        assert!(cache.get("_HELLO_000000").is_none());

        cache.set("_HELLO_000000".to_string(), empty_module());
        assert!(cache.contains("_HELLO_000000"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reset_discards_everything() {
        let mut cache = ModuleCache::new();
        cache.set("_A_000000".to_string(), empty_module());
        cache.set("_B_000000".to_string(), empty_module());
        assert_eq!(cache.len(), 2);

        cache.reset();
        assert!(cache.is_empty());
        assert!(cache.get("_A_000000").is_none());
    }
}
