//! File metadata and path canonicalization.
//!
//! Every file path is mapped to a stable canonical name that doubles as a
//! generated-code identifier and as the module cache key. The mapping is a
//! pure function of the path: the uppercased file stem keeps generated code
//! readable, and a SHA-256 suffix keeps distinct paths distinct even when
//! their stems collide (`./a/util.js` vs `./b/util.js`).

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Reserved export-map key for a module's default export.
pub const DEFAULT_EXPORT: &str = "___default";

lazy_static! {
    /// Runs of characters that cannot appear in an identifier fragment.
    static ref NON_IDENT_RE: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
}

/// Mapping from exported name to the local binding that holds the value.
///
/// Insertion-ordered, mirroring JavaScript object key order: the generated
/// export object literal lists entries in the order the export statements
/// appeared in the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportMap {
    entries: Vec<(String, String)>,
}

impl Serialize for ExportMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (exported, local) in &self.entries {
            map.serialize_entry(exported, local)?;
        }
        map.end()
    }
}

impl ExportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `exported -> local`, replacing any earlier entry for `exported`.
    pub fn set(&mut self, exported: &str, local: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == exported) {
            entry.1 = local.to_string();
        } else {
            self.entries.push((exported.to_string(), local.to_string()));
        }
    }

    pub fn get(&self, exported: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == exported)
            .map(|(_, local)| local.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, local)| (name.as_str(), local.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-file record accumulated while compiling that file.
///
/// Created empty by [`canonicalize`]; the rewriter fills `deps` (one entry
/// per import statement, in source order, duplicates preserved) and
/// `exports` as side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetaData {
    pub path: String,
    pub canonical_name: String,
    pub deps: Vec<FileMetaData>,
    pub exports: ExportMap,
}

/// Map a file path to a fresh metadata record.
///
/// Pure and total: the same path always yields the same canonical name, and
/// distinct paths yield distinct names. Does not consult the module cache;
/// compiled-unit identity lives there, not here.
pub fn canonicalize(path: &str) -> FileMetaData {
    FileMetaData {
        path: path.to_string(),
        canonical_name: canonical_name(path),
        deps: Vec::new(),
        exports: ExportMap::new(),
    }
}

fn canonical_name(path: &str) -> String {
    let stem = file_stem(path);
    let slug = NON_IDENT_RE
        .replace_all(&stem.to_uppercase(), "_")
        .trim_matches('_')
        .to_string();

    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let digest = format!("{:X}", hasher.finalize());

    if slug.is_empty() {
        format!("_{}", &digest[..6])
    } else {
        format!("_{}_{}", slug, &digest[..6])
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_is_stable() {
        assert_eq!(
            canonicalize("./hello.js").canonical_name,
            canonicalize("./hello.js").canonical_name
        );
    }

    #[test]
    fn canonical_name_starts_with_stem_slug() {
        let name = canonicalize("./welcome.js").canonical_name;
        assert!(name.starts_with("_WELCOME_"), "got {}", name);
    }

    #[test]
    fn distinct_paths_get_distinct_names() {
        let a = canonicalize("./a/util.js").canonical_name;
        let b = canonicalize("./b/util.js").canonical_name;
        assert_ne!(a, b);
        // Same stem, so only the digest suffix distinguishes them.
        assert!(a.starts_with("_UTIL_"));
        assert!(b.starts_with("_UTIL_"));
    }

    #[test]
    fn canonical_name_is_an_identifier() {
        for path in ["./hello.js", "./modules/dep-1.js", "./weird name.mjs"] {
            let name = canonicalize(path).canonical_name;
            assert!(name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'));
            assert!(name.starts_with('_'));
        }
    }

    #[test]
    fn fresh_metadata_is_empty() {
        let meta = canonicalize("./hello.js");
        assert_eq!(meta.path, "./hello.js");
        assert!(meta.deps.is_empty());
        assert!(meta.exports.is_empty());
    }

    #[test]
    fn export_map_preserves_insertion_order_and_replaces() {
        let mut exports = ExportMap::new();
        exports.set("value", "value");
        exports.set(DEFAULT_EXPORT, "counter");
        exports.set("value", "renamed");

        let entries: Vec<_> = exports.iter().collect();
        assert_eq!(entries, vec![("value", "renamed"), (DEFAULT_EXPORT, "counter")]);
        assert_eq!(exports.get(DEFAULT_EXPORT), Some("counter"));
        assert_eq!(exports.get("missing"), None);
    }
}
