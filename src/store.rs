//! File store boundary.
//!
//! The bundler never touches the OS filesystem directly; it reads module
//! sources through [`FileStore`], which must distinguish "no such path" from
//! every other failure so the compiler can report a missing module by name.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No file exists for the given path.
    #[error("no file at {path}")]
    NotFound { path: String },

    /// Any other read failure.
    #[error("io error reading {path}: {message}")]
    Io { path: String, message: String },
}

/// Read access to module sources, keyed by the exact path strings that
/// appear in import statements and entry points.
///
/// The compiler is single-threaded; implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait FileStore {
    async fn read_file(&self, path: &str) -> StoreResult<String>;
}

/// In-memory file store: a map from path to source text.
///
/// Paths are opaque keys; `./hello.js` and `hello.js` are different files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<String, String>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: Into<String>,
    {
        let mut store = Self::new();
        for (path, source) in files {
            store.insert(path, source);
        }
        store
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Load every `.js`/`.mjs` file under `root` into a fresh store.
    ///
    /// Keys are `./`-prefixed paths relative to `root`, with forward slashes,
    /// matching the form import statements use.
    pub fn from_dir(root: &Path) -> StoreResult<Self> {
        let mut store = Self::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| StoreError::Io {
                path: root.display().to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_module = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("js") | Some("mjs")
            );
            if !is_module {
                continue;
            }

            let source = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let relative = path.strip_prefix(root).unwrap_or(path);
            let key = format!("./{}", relative.display().to_string().replace('\\', "/"));
            store.insert(key, source);
        }

        Ok(store)
    }
}

impl FileStore for MemoryFileStore {
    async fn read_file(&self, path: &str) -> StoreResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[tokio::test]
    async fn reads_existing_file() {
        let store = MemoryFileStore::with_files([("./hello.js", "console.info('x');")]);
        assert_eq!(
            store.read_file("./hello.js").await.unwrap(),
            "console.info('x');"
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let store = MemoryFileStore::new();
        let err = store.read_file("./welcome.js").await.unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                path: "./welcome.js".to_string()
            }
        );
    }

    #[test]
    fn from_dir_collects_module_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("modules");
        fs::create_dir_all(&nested).unwrap();

        let mut f = fs::File::create(dir.path().join("hello.js")).unwrap();
        f.write_all(b"console.info('hi');").unwrap();
        let mut g = fs::File::create(nested.join("dep.mjs")).unwrap();
        g.write_all(b"export const x = 1;").unwrap();
        let mut h = fs::File::create(dir.path().join("notes.txt")).unwrap();
        h.write_all(b"not a module").unwrap();

        let store = MemoryFileStore::from_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("./hello.js"));
        assert!(store.contains("./modules/dep.mjs"));
    }
}
