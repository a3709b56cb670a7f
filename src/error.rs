//! Error taxonomy for the bundler pipeline.
//!
//! A run either fully compiles and executes or aborts with the first error
//! encountered in depth-first dependency order. There are no retries and no
//! partial-success mode.

use crate::interp::RuntimeError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced module path could not be found in the file store.
    #[error("module {path} does not exist")]
    ModuleNotFound { path: String },

    /// The source text of a module could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// The module uses syntax outside the executable subset.
    #[error("unsupported syntax in {path}: {construct}")]
    Unsupported { path: String, construct: String },

    /// A non-not-found failure reported by the file store.
    #[error(transparent)]
    Store(StoreError),

    /// A fault raised while executing the compiled graph.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<StoreError> for Error {
    /// Store "not found" conditions become [`Error::ModuleNotFound`] carrying
    /// the offending path; every other store failure propagates unchanged.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { path } => Error::ModuleNotFound { path },
            other => Error::Store(other),
        }
    }
}
