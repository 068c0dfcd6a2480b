//! Pipeline error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// A declared dependency could not be found under any root/extension
    #[error("cannot resolve '{specifier}' imported from {importer}")]
    Unresolved { importer: String, specifier: String },

    /// A configured entry point does not exist
    #[error("entry point '{name}' points to a missing file: {}", path.display())]
    MissingEntry { name: String, path: PathBuf },

    /// Reading a source file failed
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A per-module transform failed
    #[error("transform '{transform}' failed for {module}: {message}")]
    Transform {
        module: String,
        transform: String,
        message: String,
    },

    /// Configuration rejected while preparing the pipeline
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Writing the output directory failed
    #[error("failed to write {}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
