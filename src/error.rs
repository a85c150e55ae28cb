//! Errors raised by the build core.  All of them abort the current build
//! invocation; nothing is retried.

use crate::path::Identity;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unknown file type: {identity}")]
    UnknownArtifactType { identity: Identity },

    #[error("no builder to make {identity} (missing {})", .location.display())]
    MissingInput { identity: Identity, location: PathBuf },

    #[error("builder redefinition for {output}: already produced by {existing}")]
    BuilderConflict { output: Identity, existing: String },

    #[error("{builder} failed to build {output}: {cause:#}")]
    ExecutionFailed {
        builder: String,
        output: Identity,
        cause: anyhow::Error,
    },

    #[error("{output} wasn't created by {builder}")]
    OutputNotProduced { builder: String, output: Identity },

    #[error("cannot reload dependency {identity} of set {set:?}: {cause:#}")]
    StaleDependencyReadError {
        set: String,
        identity: Identity,
        cause: anyhow::Error,
    },

    #[error("{builder}: no handler registered for dependency set {set:?}")]
    UnknownDependencySet { builder: String, set: String },

    #[error("dependency set name {set:?} is reserved for static sources")]
    ReservedSetName { set: String },

    #[error("dependency cycle through {builder}")]
    DependencyCycle { builder: String },

    #[error("{builder} already failed in this build")]
    AlreadyFailed { builder: String },

    #[error("{}:{line}: corrupt ledger: {msg}", .path.display())]
    CorruptLedger {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("builder declares no outputs")]
    EmptyOutputs,

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Attaches a path to an io::Error.
pub(crate) fn io_err(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
