use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by the ssh/sftp collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Remote operation that produced an [`TransportError::Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    OpenDirectory,
    ReadDirectory,
    MakeDirectory,
    DeleteDirectory,
    ReadFile,
    WriteFile,
    DeleteFile,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::OpenDirectory => "opendir",
            OperationKind::ReadDirectory => "readdir",
            OperationKind::MakeDirectory => "mkdir",
            OperationKind::DeleteDirectory => "rmdir",
            OperationKind::ReadFile => "read",
            OperationKind::WriteFile => "write",
            OperationKind::DeleteFile => "unlink",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Private key could not be read at construction time
    #[error("failed to read private key {path:?}: {source}")]
    CredentialLoad { path: PathBuf, source: io::Error },

    #[error("configuration error: {0}")]
    Config(String),

    /// Outer ssh connection failed to establish or authenticate
    #[error("ssh connection failed: {0}")]
    Connection(#[source] BoxError),

    /// The sftp subsystem failed to open on a ready ssh connection
    #[error("failed to open sftp subsystem: {0}")]
    SubchannelOpen(#[source] BoxError),

    /// A directory or file operation failed; `source` is the error reported by sftp
    #[error("{op} {path} failed: {source}")]
    Operation {
        op: OperationKind,
        path: String,
        source: BoxError,
    },

    #[error("transport is not ready")]
    NotReady,

    #[error("transport has already been set up")]
    AlreadySetUp,

    #[error("failed to close transport: {0}")]
    Teardown(#[source] BoxError),
}

impl TransportError {
    pub(crate) fn operation(op: OperationKind, path: &str, source: BoxError) -> Self {
        TransportError::Operation {
            op,
            path: path.to_string(),
            source,
        }
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotReady => io::Error::new(io::ErrorKind::NotConnected, err),
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
