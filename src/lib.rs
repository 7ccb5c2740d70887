// Module declarations
mod client;
mod env;
mod error;
mod operations;
mod remote;
mod session;
mod transport;
mod types;
mod utils;

// Public API exports
pub use client::SftpTransport;
pub use env::{Environment, ProcessEnvironment};
pub use error::{BoxError, OperationKind, Result, TransportError};
pub use remote::{
    Connector, EntryStream, FileTransfer, RemoteReader, RemoteWriter, SecureShell,
};
pub use session::{OpensshConnector, OpensshSession, SftpChannel};
pub use transport::Transport;
pub use types::{
    ConnectionSettings, DEFAULT_PORT, Fault, FaultHandler, KnownHostsPolicy, OPTIONS,
    OptionDescriptor, PrivateKey, RemoteEntry, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG,
    TransportOptions,
};
pub use utils::{KEEPALIVE_INTERVAL, log_fault};

// Re-export commonly used external types for convenience
pub use openssh_sftp_client::SftpOptions;
