//! Seams to the secure-shell and file-transfer collaborators.
//!
//! The production implementations live in [`crate::session`]; anything that can
//! connect, open an sftp subsystem and report termination can back a transport.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::BoxError;
use crate::types::{ConnectionSettings, RemoteEntry};

/// Readable byte stream bound to a remote file
pub type RemoteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Writable byte stream bound to a remote file
pub type RemoteWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Stream of directory entries as delivered by the server
pub type EntryStream = BoxStream<'static, Result<RemoteEntry, BoxError>>;

/// Establishes authenticated ssh sessions
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: SecureShell;

    /// Connects and authenticates; resolves once the session is ready
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Self::Session, BoxError>;
}

/// An authenticated ssh session
#[async_trait]
pub trait SecureShell: Send + Sync + 'static {
    type Channel: FileTransfer;

    /// Opens the sftp subsystem on this session
    async fn open_file_transfer(&self) -> Result<Self::Channel, BoxError>;

    /// Resolves when the session terminates, with the error that ended it if any
    async fn closed(&self) -> Result<(), BoxError>;

    /// Ends the session and waits for it to close
    async fn end(self) -> Result<(), BoxError>;
}

/// An sftp session multiplexed over a [`SecureShell`]
#[async_trait]
pub trait FileTransfer: Send + Sync + 'static {
    type Directory: Send;

    async fn open_dir(&self, path: &str) -> Result<Self::Directory, BoxError>;

    fn read_dir(&self, dir: Self::Directory) -> EntryStream;

    async fn make_dir(&self, path: &str) -> Result<(), BoxError>;

    async fn remove_dir(&self, path: &str) -> Result<(), BoxError>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader, BoxError>;

    async fn open_write(&self, path: &str) -> Result<RemoteWriter, BoxError>;

    async fn unlink(&self, path: &str) -> Result<(), BoxError>;

    /// Resolves when the subsystem terminates, with the error that ended it if any
    async fn closed(&self) -> Result<(), BoxError>;

    /// Ends the subsystem and waits for it to close
    async fn end(self) -> Result<(), BoxError>;
}
