use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::client::SftpTransport;
use crate::error::Result;
use crate::remote::{Connector, RemoteReader};

/// Remote filesystem backend used by the sync tool
///
/// Backends are interchangeable: a transport is set up once, used for any
/// number of operations, then cleaned up. Paths are backend-native strings.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Brings the transport to the ready state
    async fn setup(&mut self) -> Result<()>;

    /// Releases every resource acquired by `setup`
    async fn cleanup(&mut self) -> Result<()>;

    /// Names in `dir`, with a trailing `/` on directories
    async fn list_directory(&self, dir: &str) -> Result<Vec<String>>;

    async fn make_directory(&self, dir: &str) -> Result<()>;

    async fn delete_directory(&self, dir: &str) -> Result<()>;

    /// Reader over `path`; errors are reported by the reader itself
    fn create_read_stream(&self, path: &str) -> RemoteReader;

    /// Writes the whole of `source` to `path`; `size` is a hint
    async fn put_file(
        &self,
        path: &str,
        size: u64,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;
}

#[async_trait]
impl<C: Connector> Transport for SftpTransport<C> {
    async fn setup(&mut self) -> Result<()> {
        SftpTransport::setup(self).await
    }

    async fn cleanup(&mut self) -> Result<()> {
        SftpTransport::cleanup(self).await
    }

    async fn list_directory(&self, dir: &str) -> Result<Vec<String>> {
        SftpTransport::list_directory(self, dir).await
    }

    async fn make_directory(&self, dir: &str) -> Result<()> {
        SftpTransport::make_directory(self, dir).await
    }

    async fn delete_directory(&self, dir: &str) -> Result<()> {
        SftpTransport::delete_directory(self, dir).await
    }

    fn create_read_stream(&self, path: &str) -> RemoteReader {
        SftpTransport::create_read_stream(self, path)
    }

    async fn put_file(
        &self,
        path: &str,
        size: u64,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<()> {
        SftpTransport::put_file(self, path, size, source).await
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        SftpTransport::delete_file(self, path).await
    }
}
