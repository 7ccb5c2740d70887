use bytes::Bytes;
use futures::future;
use futures::stream::{self, TryStreamExt};
use std::io;
use std::sync::Weak;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

use crate::error::{OperationKind, TransportError};
use crate::remote::{FileTransfer, RemoteReader};

/// Returns a reader over a remote file
///
/// The file is opened on the first read, so failing to open it is reported
/// as a read error on the returned stream. The reader does not keep the sftp
/// subsystem alive; once the transport is cleaned up it fails with `NotReady`.
pub(crate) fn read_stream<F: FileTransfer>(sftp: Weak<F>, remote_path: &str) -> RemoteReader {
    let remote_path = remote_path.to_string();
    let chunks = stream::once(async move {
        let Some(sftp) = sftp.upgrade() else {
            return Err(io::Error::from(TransportError::NotReady));
        };
        debug!("Opening remote file for reading: {:?}", remote_path);
        sftp.open_read(&remote_path)
            .await
            .map(ReaderStream::new)
            .map_err(|e| {
                io::Error::from(TransportError::operation(
                    OperationKind::ReadFile,
                    &remote_path,
                    e,
                ))
            })
    })
    .try_flatten();
    Box::pin(StreamReader::new(chunks))
}

/// Reader whose first read fails with `err`
pub(crate) fn failed_stream(err: TransportError) -> RemoteReader {
    let chunks = stream::once(future::ready(Err::<Bytes, io::Error>(err.into())));
    Box::pin(StreamReader::new(chunks))
}
