use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{OperationKind, Result, TransportError};
use crate::remote::FileTransfer;

/// Copies `source` into a newly created remote file
///
/// The returned future completes once, after the remote file has been flushed
/// and shut down or at the first failure. `expected_size` is informational only.
///
/// # Errors
///
/// Returns an error if:
/// - The remote file cannot be created
/// - Reading `source` or writing the remote file fails
/// - The final flush of the remote file fails
pub(crate) async fn put_file<F: FileTransfer>(
    sftp: &F,
    remote_path: &str,
    expected_size: u64,
    source: &mut (dyn AsyncRead + Unpin + Send),
) -> Result<()> {
    let upload_time = Instant::now();
    let write_error = |e: std::io::Error| {
        TransportError::operation(OperationKind::WriteFile, remote_path, e.into())
    };

    let mut remote_file = sftp
        .open_write(remote_path)
        .await
        .map_err(|e| TransportError::operation(OperationKind::WriteFile, remote_path, e))?;
    debug!("Remote file created path: {:?}", remote_path);

    let copied = tokio::io::copy(source, &mut remote_file)
        .await
        .map_err(write_error)?;
    remote_file.shutdown().await.map_err(write_error)?;

    info!(
        "File {:?} uploaded, {} bytes (expected {}). Time taken {:?}",
        remote_path,
        copied,
        expected_size,
        upload_time.elapsed(),
    );
    Ok(())
}
