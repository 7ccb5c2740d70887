use tracing::debug;

use crate::error::{OperationKind, Result, TransportError};
use crate::remote::FileTransfer;

pub(crate) async fn delete_file<F: FileTransfer>(sftp: &F, remote_path: &str) -> Result<()> {
    debug!("unlink {:?}", remote_path);
    sftp.unlink(remote_path)
        .await
        .map_err(|e| TransportError::operation(OperationKind::DeleteFile, remote_path, e))
}
