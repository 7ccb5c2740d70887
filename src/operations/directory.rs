use tracing::debug;

use crate::error::{OperationKind, Result, TransportError};
use crate::remote::FileTransfer;

/// Creates a single remote directory; parents are not created
pub(crate) async fn make_directory<F: FileTransfer>(sftp: &F, remote_dir: &str) -> Result<()> {
    debug!("mkdir {:?}", remote_dir);
    sftp.make_dir(remote_dir)
        .await
        .map_err(|e| TransportError::operation(OperationKind::MakeDirectory, remote_dir, e))
}

/// Removes a remote directory, which the server requires to be empty
pub(crate) async fn delete_directory<F: FileTransfer>(sftp: &F, remote_dir: &str) -> Result<()> {
    debug!("rmdir {:?}", remote_dir);
    sftp.remove_dir(remote_dir)
        .await
        .map_err(|e| TransportError::operation(OperationKind::DeleteDirectory, remote_dir, e))
}
