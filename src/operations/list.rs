use futures::stream::StreamExt;
use tracing::{debug, warn};

use crate::error::{OperationKind, Result, TransportError};
use crate::remote::FileTransfer;

/// Lists the contents of a remote directory
///
/// Entries are returned in the order the server delivers them. `.` and `..`
/// are skipped and directory names carry a single trailing `/`.
///
/// # Errors
///
/// Returns an error if:
/// - The remote directory cannot be opened
/// - Reading the entries fails part way; entries gathered so far are discarded
pub(crate) async fn list_directory<F: FileTransfer>(
    sftp: &F,
    remote_dir: &str,
) -> Result<Vec<String>> {
    let dir = sftp
        .open_dir(remote_dir)
        .await
        .map_err(|e| TransportError::operation(OperationKind::OpenDirectory, remote_dir, e))?;

    let mut dir_stream = sftp.read_dir(dir);
    let mut names = Vec::new();
    let mut error = None;

    while let Some(entry) = dir_stream.next().await {
        match entry {
            Ok(entry) => {
                if entry.filename == "." || entry.filename == ".." {
                    continue;
                }
                if entry.is_directory() {
                    names.push(format!("{}/", entry.filename.trim_end_matches('/')));
                } else {
                    names.push(entry.filename);
                }
            }
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    if let Some(e) = error {
        warn!(
            "readdir {:?} failed after {} entries, discarding partial listing",
            remote_dir,
            names.len()
        );
        return Err(TransportError::operation(
            OperationKind::ReadDirectory,
            remote_dir,
            e,
        ));
    }

    debug!("Listed {} entries in {:?}", names.len(), remote_dir);
    Ok(names)
}
