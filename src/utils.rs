use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::remote::{FileTransfer, SecureShell};
use crate::types::{Fault, FaultHandler};

/// How often a live session is checked for liveness
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Routine to check the underlying SSH connection is active or not for the SFTP client.
/// This function runs in a loop, checking the connection every [`KEEPALIVE_INTERVAL`].
/// It will continue indefinitely until the connection fails.
pub fn check_connection<'session>(
    session: &'session openssh::Session,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<(), openssh::Error>> + Send + Sync + 'session>,
> {
    Box::pin(async move {
        loop {
            tokio::time::sleep(KEEPALIVE_INTERVAL).await;
            session.check().await?;
        }
        #[allow(unreachable_code)]
        Ok(())
    })
}

/// Default [`FaultHandler`]: reports every fault at error level
pub fn log_fault(fault: &Fault) {
    match fault {
        Fault::SessionError(e) => error!("ssh error: {e}"),
        Fault::SessionEnded => error!("ssh connection closed unexpectedly"),
        Fault::SubchannelError(e) => error!("sftp error: {e}"),
        Fault::SubchannelEnded => error!("sftp connection closed unexpectedly"),
    }
}

/// Unexpected-termination observers attached to the ssh session and its sftp subsystem
#[derive(Debug, Default)]
pub(crate) struct Observers {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn watch_session<S: SecureShell>(&mut self, session: Arc<S>, faults: FaultHandler) {
        let token = self.token.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                result = session.closed() => {
                    if let Err(e) = result {
                        faults(&Fault::SessionError(e.to_string()));
                    }
                    faults(&Fault::SessionEnded);
                }
            }
        }));
    }

    pub(crate) fn watch_channel<F: FileTransfer>(&mut self, sftp: Arc<F>, faults: FaultHandler) {
        let token = self.token.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                result = sftp.closed() => {
                    if let Err(e) = result {
                        faults(&Fault::SubchannelError(e.to_string()));
                    }
                    faults(&Fault::SubchannelEnded);
                }
            }
        }));
    }

    /// Stops every observer and waits until they have released their sessions
    pub(crate) async fn deregister(&mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("lifecycle observer panicked: {e}");
                }
            }
        }
    }
}

impl Drop for Observers {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
