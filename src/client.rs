use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, error, info};

use crate::env::{Environment, ProcessEnvironment};
use crate::error::{BoxError, Result, TransportError};
use crate::operations::{directory, download, file, list, upload};
use crate::remote::{Connector, FileTransfer, RemoteReader, SecureShell};
use crate::session::OpensshConnector;
use crate::types::{ConnectionSettings, Fault, FaultHandler, TransportOptions};
use crate::utils::{Observers, log_fault};

/// sftp channel type opened by the sessions of connector `C`
type Channel<C> = <<C as Connector>::Session as SecureShell>::Channel;

enum State<S: SecureShell> {
    Constructed,
    Ready(Live<S>),
    Terminal,
}

/// Sessions held while the transport is ready
struct Live<S: SecureShell> {
    session: Arc<S>,
    sftp: Arc<S::Channel>,
    observers: Observers,
}

/// Remote filesystem reached over ssh and sftp
///
/// `setup` connects the ssh session and then opens the sftp subsystem on it;
/// `cleanup` closes them in reverse order. Directory and file operations are
/// only available in between.
pub struct SftpTransport<C: Connector = OpensshConnector> {
    settings: ConnectionSettings,
    connector: C,
    faults: FaultHandler,
    state: State<C::Session>,
}

impl SftpTransport<OpensshConnector> {
    /// Creates a transport backed by the system `ssh` binary
    ///
    /// Defaults are taken from the process environment and the private key,
    /// if any, is read before this returns.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut transport = SftpTransport::new(TransportOptions::new("example.com"))?;
    /// transport.setup().await?;
    /// ```
    pub fn new(options: TransportOptions) -> Result<Self> {
        Self::with_connector(options, OpensshConnector::default(), &ProcessEnvironment)
    }
}

impl<C: Connector> SftpTransport<C> {
    /// Creates a transport that connects through `connector`, resolving
    /// defaults from `env`
    pub fn with_connector(
        options: TransportOptions,
        connector: C,
        env: &dyn Environment,
    ) -> Result<Self> {
        let settings = ConnectionSettings::resolve(options, env)?;
        Ok(Self {
            settings,
            connector,
            faults: Arc::new(log_fault),
            state: State::Constructed,
        })
    }

    /// Replaces the handler receiving unexpected-termination faults
    pub fn with_fault_handler(
        mut self,
        handler: impl Fn(&Fault) + Send + Sync + 'static,
    ) -> Self {
        self.faults = Arc::new(handler);
        self
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    fn sftp(&self) -> Result<&Arc<Channel<C>>> {
        match &self.state {
            State::Ready(live) => Ok(&live.sftp),
            _ => Err(TransportError::NotReady),
        }
    }

    /// Connects the ssh session and opens the sftp subsystem on it
    ///
    /// Only one setup is allowed per transport, whatever its outcome. If the
    /// sftp subsystem cannot be opened the ssh session is closed again before
    /// the error is returned.
    pub async fn setup(&mut self) -> Result<()> {
        if !matches!(self.state, State::Constructed) {
            return Err(TransportError::AlreadySetUp);
        }
        self.state = State::Terminal;

        let session = self.connector.connect(&self.settings).await.map_err(|e| {
            error!("ssh connection to {:?} failed: {}", self.settings.host, e);
            TransportError::Connection(e)
        })?;
        debug!("ssh ready");

        let session = Arc::new(session);
        let mut observers = Observers::new();
        observers.watch_session(session.clone(), self.faults.clone());

        let sftp = match session.open_file_transfer().await {
            Ok(sftp) => Arc::new(sftp),
            Err(e) => {
                error!("failed to open sftp subsystem: {e}");
                observers.deregister().await;
                if let Err(close_err) = end_session(session).await {
                    error!("failed to close ssh session: {close_err}");
                }
                return Err(TransportError::SubchannelOpen(e));
            }
        };
        debug!("sftp open");
        observers.watch_channel(sftp.clone(), self.faults.clone());

        self.state = State::Ready(Live {
            session,
            sftp,
            observers,
        });
        Ok(())
    }

    /// Closes the sftp subsystem and then the ssh session, waiting for both
    ///
    /// Observers are removed first so the intentional close is not reported as
    /// a fault. The ssh session is closed even when closing sftp fails; the
    /// first error is returned.
    pub async fn cleanup(&mut self) -> Result<()> {
        let live = match std::mem::replace(&mut self.state, State::Terminal) {
            State::Ready(live) => live,
            other => {
                self.state = other;
                return Err(TransportError::NotReady);
            }
        };
        let Live {
            session,
            sftp,
            mut observers,
        } = live;
        observers.deregister().await;

        let sftp_closed = end_channel(sftp).await;
        if let Err(e) = &sftp_closed {
            error!("failed to close sftp subsystem: {e}");
        }
        let ssh_closed = end_session(session).await;
        if let Err(e) = &ssh_closed {
            error!("failed to close ssh session: {e}");
        }

        info!("Closed connection to {:?}", self.settings.host);
        sftp_closed.and(ssh_closed).map_err(TransportError::Teardown)
    }

    /// Lists a remote directory; directory names end with `/`
    pub async fn list_directory(&self, remote_dir: &str) -> Result<Vec<String>> {
        list::list_directory(&**self.sftp()?, remote_dir).await
    }

    pub async fn make_directory(&self, remote_dir: &str) -> Result<()> {
        directory::make_directory(&**self.sftp()?, remote_dir).await
    }

    pub async fn delete_directory(&self, remote_dir: &str) -> Result<()> {
        directory::delete_directory(&**self.sftp()?, remote_dir).await
    }

    /// Returns a reader over a remote file; all failures surface through the reader
    pub fn create_read_stream(&self, remote_path: &str) -> RemoteReader {
        match self.sftp() {
            Ok(sftp) => download::read_stream(Arc::downgrade(sftp), remote_path),
            Err(e) => download::failed_stream(e),
        }
    }

    /// Uploads everything `source` yields to `remote_path`
    pub async fn put_file(
        &self,
        remote_path: &str,
        expected_size: u64,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<()> {
        upload::put_file(&**self.sftp()?, remote_path, expected_size, source).await
    }

    pub async fn delete_file(&self, remote_path: &str) -> Result<()> {
        file::delete_file(&**self.sftp()?, remote_path).await
    }
}

async fn end_channel<F: FileTransfer>(sftp: Arc<F>) -> std::result::Result<(), BoxError> {
    match Arc::try_unwrap(sftp) {
        Ok(sftp) => sftp.end().await,
        Err(_) => Err("sftp subsystem is still in use".into()),
    }
}

async fn end_session<S: SecureShell>(session: Arc<S>) -> std::result::Result<(), BoxError> {
    match Arc::try_unwrap(session) {
        Ok(session) => session.end().await,
        Err(_) => Err("ssh session is still in use".into()),
    }
}

impl<C: Connector> fmt::Debug for SftpTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Constructed => "constructed",
            State::Ready(_) => "ready",
            State::Terminal => "terminal",
        };
        f.debug_struct("SftpTransport")
            .field("settings", &self.settings)
            .field("state", &state)
            .finish()
    }
}
