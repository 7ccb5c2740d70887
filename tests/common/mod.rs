//! In-memory ssh/sftp doubles recording the calls made on them

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use sftp_transport::{
    BoxError, ConnectionSettings, Connector, EntryStream, Fault, FileTransfer, RemoteEntry,
    RemoteReader, RemoteWriter, S_IFDIR, S_IFREG, SecureShell, SftpTransport, TransportOptions,
};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Ended,
    Failed(String),
}

/// Behaviour of the fake server
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub connect_error: Option<String>,
    pub sftp_error: Option<String>,
    pub sftp_close_error: Option<String>,
    pub dirs: HashMap<String, Vec<Result<RemoteEntry, String>>>,
    pub files: HashMap<String, Vec<u8>>,
    /// Failures keyed by `(operation, path)`, e.g. `("rmdir", "/nonempty")`
    pub failures: HashMap<(String, String), String>,
}

impl Script {
    pub fn dir(mut self, path: &str, entries: Vec<Result<RemoteEntry, String>>) -> Self {
        self.dirs.insert(path.to_string(), entries);
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn fail(mut self, op: &str, path: &str, message: &str) -> Self {
        self.failures
            .insert((op.to_string(), path.to_string()), message.to_string());
        self
    }
}

pub fn file(name: &str) -> Result<RemoteEntry, String> {
    Ok(RemoteEntry::new(name, S_IFREG | 0o644))
}

pub fn dir(name: &str) -> Result<RemoteEntry, String> {
    Ok(RemoteEntry::new(name, S_IFDIR | 0o755))
}

/// State shared by the connector, its sessions and the test
pub struct Remote {
    script: Script,
    calls: Mutex<Vec<String>>,
    uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    next_writer: Mutex<Option<RemoteWriter>>,
    connect_key: Mutex<Option<Vec<u8>>>,
    ssh_liveness: watch::Sender<Liveness>,
    sftp_liveness: watch::Sender<Liveness>,
}

impl Remote {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
            uploads: Arc::new(Mutex::new(HashMap::new())),
            next_writer: Mutex::new(None),
            connect_key: Mutex::new(None),
            ssh_liveness: watch::Sender::new(Liveness::Alive),
            sftp_liveness: watch::Sender::new(Liveness::Alive),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploaded(&self, path: &str) -> Option<Vec<u8>> {
        self.uploads.lock().unwrap().get(path).cloned()
    }

    /// Private key bytes handed to the last `connect`
    pub fn connect_key(&self) -> Option<Vec<u8>> {
        self.connect_key.lock().unwrap().clone()
    }

    /// The next `open_write` hands out `writer` instead of recording the upload
    pub fn set_next_writer(&self, writer: RemoteWriter) {
        *self.next_writer.lock().unwrap() = Some(writer);
    }

    pub fn drop_ssh(&self, liveness: Liveness) {
        self.ssh_liveness.send_replace(liveness);
    }

    pub fn drop_sftp(&self, liveness: Liveness) {
        self.sftp_liveness.send_replace(liveness);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn outcome(&self, op: &str, path: &str) -> Result<(), BoxError> {
        self.record(format!("{op} {path}"));
        match self.script.failures.get(&(op.to_string(), path.to_string())) {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

async fn closed(liveness: &watch::Sender<Liveness>) -> Result<(), BoxError> {
    let mut rx = liveness.subscribe();
    let state = rx
        .wait_for(|s| *s != Liveness::Alive)
        .await
        .map(|s| s.clone());
    match state {
        Ok(Liveness::Failed(message)) => Err(message.into()),
        Ok(_) => Ok(()),
        // Sender gone: the session can no longer end
        Err(_) => std::future::pending().await,
    }
}

pub struct MockConnector {
    remote: Arc<Remote>,
}

pub struct MockSession {
    remote: Arc<Remote>,
}

pub struct MockSftp {
    remote: Arc<Remote>,
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MockSession, BoxError> {
        self.remote.record("connect");
        assert!(!settings.host.is_empty());
        *self.remote.connect_key.lock().unwrap() =
            settings.private_key.as_ref().map(|key| key.material().to_vec());
        match &self.remote.script.connect_error {
            Some(message) => {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, message.clone()).into())
            }
            None => Ok(MockSession {
                remote: self.remote.clone(),
            }),
        }
    }
}

#[async_trait]
impl SecureShell for MockSession {
    type Channel = MockSftp;

    async fn open_file_transfer(&self) -> Result<MockSftp, BoxError> {
        self.remote.record("open_sftp");
        match &self.remote.script.sftp_error {
            Some(message) => Err(message.clone().into()),
            None => Ok(MockSftp {
                remote: self.remote.clone(),
            }),
        }
    }

    async fn closed(&self) -> Result<(), BoxError> {
        closed(&self.remote.ssh_liveness).await
    }

    async fn end(self) -> Result<(), BoxError> {
        self.remote.record("ssh.end");
        self.remote.drop_ssh(Liveness::Ended);
        Ok(())
    }
}

/// Collects uploaded bytes under the remote path
struct RecordingWriter {
    path: String,
    uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.uploads
            .lock()
            .unwrap()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl FileTransfer for MockSftp {
    type Directory = String;

    async fn open_dir(&self, path: &str) -> Result<String, BoxError> {
        self.remote.outcome("opendir", path)?;
        if self.remote.script.dirs.contains_key(path) {
            Ok(path.to_string())
        } else {
            Err("no such file".into())
        }
    }

    fn read_dir(&self, dir: String) -> EntryStream {
        let entries = self.remote.script.dirs.get(&dir).cloned().unwrap_or_default();
        stream::iter(entries.into_iter().map(|entry| entry.map_err(BoxError::from))).boxed()
    }

    async fn make_dir(&self, path: &str) -> Result<(), BoxError> {
        self.remote.outcome("mkdir", path)
    }

    async fn remove_dir(&self, path: &str) -> Result<(), BoxError> {
        self.remote.outcome("rmdir", path)
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, BoxError> {
        self.remote.outcome("open_read", path)?;
        match self.remote.script.files.get(path) {
            Some(content) => Ok(Box::pin(io::Cursor::new(content.clone()))),
            None => Err("no such file".into()),
        }
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter, BoxError> {
        self.remote.outcome("open_write", path)?;
        if let Some(writer) = self.remote.next_writer.lock().unwrap().take() {
            return Ok(writer);
        }
        Ok(Box::pin(RecordingWriter {
            path: path.to_string(),
            uploads: self.remote.uploads.clone(),
        }))
    }

    async fn unlink(&self, path: &str) -> Result<(), BoxError> {
        self.remote.outcome("unlink", path)
    }

    async fn closed(&self) -> Result<(), BoxError> {
        closed(&self.remote.sftp_liveness).await
    }

    async fn end(self) -> Result<(), BoxError> {
        self.remote.record("sftp.end");
        self.remote.drop_sftp(Liveness::Ended);
        match &self.remote.script.sftp_close_error {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

pub fn env() -> HashMap<String, String> {
    HashMap::from([("USER".to_string(), "deploy".to_string())])
}

/// Builds a transport over `script`, collecting faults on the returned receiver
pub fn transport(
    script: Script,
) -> (
    SftpTransport<MockConnector>,
    Arc<Remote>,
    mpsc::UnboundedReceiver<Fault>,
) {
    transport_with(TransportOptions::new("h"), script)
}

/// Same as [`transport`] with caller-supplied options
pub fn transport_with(
    options: TransportOptions,
    script: Script,
) -> (
    SftpTransport<MockConnector>,
    Arc<Remote>,
    mpsc::UnboundedReceiver<Fault>,
) {
    let remote = Remote::new(script);
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = SftpTransport::with_connector(
        options,
        MockConnector {
            remote: remote.clone(),
        },
        &env(),
    )
    .unwrap()
    .with_fault_handler(move |fault| {
        let _ = tx.send(fault.clone());
    });
    (transport, remote, rx)
}

/// Same as [`transport`] with `setup` already completed
pub async fn ready_transport(
    script: Script,
) -> (
    SftpTransport<MockConnector>,
    Arc<Remote>,
    mpsc::UnboundedReceiver<Fault>,
) {
    let (mut transport, remote, rx) = transport(script);
    transport.setup().await.unwrap();
    (transport, remote, rx)
}

pub async fn next_fault(rx: &mut mpsc::UnboundedReceiver<Fault>) -> Fault {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no fault reported")
        .expect("fault channel closed")
}
