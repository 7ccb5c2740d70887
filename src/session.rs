use async_trait::async_trait;
use futures::StreamExt;
use openssh::{KnownHosts, SessionBuilder};
use openssh_sftp_client::file::TokioCompatFile;
use openssh_sftp_client::fs::Dir;
use openssh_sftp_client::{Sftp, SftpOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::BoxError;
use crate::remote::{
    Connector, EntryStream, FileTransfer, RemoteReader, RemoteWriter, SecureShell,
};
use crate::types::{
    ConnectionSettings, KnownHostsPolicy, PrivateKey, RemoteEntry, S_IFDIR, S_IFLNK, S_IFREG,
};
use crate::utils::{KEEPALIVE_INTERVAL, check_connection};

/// Connects through the system `ssh` binary using the `openssh` crate
#[derive(Debug, Default, Clone)]
pub struct OpensshConnector {
    sftp_options: SftpOptions,
}

impl OpensshConnector {
    /// Uses custom options for every sftp subsystem opened on connected sessions
    pub fn with_sftp_options(sftp_options: SftpOptions) -> Self {
        Self { sftp_options }
    }
}

fn known_hosts(policy: KnownHostsPolicy) -> KnownHosts {
    match policy {
        KnownHostsPolicy::Strict => KnownHosts::Strict,
        KnownHostsPolicy::Add => KnownHosts::Add,
        KnownHostsPolicy::Accept => KnownHosts::Accept,
    }
}

/// Writes the key loaded at construction to an owner-only file for `ssh -i`,
/// so later changes to the original key file have no effect
fn write_key_file(key: &PrivateKey, dir: &Path) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("sftp-transport-key-")
        .tempfile_in(dir)?;
    file.write_all(key.material())?;
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl Connector for OpensshConnector {
    type Session = OpensshSession;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<OpensshSession, BoxError> {
        info!(
            "Connecting to {:?}@{:?} port {}",
            settings.username.as_deref().unwrap_or("<login user>"),
            settings.host,
            settings.port
        );
        let mut builder = SessionBuilder::default();
        builder
            .port(settings.port)
            .control_directory(&settings.control_directory)
            .known_hosts_check(known_hosts(settings.known_hosts))
            .connect_timeout(settings.connect_timeout);
        if let Some(user) = &settings.username {
            builder.user(user.clone());
        }
        let key_file = match &settings.private_key {
            Some(key) => {
                let file = write_key_file(key, &settings.control_directory)?;
                builder.keyfile(file.path());
                Some(file)
            }
            None => None,
        };
        if let Some(agent) = &settings.agent {
            builder.ssh_auth_sock(agent);
        }

        let session = builder.connect(&settings.host).await?;
        Ok(OpensshSession {
            session: Arc::new(session),
            sftp_options: self.sftp_options.clone(),
            _key_file: key_file,
        })
    }
}

/// ssh master connection owned by a transport
#[derive(Debug)]
pub struct OpensshSession {
    session: Arc<openssh::Session>,
    sftp_options: SftpOptions,
    /// Removed when the session is ended or dropped
    _key_file: Option<NamedTempFile>,
}

#[async_trait]
impl SecureShell for OpensshSession {
    type Channel = SftpChannel;

    async fn open_file_transfer(&self) -> Result<SftpChannel, BoxError> {
        debug!("Creating sftp client from session");
        let sftp = Sftp::from_clonable_session_with_check_connection(
            self.session.clone(),
            self.sftp_options.clone(),
            check_connection, /* fails ongoing sftp requests once the master connection is gone */
        )
        .await?;
        Ok(SftpChannel { sftp })
    }

    async fn closed(&self) -> Result<(), BoxError> {
        check_connection(&self.session).await?;
        Ok(())
    }

    async fn end(self) -> Result<(), BoxError> {
        match Arc::try_unwrap(self.session) {
            Ok(session) => {
                session.close().await?;
                Ok(())
            }
            Err(_) => {
                // The remaining clone terminates the master when it is dropped
                warn!("ssh session still referenced by the sftp subsystem, dropping it");
                Ok(())
            }
        }
    }
}

/// sftp subsystem running over an [`OpensshSession`]
#[derive(Debug)]
pub struct SftpChannel {
    sftp: Sftp,
}

fn to_remote_entry(entry: openssh_sftp_client::fs::DirEntry) -> RemoteEntry {
    let mode = match entry.file_type() {
        Some(file_type) if file_type.is_dir() => S_IFDIR,
        Some(file_type) if file_type.is_symlink() => S_IFLNK,
        Some(file_type) if file_type.is_file() => S_IFREG,
        _ => 0,
    };
    RemoteEntry::new(entry.filename().to_string_lossy(), mode)
}

#[async_trait]
impl FileTransfer for SftpChannel {
    type Directory = Dir;

    async fn open_dir(&self, path: &str) -> Result<Dir, BoxError> {
        Ok(self.sftp.fs().open_dir(path).await?)
    }

    fn read_dir(&self, dir: Dir) -> EntryStream {
        dir.read_dir()
            .map(|entry| entry.map(to_remote_entry).map_err(BoxError::from))
            .boxed()
    }

    async fn make_dir(&self, path: &str) -> Result<(), BoxError> {
        Ok(self.sftp.fs().create_dir(path).await?)
    }

    async fn remove_dir(&self, path: &str) -> Result<(), BoxError> {
        Ok(self.sftp.fs().remove_dir(path).await?)
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, BoxError> {
        let file = self.sftp.open(path).await?;
        Ok(Box::pin(TokioCompatFile::from(file)))
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter, BoxError> {
        let file = self.sftp.create(path).await?;
        Ok(Box::pin(TokioCompatFile::from(file)))
    }

    async fn unlink(&self, path: &str) -> Result<(), BoxError> {
        Ok(self.sftp.fs().remove_file(path).await?)
    }

    /// Canonicalizes the remote working directory until a request fails
    async fn closed(&self) -> Result<(), BoxError> {
        loop {
            tokio::time::sleep(KEEPALIVE_INTERVAL).await;
            self.sftp.fs().canonicalize(".").await?;
        }
    }

    async fn end(self) -> Result<(), BoxError> {
        self.sftp.close().await?;
        Ok(())
    }
}
