use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::env::Environment;
use crate::error::{Result, TransportError};

/// Default ssh port
pub const DEFAULT_PORT: u16 = 22;

/// Default time allowed for the ssh handshake, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Mask selecting the file-type bits of a mode
pub const S_IFMT: u32 = 0o170000;
/// Directory file type
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type
pub const S_IFREG: u32 = 0o100000;
/// Symbolic link file type
pub const S_IFLNK: u32 = 0o120000;

/// Host key verification policy handed to ssh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownHostsPolicy {
    Strict,
    #[default]
    Add,
    Accept,
}

/// Options recognized by the sftp transport, as supplied by the option-parsing layer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    /// ssh agent socket
    pub agent: Option<PathBuf>,
    /// Path to a private key, read when the transport is constructed
    pub private_key: Option<PathBuf>,
    /// Directory for ssh control sockets
    pub control_directory: Option<PathBuf>,
    /// Connect timeout in seconds
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub known_hosts: KnownHostsPolicy,
}

impl TransportOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Parses an options document such as `{"host": "example.com", "privateKey": "~/.ssh/id"}`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TransportError::Config(e.to_string()))
    }
}

/// Describes one recognized option key for help output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// The option keys understood by the sftp transport
pub const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        name: "host",
        required: true,
        description: "hostname",
    },
    OptionDescriptor {
        name: "port",
        required: false,
        description: "port (default: 22)",
    },
    OptionDescriptor {
        name: "privateKey",
        required: false,
        description: "path to private key",
    },
    OptionDescriptor {
        name: "username",
        required: false,
        description: "username (default: $USER)",
    },
    OptionDescriptor {
        name: "agent",
        required: false,
        description: "ssh agent socket (default: $SSH_AUTH_SOCK)",
    },
];

/// Private key material loaded from disk
#[derive(Clone)]
pub struct PrivateKey {
    path: PathBuf,
    material: Arc<[u8]>,
}

impl PrivateKey {
    /// Reads the key synchronously; this is the only failure not reported through a future
    pub fn load(path: &Path) -> Result<Self> {
        let material = std::fs::read(path).map_err(|source| TransportError::CredentialLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            material: material.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("path", &self.path)
            .field("len", &self.material.len())
            .finish()
    }
}

/// Connection parameters resolved once at construction
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// `None` leaves the choice to ssh, which uses the login user
    pub username: Option<String>,
    pub agent: Option<PathBuf>,
    pub private_key: Option<PrivateKey>,
    pub control_directory: PathBuf,
    pub connect_timeout: Duration,
    pub known_hosts: KnownHostsPolicy,
}

impl ConnectionSettings {
    pub fn resolve(options: TransportOptions, env: &dyn Environment) -> Result<Self> {
        if options.host.trim().is_empty() {
            return Err(TransportError::Config("host is required".to_string()));
        }

        let username = options
            .username
            .filter(|u| !u.is_empty())
            .or_else(|| env.var("USER").filter(|u| !u.is_empty()));

        let agent = options
            .agent
            .filter(|a| !a.as_os_str().is_empty())
            .or_else(|| {
                env.var("SSH_AUTH_SOCK")
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
            });

        let private_key = options
            .private_key
            .as_deref()
            .map(PrivateKey::load)
            .transpose()?;

        Ok(Self {
            host: options.host,
            port: options.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
            username,
            agent,
            private_key,
            control_directory: options
                .control_directory
                .unwrap_or_else(std::env::temp_dir),
            connect_timeout: Duration::from_secs(
                options
                    .connect_timeout
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            known_hosts: options.known_hosts,
        })
    }
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub filename: String,
    /// Mode bits as reported by sftp, including the file-type bits
    pub mode: u32,
}

impl RemoteEntry {
    pub fn new(filename: impl Into<String>, mode: u32) -> Self {
        Self {
            filename: filename.into(),
            mode,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

/// Unexpected termination or asynchronous error on one of the two sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    SessionError(String),
    SessionEnded,
    SubchannelError(String),
    SubchannelEnded,
}

/// Receives faults raised by the lifecycle observers
pub type FaultHandler = Arc<dyn Fn(&Fault) + Send + Sync>;
