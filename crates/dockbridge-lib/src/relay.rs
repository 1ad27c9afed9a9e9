//! Proxy relay engine
//!
//! Listens on the local Unix socket and, for every accepted connection,
//! dials a fresh stream through the tunnel and copies bytes both ways until
//! either side is done.
//!
//! Each connection moves through `Accepted → Dialing → Relaying → Closed`.
//! A failed dial closes only that local connection. When either copy
//! direction finishes (EOF or error) both directions and both streams are
//! dropped; half-close is not preserved.

use async_trait::async_trait;
use dockbridge_transport::{BoxedStream, Dialer, TransportError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::RemoteError;

const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Per-connection failures. Logged, never propagated past the connection.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to dial {address}: {source}")]
    Dial {
        address: String,
        source: TransportError,
    },

    #[error("Relay IO error ({direction}): {source}")]
    Io {
        direction: Direction,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::LocalToRemote => write!(f, "local → remote"),
            Direction::RemoteToLocal => write!(f, "remote → local"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Dialing,
    Relaying,
    Closed,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub socket_path: PathBuf,
    /// Private address of the remote instance
    pub remote_host: String,
    pub remote_port: u16,
}

impl RelayConfig {
    pub fn remote_address(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }
}

/// Live counters for a relay server
#[derive(Debug, Default)]
pub struct RelayStats {
    accepted: AtomicU64,
    active: AtomicUsize,
    dial_failures: AtomicU64,
    bytes_to_remote: AtomicU64,
    bytes_to_local: AtomicU64,
}

impl RelayStats {
    /// Local connections accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Connection tasks that have not finished yet
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn dial_failures(&self) -> u64 {
        self.dial_failures.load(Ordering::Relaxed)
    }

    pub fn bytes_to_remote(&self) -> u64 {
        self.bytes_to_remote.load(Ordering::Relaxed)
    }

    pub fn bytes_to_local(&self) -> u64 {
        self.bytes_to_local.load(Ordering::Relaxed)
    }
}

/// Counts a connection task as active until dropped
struct ActiveGuard(Arc<RelayStats>);

impl ActiveGuard {
    fn new(stats: Arc<RelayStats>) -> Self {
        stats.active.fetch_add(1, Ordering::SeqCst);
        Self(stats)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct RelayServer {
    listener: UnixListener,
    config: RelayConfig,
    dialer: Arc<dyn Dialer>,
    stats: Arc<RelayStats>,
}

impl RelayServer {
    /// Bind the local socket. Must be called from within a Tokio runtime.
    pub fn bind(config: RelayConfig, dialer: Arc<dyn Dialer>) -> Result<Self, RemoteError> {
        let listener =
            UnixListener::bind(&config.socket_path).map_err(|source| RemoteError::Bind {
                path: config.socket_path.clone(),
                source,
            })?;

        info!(
            path = %config.socket_path.display(),
            remote = %config.remote_address(),
            "Relay listening"
        );

        Ok(Self {
            listener,
            config,
            dialer,
            stats: Arc::new(RelayStats::default()),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }

    /// Accept connections until `shutdown` is cancelled or accepting fails
    /// for good
    ///
    /// On return the listener is closed, the socket file is removed and
    /// every connection task has finished.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), RemoteError> {
        let RelayServer {
            listener,
            config,
            dialer,
            stats,
        } = self;

        let result = serve(listener, &config, dialer, &stats, &shutdown).await;
        remove_socket_file(&config.socket_path);

        debug!(
            accepted = stats.accepted(),
            dial_failures = stats.dial_failures(),
            bytes_to_remote = stats.bytes_to_remote(),
            bytes_to_local = stats.bytes_to_local(),
            "Relay stopped"
        );

        result
    }
}

/// Source of local connections for the accept loop
#[async_trait]
trait Accept: Send {
    async fn next_connection(&mut self) -> std::io::Result<UnixStream>;
}

#[async_trait]
impl Accept for UnixListener {
    async fn next_connection(&mut self) -> std::io::Result<UnixStream> {
        self.accept().await.map(|(stream, _)| stream)
    }
}

/// Run the accept loop, then close the acceptor and drain every connection
async fn serve<A: Accept>(
    mut acceptor: A,
    config: &RelayConfig,
    dialer: Arc<dyn Dialer>,
    stats: &Arc<RelayStats>,
    shutdown: &CancellationToken,
) -> Result<(), RemoteError> {
    let remote_host: Arc<str> = Arc::from(config.remote_host.as_str());
    let remote_port = config.remote_port;
    // Cancelled on every exit path, so connection tasks stop with the loop
    let connections_token = shutdown.child_token();
    let mut connections = JoinSet::new();

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, closing relay listener");
                break Ok(());
            }

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("Relay task panicked: {}", e);
                    }
                }
            }

            accepted = acceptor.next_connection() => {
                match accepted {
                    Ok(local) => {
                        stats.accepted.fetch_add(1, Ordering::Relaxed);
                        let guard = ActiveGuard::new(stats.clone());
                        let connection = RelayConnection {
                            id: uuid::Uuid::new_v4().to_string(),
                            local,
                            dialer: dialer.clone(),
                            remote_host: remote_host.clone(),
                            remote_port,
                            stats: stats.clone(),
                            cancel: connections_token.child_token(),
                        };
                        connections.spawn(async move {
                            let _guard = guard;
                            connection.run().await;
                        });
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!("Transient accept error on relay socket: {}", e);
                    }
                    Err(e) => {
                        error!("Failed to accept on relay socket: {}", e);
                        break Err(RemoteError::FatalProxy(e));
                    }
                }
            }
        }
    };

    drop(acceptor);
    connections_token.cancel();
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Relay task panicked: {}", e);
            }
        }
    }

    result
}

/// Closing a Unix listener leaves its file behind
fn remove_socket_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed socket file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove socket file {:?}: {}", path, e),
    }
}

fn is_transient_accept_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}

/// One accepted local connection and everything needed to serve it
struct RelayConnection {
    id: String,
    local: UnixStream,
    dialer: Arc<dyn Dialer>,
    remote_host: Arc<str>,
    remote_port: u16,
    stats: Arc<RelayStats>,
    cancel: CancellationToken,
}

impl RelayConnection {
    async fn run(self) {
        let RelayConnection {
            id,
            local,
            dialer,
            remote_host,
            remote_port,
            stats,
            cancel,
        } = self;

        debug!(connection_id = %id, state = ?ConnectionState::Accepted, "Local connection");
        debug!(connection_id = %id, state = ?ConnectionState::Dialing, "Dialing {}:{}", remote_host, remote_port);

        let dialed = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(connection_id = %id, state = ?ConnectionState::Closed, "Cancelled while dialing");
                return;
            }
            dialed = dialer.dial(&remote_host, remote_port) => dialed,
        };

        let remote = match dialed {
            Ok(remote) => remote,
            Err(source) => {
                stats.dial_failures.fetch_add(1, Ordering::Relaxed);
                let err = RelayError::Dial {
                    address: format!("{}:{}", remote_host, remote_port),
                    source,
                };
                warn!(connection_id = %id, state = ?ConnectionState::Closed, "{}", err);
                // Dropping `local` closes the client connection
                return;
            }
        };

        debug!(connection_id = %id, state = ?ConnectionState::Relaying, "Relaying");

        match relay(local, remote, &stats, &cancel).await {
            Ok(Some(direction)) => {
                debug!(connection_id = %id, state = ?ConnectionState::Closed, "{} reached end of stream", direction)
            }
            Ok(None) => {
                debug!(connection_id = %id, state = ?ConnectionState::Closed, "Relay cancelled")
            }
            Err(e) => {
                debug!(connection_id = %id, state = ?ConnectionState::Closed, "{}", e)
            }
        }
    }
}

/// Copy both directions until one finishes, then drop everything
///
/// Returns the direction that reached end of stream, or `None` if cancelled.
async fn relay(
    local: UnixStream,
    remote: BoxedStream,
    stats: &RelayStats,
    cancel: &CancellationToken,
) -> Result<Option<Direction>, RelayError> {
    let (mut local_read, mut local_write) = local.into_split();
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let to_remote = pump(&mut local_read, &mut remote_write, &stats.bytes_to_remote);
    let to_local = pump(&mut remote_read, &mut local_write, &stats.bytes_to_local);

    tokio::select! {
        _ = cancel.cancelled() => Ok(None),
        result = to_remote => result
            .map(|_| Some(Direction::LocalToRemote))
            .map_err(|source| RelayError::Io { direction: Direction::LocalToRemote, source }),
        result = to_local => result
            .map(|_| Some(Direction::RemoteToLocal))
            .map_err(|source| RelayError::Io { direction: Direction::RemoteToLocal, source }),
    }
}

/// Copy `reader` into `writer` until EOF, counting bytes as they go
async fn pump<R, W>(reader: &mut R, writer: &mut W, counter: &AtomicU64) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; RELAY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buffer[..n]).await?;
        writer.flush().await?;
        total += n as u64;
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}
