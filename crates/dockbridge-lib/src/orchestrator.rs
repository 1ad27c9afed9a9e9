//! Remote socket orchestrator
//!
//! Wires the pieces together for one invocation:
//!
//! ```text
//! resolve target → select private address → prepare endpoint
//!     → establish session / obtain dialer → bind relay → run until cancelled
//! ```
//!
//! The socket endpoint is cleaned up on every exit path.

use dockbridge_proto::DEFAULT_REMOTE_PORT;
use dockbridge_transport::TunnelAgent;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::address::select_private_address;
use crate::dialer::{establish_session, obtain_dialer};
use crate::endpoint::SocketEndpoint;
use crate::error::RemoteError;
use crate::relay::{RelayConfig, RelayServer, RelayStats};
use crate::resolver::{Provisioner, Resolution, TargetResolver};

#[derive(Debug, Clone)]
pub struct RemoteSocketConfig {
    /// App whose remote builder should be exposed
    pub app_name: String,
    /// Socket path to bind. `None` allocates a temporary one.
    pub bind_path: Option<PathBuf>,
    /// Port of the Docker Engine API on the remote instance
    pub remote_port: u16,
    /// Externally reachable builder host. When set no tunnel is started.
    pub remote_builder_host: Option<String>,
}

impl RemoteSocketConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            bind_path: None,
            remote_port: DEFAULT_REMOTE_PORT,
            remote_builder_host: None,
        }
    }

    pub fn with_bind_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bind_path = Some(path.into());
        self
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    pub fn with_remote_builder_host(mut self, host: Option<String>) -> Self {
        self.remote_builder_host = host;
        self
    }
}

/// Details handed to the ready hook once the relay is listening
#[derive(Debug, Clone)]
pub struct ReadyInfo {
    /// `unix://` URL of the local socket
    pub docker_host: String,
    pub socket_path: PathBuf,
    pub app_name: String,
    pub remote_host: String,
    pub remote_port: u16,
    pub stats: Arc<RelayStats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The override was set; nothing was started
    Bypassed { remote_host: String },
    /// The relay ran and was shut down
    Served { docker_host: String },
    /// Cancelled before the relay started
    Cancelled,
}

type ReadyHook = Box<dyn Fn(&ReadyInfo) + Send + Sync>;

pub struct RemoteSocket {
    config: RemoteSocketConfig,
    provisioner: Arc<dyn Provisioner>,
    agent: Arc<dyn TunnelAgent>,
    on_ready: Option<ReadyHook>,
}

impl RemoteSocket {
    pub fn new(
        config: RemoteSocketConfig,
        provisioner: Arc<dyn Provisioner>,
        agent: Arc<dyn TunnelAgent>,
    ) -> Self {
        Self {
            config,
            provisioner,
            agent,
            on_ready: None,
        }
    }

    /// Called once the local socket is bound, before serving
    pub fn on_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReadyInfo) + Send + Sync + 'static,
    {
        self.on_ready = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &RemoteSocketConfig {
        &self.config
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunOutcome, RemoteError> {
        let resolver = TargetResolver::new(
            self.provisioner.clone(),
            self.config.remote_builder_host.clone(),
        );

        let resolving = resolver.resolve(&self.config.app_name);
        let resolution = match until_cancelled(&shutdown, resolving).await {
            Some(resolution) => resolution?,
            None => return Ok(RunOutcome::Cancelled),
        };

        let (instance, app) = match resolution {
            Resolution::Bypassed { remote_host } => {
                return Ok(RunOutcome::Bypassed { remote_host });
            }
            Resolution::Instance { instance, app } => (instance, app),
        };

        let remote_host = select_private_address(&instance)?.to_string();

        let endpoint = SocketEndpoint::prepare(self.config.bind_path.as_deref())?;

        let agent = self.agent.as_ref();
        let session = match until_cancelled(&shutdown, establish_session(agent)).await {
            Some(session) => session?,
            None => return Ok(RunOutcome::Cancelled),
        };
        let connecting = obtain_dialer(agent, &session, app.org_slug());
        let dialer = match until_cancelled(&shutdown, connecting).await {
            Some(dialer) => dialer?,
            None => return Ok(RunOutcome::Cancelled),
        };

        let server = RelayServer::bind(
            RelayConfig {
                socket_path: endpoint.path().to_path_buf(),
                remote_host: remote_host.clone(),
                remote_port: self.config.remote_port,
            },
            dialer,
        )?;

        let docker_host = endpoint.docker_host();
        info!(
            app = %app.name,
            instance = %instance.id,
            remote = %format!("{}:{}", remote_host, self.config.remote_port),
            "Docker Engine available at {}",
            docker_host
        );

        if let Some(hook) = &self.on_ready {
            hook(&ReadyInfo {
                docker_host: docker_host.clone(),
                socket_path: endpoint.path().to_path_buf(),
                app_name: self.config.app_name.clone(),
                remote_host,
                remote_port: self.config.remote_port,
                stats: server.stats(),
            });
        }

        let served = server.run(shutdown).await;

        if let Err(e) = endpoint.close() {
            warn!("Failed to clean up socket endpoint: {}", e);
        }

        served.map(|()| RunOutcome::Served { docker_host })
    }
}

/// Await `future` unless `token` is cancelled first
///
/// An already cancelled token wins even if `future` is ready.
async fn until_cancelled<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}
