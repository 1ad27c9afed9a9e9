//! Fake collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dockbridge_lib::{
    Application, BoxedStream, ComputeInstance, Dialer, NetworkAddress, Organization,
    ProvisionError, Provisioner, RelayStats, TransportError, TunnelAgent, TunnelSession,
};
use dockbridge_transport::TransportResult;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// The far end of a dialed stream, handed to the test
pub struct DialedPeer {
    pub host: String,
    pub port: u16,
    pub stream: DuplexStream,
}

/// Dialer backed by in-memory duplex pipes
///
/// Each dial pops the next scripted outcome (`true` = fail). Once the script
/// is exhausted every dial succeeds.
#[derive(Debug)]
pub struct ChannelDialer {
    peers: mpsc::UnboundedSender<DialedPeer>,
    failures: Mutex<VecDeque<bool>>,
    dials: AtomicUsize,
}

impl ChannelDialer {
    pub fn new(script: Vec<bool>) -> (Arc<Self>, mpsc::UnboundedReceiver<DialedPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let dialer = Arc::new(Self {
            peers,
            failures: Mutex::new(script.into()),
            dials: AtomicUsize::new(0),
        });
        (dialer, rx)
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for ChannelDialer {
    async fn dial(&self, host: &str, port: u16) -> TransportResult<BoxedStream> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(TransportError::ConnectionError(
                "refused by test dialer".to_string(),
            ));
        }

        let (near, far) = tokio::io::duplex(64 * 1024);
        let _ = self.peers.send(DialedPeer {
            host: host.to_string(),
            port,
            stream: far,
        });
        Ok(Box::new(near))
    }
}

/// Tunnel agent that hands out a prepared dialer, or fails
pub struct StaticAgent {
    pub dialer: Option<Arc<ChannelDialer>>,
    pub orgs: Mutex<Vec<String>>,
}

impl StaticAgent {
    pub fn new(dialer: Arc<ChannelDialer>) -> Self {
        Self {
            dialer: Some(dialer),
            orgs: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            dialer: None,
            orgs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TunnelAgent for StaticAgent {
    async fn establish(&self) -> TransportResult<TunnelSession> {
        Ok(TunnelSession::new("test-session"))
    }

    async fn connect_to_tunnel(
        &self,
        _session: &TunnelSession,
        org_slug: &str,
    ) -> TransportResult<Arc<dyn Dialer>> {
        self.orgs.lock().unwrap().push(org_slug.to_string());
        match &self.dialer {
            Some(dialer) => Ok(dialer.clone()),
            None => Err(TransportError::ConnectionError(
                "network unreachable".to_string(),
            )),
        }
    }
}

/// Provisioner that always returns the same instance
pub struct StaticProvisioner {
    pub instance: ComputeInstance,
    pub calls: AtomicUsize,
}

impl StaticProvisioner {
    pub fn new(addresses: Vec<NetworkAddress>) -> Self {
        Self {
            instance: ComputeInstance {
                id: "mach_9".to_string(),
                addresses,
                app_id: "app_123".to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn ensure_compute_instance(
        &self,
        _app_name: &str,
    ) -> Result<(ComputeInstance, Application), ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((
            self.instance.clone(),
            Application {
                id: "app_123".to_string(),
                name: "dockbridge-builder-personal".to_string(),
                organization: Organization {
                    id: "org_1".to_string(),
                    slug: "personal".to_string(),
                },
            },
        ))
    }
}

/// Echo everything received on `stream` back to the sender
pub fn spawn_echo(mut stream: DuplexStream) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Wait until every relay task has finished
pub async fn wait_for_idle(stats: &RelayStats) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.active() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("relay tasks did not finish");
}
