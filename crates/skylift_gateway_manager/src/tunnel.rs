use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use async_trait::async_trait;
use russh::{
    ChannelMsg, Disconnect,
    client::{self, Handle},
    keys::{PrivateKeyWithHashAlg, decode_secret_key},
};
use thiserror::Error;
use tokio::{net::TcpListener, task::JoinHandle};

/// Account the gateway key is installed for during provisioning.
const GATEWAY_SSH_USER: &str = "ubuntu";
const GATEWAY_SSH_PORT: u16 = 22;
/// Port the gateway daemon listens on, loopback-only on the instance.
const GATEWAY_DAEMON_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum SshError {
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),
    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),
    #[error("SSH authentication failed")]
    AuthenticationFailed,
    #[error("tunnel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote command exited with status {status}: {stderr}")]
    CommandFailed { status: u32, stderr: String },
}

/// Opens tunnels to gateway hosts. The connection pool keeps one transport
/// for the whole process.
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    async fn open(&self, host: &str, ssh_private_key: &str) -> Result<Box<dyn Tunnel>, SshError>;
}

/// One live tunnel: remote command execution plus a local endpoint forwarded
/// to the daemon on the remote host.
#[async_trait]
pub trait Tunnel: Send + Sync {
    async fn exec(&self, command: &str) -> Result<String, SshError>;
    fn local_addr(&self) -> SocketAddr;
    async fn close(&self);
}

pub struct SshTransport;

struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        // gateway host keys are not pinned; the session is authenticated by
        // the per-gateway private key
        Ok(true)
    }
}

#[async_trait]
impl TunnelTransport for SshTransport {
    async fn open(&self, host: &str, ssh_private_key: &str) -> Result<Box<dyn Tunnel>, SshError> {
        let key = Arc::new(decode_secret_key(ssh_private_key, None)?);
        let config = Arc::new(client::Config::default());
        let mut session = client::connect(config, (host, GATEWAY_SSH_PORT), ClientHandler).await?;
        let hash_alg = session.best_supported_rsa_hash().await?.flatten();
        let auth = session
            .authenticate_publickey(GATEWAY_SSH_USER, PrivateKeyWithHashAlg::new(key, hash_alg))
            .await?;
        if !auth.success() {
            return Err(SshError::AuthenticationFailed);
        }
        let session = Arc::new(session);

        let bound = async {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
            let local_addr = listener.local_addr()?;
            Ok::<_, std::io::Error>((listener, local_addr))
        }
        .await;
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(err) => {
                let _ = session
                    .disconnect(Disconnect::ByApplication, "", "en")
                    .await;
                return Err(err.into());
            }
        };
        let forwarder = tokio::spawn(forward_loop(Arc::clone(&session), listener));

        Ok(Box::new(SshTunnel {
            session,
            local_addr,
            forwarder,
        }))
    }
}

/// Accept local connections and pipe each one through a direct-tcpip channel
/// to the daemon port on the remote host.
async fn forward_loop(session: Arc<Handle<ClientHandler>>, listener: TcpListener) {
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                debug!("Tunnel listener closed: {err}");
                break;
            }
        };
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let channel = session
                .channel_open_direct_tcpip(
                    Ipv4Addr::LOCALHOST.to_string(),
                    u32::from(GATEWAY_DAEMON_PORT),
                    peer.ip().to_string(),
                    u32::from(peer.port()),
                )
                .await;
            match channel {
                Ok(channel) => {
                    let mut stream = channel.into_stream();
                    let _ = tokio::io::copy_bidirectional(&mut socket, &mut stream).await;
                }
                Err(err) => debug!("Failed to open channel to gateway daemon: {err}"),
            }
        });
    }
}

struct SshTunnel {
    session: Arc<Handle<ClientHandler>>,
    local_addr: SocketAddr,
    forwarder: JoinHandle<()>,
}

#[async_trait]
impl Tunnel for SshTunnel {
    async fn exec(&self, command: &str) -> Result<String, SshError> {
        let mut channel = self.session.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = 0;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus {
                    exit_status: status,
                } => exit_status = status,
                _ => (),
            }
        }
        if exit_status != 0 {
            return Err(SshError::CommandFailed {
                status: exit_status,
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(&self) {
        self.forwarder.abort();
        let _ = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
