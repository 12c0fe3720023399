//! Fakes and fixtures shared by the crate's tests.

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use skylift_common::db::{
    Id,
    models::{
        Backend, BackendType, Gateway, GatewayCompute, GatewayConfiguration, GatewayStatus,
        Project,
    },
    setup_pool,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use crate::{
    GatewayManager,
    compute::{
        BackendError, ComputeBackend, ComputeBackends, GatewayComputeConfiguration,
        GatewayProvisioningData,
    },
    tunnel::{SshError, Tunnel, TunnelTransport},
};

/// Transport fake: scripted reachability, counted handshakes, redirectable
/// forwarded address, recorded remote commands.
pub(crate) struct FakeTransport {
    unreachable: Mutex<HashSet<String>>,
    local_addr: Mutex<SocketAddr>,
    opens: AtomicUsize,
    pub exec_log: Arc<Mutex<Vec<String>>>,
    exec_output: Mutex<String>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            unreachable: Mutex::default(),
            local_addr: Mutex::new(([127, 0, 0, 1], 9).into()),
            opens: AtomicUsize::new(0),
            exec_log: Arc::default(),
            exec_output: Mutex::new(String::new()),
        })
    }

    pub fn set_unreachable(&self, host: &str) {
        self.unreachable.lock().unwrap().insert(host.to_string());
    }

    pub fn set_reachable(&self, host: &str) {
        self.unreachable.lock().unwrap().remove(host);
    }

    pub fn set_local_addr(&self, addr: SocketAddr) {
        *self.local_addr.lock().unwrap() = addr;
    }

    pub fn set_exec_output(&self, output: &str) {
        *self.exec_output.lock().unwrap() = output.to_string();
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelTransport for FakeTransport {
    async fn open(&self, host: &str, _ssh_private_key: &str) -> Result<Box<dyn Tunnel>, SshError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.lock().unwrap().contains(host) {
            return Err(SshError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("connect to {host} failed"),
            )));
        }
        Ok(Box::new(FakeTunnel {
            local_addr: *self.local_addr.lock().unwrap(),
            exec_log: Arc::clone(&self.exec_log),
            exec_output: self.exec_output.lock().unwrap().clone(),
        }))
    }
}

pub(crate) struct FakeTunnel {
    local_addr: SocketAddr,
    exec_log: Arc<Mutex<Vec<String>>>,
    exec_output: String,
}

impl FakeTunnel {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            exec_log: Arc::default(),
            exec_output: String::new(),
        }
    }
}

#[async_trait]
impl Tunnel for FakeTunnel {
    async fn exec(&self, command: &str) -> Result<String, SshError> {
        self.exec_log.lock().unwrap().push(command.to_string());
        Ok(self.exec_output.clone())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(&self) {}
}

/// Compute fake: instances provision instantly, termination fails for
/// scripted instance ids.
#[derive(Default)]
pub(crate) struct FakeBackend {
    failing_instances: Mutex<HashSet<String>>,
    pub terminated: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn fail_instance(&self, instance_id: &str) {
        self.failing_instances
            .lock()
            .unwrap()
            .insert(instance_id.to_string());
    }
}

impl ComputeBackend for FakeBackend {
    fn create_gateway(
        &self,
        configuration: &GatewayComputeConfiguration,
    ) -> Result<GatewayProvisioningData, BackendError> {
        Ok(GatewayProvisioningData {
            instance_id: format!("i-{}", configuration.instance_name),
            ip_address: "203.0.113.50".to_string(),
            region: configuration.region.clone(),
        })
    }

    fn terminate_instance(
        &self,
        instance_id: &str,
        _region: &str,
        _backend_data: Option<&str>,
    ) -> Result<(), BackendError> {
        if self.failing_instances.lock().unwrap().contains(instance_id) {
            return Err(BackendError::Other(format!("cannot terminate {instance_id}")));
        }
        self.terminated.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }
}

pub(crate) struct TestEnv {
    pub manager: GatewayManager,
    pub transport: Arc<FakeTransport>,
    pub backend: Arc<FakeBackend>,
    pub project: Project<Id>,
    pub aws_backend: Backend<Id>,
}

pub(crate) async fn setup_env() -> TestEnv {
    let pool = setup_pool().await;
    let project = Project::new("deep-thought", "project-key")
        .save(&pool)
        .await
        .expect("Failed to create project");
    let aws_backend = Backend::new(project.id, BackendType::Aws)
        .save(&pool)
        .await
        .expect("Failed to create aws backend");
    Backend::new(project.id, BackendType::Kubernetes)
        .save(&pool)
        .await
        .expect("Failed to create kubernetes backend");

    let transport = FakeTransport::new();
    let backend = Arc::new(FakeBackend::default());
    let mut backends = ComputeBackends::new();
    backends.register(BackendType::Aws, backend.clone());
    backends.register(BackendType::Kubernetes, backend.clone());
    let manager = GatewayManager::new(pool, backends, transport.clone());

    TestEnv {
        manager,
        transport,
        backend,
        project,
        aws_backend,
    }
}

/// A `Running` gateway row with its compute, ready for registration.
pub(crate) async fn running_gateway(
    env: &TestEnv,
    name: &str,
    ip_address: &str,
    wildcard_domain: Option<&str>,
    public_ip: bool,
) -> (Gateway<Id>, GatewayCompute<Id>) {
    let compute = GatewayCompute::new(
        Some(env.aws_backend.id),
        format!("i-{name}"),
        ip_address,
        "us-east-1",
        "gateway-key",
        "ssh-rsa AAAA",
    )
    .save(&env.manager.pool)
    .await
    .expect("Failed to create compute");

    let configuration = GatewayConfiguration {
        name: Some(name.to_string()),
        default: false,
        backend: BackendType::Aws,
        region: "us-east-1".to_string(),
        domain: wildcard_domain.map(ToString::to_string),
        public_ip,
    };
    let mut gateway = Gateway::new(
        env.project.id,
        Some(env.aws_backend.id),
        name,
        "us-east-1",
        wildcard_domain.map(ToString::to_string),
        Some(serde_json::to_string(&configuration).expect("Failed to serialize configuration")),
    );
    gateway.gateway_compute_id = Some(compute.id);
    gateway.status = GatewayStatus::Running;
    let gateway = gateway
        .save(&env.manager.pool)
        .await
        .expect("Failed to create gateway");

    (gateway, compute)
}

pub(crate) struct TestDaemon {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

/// Minimal daemon stand-in: answers every request with one canned
/// status/body and records request lines.
pub(crate) async fn spawn_daemon(status: u16, body: &str) -> TestDaemon {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test daemon");
    let addr = listener.local_addr().expect("Failed to read daemon address");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    let body = body.to_string();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut buf = vec![0u8; 8192];
            let Ok(n) = socket.read(&mut buf).await else {
                continue;
            };
            if let Some(line) = String::from_utf8_lossy(&buf[..n]).lines().next() {
                seen.lock().unwrap().push(line.to_string());
            }
            let response = format!(
                "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\n\
                content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    TestDaemon { addr, requests }
}

/// Daemon that resets the first `failures` connections before serving.
pub(crate) async fn spawn_flaky_daemon(failures: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test daemon");
    let addr = listener.local_addr().expect("Failed to read daemon address");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let seen = counter.fetch_add(1, Ordering::SeqCst);
            if seen < failures {
                continue; // dropped without a response
            }
            let mut buf = vec![0u8; 8192];
            if socket.read(&mut buf).await.is_err() {
                continue;
            }
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                    content-length: 2\r\nconnection: close\r\n\r\n{}",
                )
                .await;
        }
    });

    (addr, connections)
}
