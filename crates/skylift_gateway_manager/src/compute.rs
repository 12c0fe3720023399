use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use skylift_common::db::models::BackendType;
use thiserror::Error;

/// Provisioning request handed to a backend, one per gateway instance.
#[derive(Clone, Debug, Serialize)]
pub struct GatewayComputeConfiguration {
    pub project_name: String,
    pub instance_name: String,
    pub backend: BackendType,
    pub region: String,
    pub public_ip: bool,
    pub ssh_key_pub: String,
}

/// What a backend reports back for a created gateway instance.
#[derive(Clone, Debug)]
pub struct GatewayProvisioningData {
    pub instance_id: String,
    pub ip_address: String,
    pub region: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no capacity: {0}")]
    NoCapacity(String),
    #[error("backend error: {0}")]
    Other(String),
}

/// Compute capability of a cloud backend. Implementations block; callers run
/// them through `spawn_blocking`.
pub trait ComputeBackend: Send + Sync {
    fn create_gateway(
        &self,
        configuration: &GatewayComputeConfiguration,
    ) -> Result<GatewayProvisioningData, BackendError>;

    fn terminate_instance(
        &self,
        instance_id: &str,
        region: &str,
        backend_data: Option<&str>,
    ) -> Result<(), BackendError>;
}

/// Per-process registry of compute backends.
#[derive(Clone, Default)]
pub struct ComputeBackends {
    backends: HashMap<BackendType, Arc<dyn ComputeBackend>>,
}

impl ComputeBackends {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend_type: BackendType, backend: Arc<dyn ComputeBackend>) {
        self.backends.insert(backend_type, backend);
    }

    #[must_use]
    pub fn get(&self, backend_type: BackendType) -> Option<Arc<dyn ComputeBackend>> {
        self.backends.get(&backend_type).map(Arc::clone)
    }
}
