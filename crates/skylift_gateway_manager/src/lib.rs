use std::{sync::Arc, time::Duration};

use sqlx::SqlitePool;

use crate::{
    compute::ComputeBackends, lock::ProcessingIds, pool::ConnectionPool, tunnel::TunnelTransport,
};

#[macro_use]
extern crate tracing;

pub mod client;
pub mod compute;
pub mod connection;
pub mod error;
pub mod lock;
pub mod pool;
pub mod tunnel;

mod init;
mod lifecycle;
mod registrar;
#[cfg(test)]
mod testing;

pub use init::SKIP_GATEWAY_UPDATE_ENV;
pub use lifecycle::configure_gateway;

/// Reaching a freshly provisioned gateway over SSH. Generous because
/// load-balancer hostnames may need time to resolve.
pub const GATEWAY_CONNECT_ATTEMPTS: usize = 30;
pub const GATEWAY_CONNECT_DELAY: Duration = Duration::from_secs(10);
/// Pushing configuration while the gateway daemon comes up.
pub const GATEWAY_CONFIGURE_ATTEMPTS: usize = 40;
pub const GATEWAY_CONFIGURE_DELAY: Duration = Duration::from_secs(3);

/// Owns gateway instances from creation to teardown, the pool of live
/// control connections to them, and service registration on their daemons.
pub struct GatewayManager {
    pub(crate) pool: SqlitePool,
    pub(crate) backends: ComputeBackends,
    pub(crate) connections: Arc<ConnectionPool>,
    pub(crate) processing: Arc<ProcessingIds>,
}

impl GatewayManager {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        backends: ComputeBackends,
        transport: Arc<dyn TunnelTransport>,
    ) -> Self {
        Self {
            pool,
            backends,
            connections: Arc::new(ConnectionPool::new(transport)),
            processing: Arc::new(ProcessingIds::default()),
        }
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionPool> {
        &self.connections
    }

    #[must_use]
    pub fn processing(&self) -> &Arc<ProcessingIds> {
        &self.processing
    }
}
