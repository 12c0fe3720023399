use std::sync::Arc;

use futures::{StreamExt, stream};
use skylift_common::{VERSION, db::models::GatewayCompute};
use tokio::task::JoinSet;

use crate::{
    GatewayManager, connection::GatewayConnection, error::GatewayError,
    lifecycle::configure_gateway,
};

/// Truthy values (`1`, `true`) skip the update phase of startup
/// reconciliation.
pub const SKIP_GATEWAY_UPDATE_ENV: &str = "SKYLIFT_SKIP_GATEWAY_UPDATE";
const INIT_CONNECT_CONCURRENCY: usize = 8;
const UPDATE_SUCCESS_SENTINEL: &str = "Update successfully completed";

fn gateway_bundle_url(build: &str) -> String {
    format!("https://downloads.skylift.dev/gateway/{build}/skylift-gateway.tar.gz")
}

fn skip_gateway_update() -> bool {
    std::env::var(SKIP_GATEWAY_UPDATE_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl GatewayManager {
    /// Reconnect to every active gateway after a restart, bring their
    /// daemons up to date and re-apply configuration. Each phase keeps
    /// going past individual failures.
    pub async fn init_gateways(&self) -> Result<(), GatewayError> {
        let computes = GatewayCompute::find_active(&self.pool).await?;
        if !computes.is_empty() {
            info!("Connecting to {} gateways...", computes.len());
        }

        let results: Vec<_> = stream::iter(computes)
            .map(|compute| {
                let connections = Arc::clone(&self.connections);
                async move {
                    let result = connections
                        .add(&compute.ip_address, &compute.ssh_private_key)
                        .await;
                    (compute.ip_address, result)
                }
            })
            .buffer_unordered(INIT_CONNECT_CONCURRENCY)
            .collect()
            .await;
        for (ip_address, result) in results {
            if let Err(err) = result {
                warn!("Failed to connect to gateway {ip_address}: {err}");
            }
        }

        if skip_gateway_update() {
            debug!("Skipping gateway update due to {SKIP_GATEWAY_UPDATE_ENV}");
        } else {
            let mut tasks = JoinSet::new();
            for connection in self.connections.all().await {
                tasks.spawn(async move {
                    let result = update_gateway(&connection, VERSION).await;
                    (connection, result)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                let (connection, result) = joined.expect("gateway update task panicked");
                if let Err(err) = result {
                    warn!(
                        "Failed to update gateway {}: {err}",
                        connection.ip_address()
                    );
                }
            }
        }

        let mut tasks = JoinSet::new();
        for connection in self.connections.all().await {
            tasks.spawn(async move {
                let result = configure_gateway(&connection).await;
                (connection, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let (connection, result) = joined.expect("gateway configure task panicked");
            if let Err(err) = result {
                warn!(
                    "Failed to configure gateway {}: {err}",
                    connection.ip_address()
                );
            }
        }

        Ok(())
    }
}

/// Run the self-update script on the gateway host.
async fn update_gateway(connection: &GatewayConnection, build: &str) -> Result<(), GatewayError> {
    debug!("Updating gateway {}", connection.ip_address());
    let stdout = connection
        .tunnel()
        .exec(&format!(
            "/bin/sh skylift/update.sh {} {build}",
            gateway_bundle_url(build)
        ))
        .await?;
    if stdout.contains(UPDATE_SUCCESS_SENTINEL) {
        info!("Gateway {} updated", connection.ip_address());
    }
    Ok(())
}
