use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use skylift_common::db::{Id, models::Job};
use url::Url;

use crate::error::GatewayError;

/// Typed operations against the gateway daemon. Wire format is JSON; error
/// responses carry a textual `message` surfaced verbatim in
/// [`GatewayError::Remote`]. Transport failures stay
/// [`GatewayError::Request`].
pub struct GatewayClient<'a> {
    http: &'a reqwest::Client,
    base_url: &'a Url,
}

#[derive(Serialize)]
struct RegisterServiceRequest<'a> {
    run_id: Id,
    domain: &'a str,
    https: bool,
    gateway_https: bool,
    auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a Value>,
    ssh_private_key: &'a str,
}

#[derive(Serialize)]
struct UnregisterServiceRequest {
    run_id: Id,
}

#[derive(Serialize)]
struct RegisterReplicaRequest<'a> {
    job_id: Id,
    job_num: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_port: Option<i64>,
}

#[derive(Serialize)]
struct UnregisterReplicaRequest {
    job_id: Id,
}

#[derive(Deserialize)]
struct DaemonError {
    message: String,
}

impl<'a> GatewayClient<'a> {
    #[must_use]
    pub(crate) fn new(http: &'a reqwest::Client, base_url: &'a Url) -> Self {
        Self { http, base_url }
    }

    /// Push the latest global configuration to the daemon. Safe to retry.
    pub async fn submit_gateway_config(&self) -> Result<(), GatewayError> {
        self.post("api/config", &json!({})).await
    }

    /// Create or replace the ingress entry for a service.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_service(
        &self,
        project: &str,
        run_id: Id,
        domain: &str,
        service_https: bool,
        gateway_https: bool,
        auth: bool,
        options: Option<&Value>,
        ssh_private_key: &str,
    ) -> Result<(), GatewayError> {
        self.post(
            &format!("api/registry/{project}/services/register"),
            &RegisterServiceRequest {
                run_id,
                domain,
                https: service_https,
                gateway_https,
                auth,
                options,
                ssh_private_key,
            },
        )
        .await
    }

    pub async fn unregister_service(&self, project: &str, run_id: Id) -> Result<(), GatewayError> {
        self.post(
            &format!("api/registry/{project}/services/unregister"),
            &UnregisterServiceRequest { run_id },
        )
        .await
    }

    /// Add one replica endpoint to an existing service.
    pub async fn register_replica(
        &self,
        project: &str,
        run_id: Id,
        job: &Job<Id>,
    ) -> Result<(), GatewayError> {
        self.post(
            &format!("api/registry/{project}/services/{run_id}/replicas/register"),
            &RegisterReplicaRequest {
                job_id: job.id,
                job_num: job.job_num,
                hostname: job.hostname.as_deref(),
                ssh_port: job.ssh_port,
            },
        )
        .await
    }

    pub async fn unregister_replica(
        &self,
        project: &str,
        run_id: Id,
        job_id: Id,
    ) -> Result<(), GatewayError> {
        self.post(
            &format!("api/registry/{project}/services/{run_id}/replicas/unregister"),
            &UnregisterReplicaRequest { job_id },
        )
        .await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<DaemonError>()
            .await
            .map(|err| err.message)
            .unwrap_or_else(|_| format!("gateway daemon returned status {status}"));
        Err(GatewayError::Remote(message))
    }
}
