use std::sync::Arc;

use serde_json::{Value, json};
use skylift_common::db::{
    Id,
    models::{
        Gateway, GatewayCompute, GatewayStatus, Job, Run, RunSpec, ServiceConfiguration,
        ServiceModelSpec, ServiceSpec,
    },
};

use crate::{GatewayManager, connection::GatewayConnection, error::GatewayError};

/// Serving options forwarded to the gateway for model-backed services.
fn service_options(configuration: &ServiceConfiguration) -> Value {
    match &configuration.model {
        Some(model) => json!({
            "openai": {
                "model": {
                    "name": model.name,
                    "type": model.model_type,
                }
            }
        }),
        None => json!({}),
    }
}

impl GatewayManager {
    /// Register a run as a service behind its project's default gateway:
    /// compose the service URL from the gateway's wildcard domain, persist
    /// the association on the run row and push the entry to the daemon.
    pub async fn register_service(&self, run: &mut Run<Id>) -> Result<(), GatewayError> {
        let run_spec: RunSpec = serde_json::from_str(&run.run_spec)?;

        let project = self.project_by_id(run.project_id).await?;
        let gateway_id = project
            .default_gateway_id
            .ok_or_else(|| GatewayError::NotFound("Default gateway is not set".to_string()))?;
        let gateway = Gateway::find_by_id(&self.pool, gateway_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Default gateway is not set".to_string()))?;

        let compute_id = gateway.gateway_compute_id.ok_or_else(|| {
            GatewayError::ClientError("Gateway has no instance associated with it".to_string())
        })?;
        let compute = GatewayCompute::find_by_id(&self.pool, compute_id)
            .await?
            .ok_or_else(|| {
                GatewayError::ClientError("Gateway has no instance associated with it".to_string())
            })?;
        if gateway.status != GatewayStatus::Running {
            return Err(GatewayError::ClientError(
                "Gateway status is not running".to_string(),
            ));
        }

        let service_https = run_spec.configuration.https;
        let configuration = self.gateway_configuration(&gateway).await?;
        if service_https && !configuration.public_ip {
            return Err(GatewayError::ClientError(
                "Cannot run HTTPS service on gateway without public IP".to_string(),
            ));
        }
        // private gateways never serve HTTPS themselves
        let gateway_https = configuration.public_ip;
        let service_protocol = if service_https { "https" } else { "http" };
        let gateway_protocol = if gateway_https { "https" } else { "http" };

        let wildcard_domain = gateway
            .wildcard_domain
            .as_deref()
            .map(|domain| domain.strip_prefix("*.").unwrap_or(domain))
            .ok_or_else(|| {
                GatewayError::ClientError("Domain is required for gateway".to_string())
            })?;
        let service_domain = format!("{}.{wildcard_domain}", run.run_name);
        let mut service_spec = ServiceSpec {
            url: format!("{service_protocol}://{service_domain}"),
            model: None,
            options: None,
        };
        if let Some(model) = &run_spec.configuration.model {
            service_spec.model = Some(ServiceModelSpec {
                name: model.name.clone(),
                base_url: format!("{gateway_protocol}://gateway.{wildcard_domain}"),
                model_type: model.model_type.clone(),
            });
            service_spec.options = Some(service_options(&run_spec.configuration));
        }

        // resolve the connection before touching the run row, so a
        // disconnected gateway leaves no partial state behind
        let connection = self
            .connections
            .get(&compute.ip_address)
            .await
            .ok_or_else(|| GatewayError::ClientError("Gateway is not connected".to_string()))?;

        let spec_json = serde_json::to_string(&service_spec)?;
        run.set_service(&self.pool, gateway.id, &spec_json).await?;

        debug!("{}: registering service as {}", run.run_name, service_spec.url);
        let result = connection
            .client()
            .register_service(
                &project.name,
                run.id,
                &service_domain,
                service_https,
                gateway_https,
                run_spec.configuration.auth,
                service_spec.options.as_ref(),
                &project.ssh_private_key,
            )
            .await;
        match result {
            Ok(()) => {
                info!(
                    "{}: service is registered as {}",
                    run.run_name, service_spec.url
                );
                Ok(())
            }
            Err(GatewayError::Ssh(_)) => Err(GatewayError::ClientError(
                "Gateway tunnel is not working".to_string(),
            )),
            Err(GatewayError::Request(err)) => {
                debug!("Gateway request failed: {err}");
                Err(GatewayError::Remote(format!("Gateway is not working: {err}")))
            }
            Err(err) => Err(err),
        }
    }

    /// Add one replica endpoint to a registered service.
    pub async fn register_replica(
        &self,
        gateway_id: Id,
        run: &Run<Id>,
        job: &Job<Id>,
    ) -> Result<(), GatewayError> {
        let connection = self.get_gateway_connection(gateway_id).await?;
        let project = self.project_by_id(run.project_id).await?;
        debug!(
            "{}: registering replica {} for service",
            run.run_name, job.job_num
        );
        match connection
            .client()
            .register_replica(&project.name, run.id, job)
            .await
        {
            Ok(()) => {
                info!("{}: replica {} is registered", run.run_name, job.job_num);
                Ok(())
            }
            Err(GatewayError::Request(err)) => {
                debug!("Gateway request failed: {err}");
                Err(GatewayError::Remote(err.to_string()))
            }
            Err(GatewayError::Ssh(err)) => Err(GatewayError::Remote(err.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Remove a service from its gateway. A daemon-side "not registered" is
    /// downgraded to a warning; transport failures still surface.
    pub async fn unregister_service(&self, run: &Run<Id>) -> Result<(), GatewayError> {
        let gateway_id = run
            .gateway_id
            .ok_or_else(|| GatewayError::Remote("Gateway doesn't exist".to_string()))?;
        let connection = self.get_gateway_connection(gateway_id).await?;
        let project = self.project_by_id(run.project_id).await?;
        debug!("{}: unregistering service", run.run_name);
        match connection
            .client()
            .unregister_service(&project.name, run.id)
            .await
        {
            Ok(()) => {
                debug!("{}: service is unregistered", run.run_name);
                Ok(())
            }
            Err(GatewayError::Remote(message)) => {
                warn!("{}: unregistering service: {message}", run.run_name);
                Ok(())
            }
            Err(GatewayError::Request(err)) => {
                debug!("Gateway request failed: {err}");
                Err(GatewayError::Remote(err.to_string()))
            }
            Err(GatewayError::Ssh(err)) => Err(GatewayError::Remote(err.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Remove one replica. Symmetric to `unregister_service`.
    pub async fn unregister_replica(&self, job: &Job<Id>) -> Result<(), GatewayError> {
        let run = Run::find_by_id(&self.pool, job.run_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Run {} does not exist", job.run_id)))?;
        let Some(gateway_id) = run.gateway_id else {
            return Ok(());
        };
        let connection = self.get_gateway_connection(gateway_id).await?;
        let project = self.project_by_id(run.project_id).await?;
        debug!(
            "{}: unregistering replica {} from service",
            run.run_name, job.job_num
        );
        match connection
            .client()
            .unregister_replica(&project.name, run.id, job.id)
            .await
        {
            Ok(()) => {
                info!(
                    "{}: replica {} is unregistered",
                    run.run_name, job.job_num
                );
                Ok(())
            }
            Err(GatewayError::Remote(message)) => {
                warn!(
                    "{}: unregistering replica from service: {message}",
                    run.run_name
                );
                Ok(())
            }
            Err(GatewayError::Request(err)) => {
                debug!("Gateway request failed: {err}");
                Err(GatewayError::Remote(err.to_string()))
            }
            Err(GatewayError::Ssh(err)) => Err(GatewayError::Remote(err.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Live connection for a gateway id. All failure modes here are
    /// remote-kind errors; user input was validated before this point.
    pub(crate) async fn get_gateway_connection(
        &self,
        gateway_id: Id,
    ) -> Result<Arc<GatewayConnection>, GatewayError> {
        let gateway = Gateway::find_by_id(&self.pool, gateway_id)
            .await?
            .ok_or_else(|| GatewayError::Remote("Gateway doesn't exist".to_string()))?;
        let compute_id = gateway
            .gateway_compute_id
            .ok_or_else(|| GatewayError::Remote("Gateway is broken, no compute".to_string()))?;
        let compute = GatewayCompute::find_by_id(&self.pool, compute_id)
            .await?
            .ok_or_else(|| GatewayError::Remote("Gateway is broken, no compute".to_string()))?;
        self.connections
            .get(&compute.ip_address)
            .await
            .ok_or_else(|| GatewayError::Remote("Gateway is not connected".to_string()))
    }
}
