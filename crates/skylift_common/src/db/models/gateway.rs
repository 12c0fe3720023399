use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, query, query_as, query_scalar};
use strum_macros::Display;

use crate::db::{Id, NoId, models::backend::BackendType};

/// Gateway provisioning state. Once `Failed`, a gateway does not leave that
/// state without explicit user action.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GatewayStatus {
    Submitted,
    Provisioning,
    Running,
    Failed,
}

/// User-facing gateway configuration, serialized into `Gateway::configuration`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GatewayConfiguration {
    pub name: Option<String>,
    #[serde(default)]
    pub default: bool,
    pub backend: BackendType,
    pub region: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_public_ip")]
    pub public_ip: bool,
}

fn default_public_ip() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Gateway<I = NoId> {
    pub id: I,
    pub project_id: Id,
    pub backend_id: Option<Id>,
    pub gateway_compute_id: Option<Id>,
    pub name: String,
    pub region: String,
    pub wildcard_domain: Option<String>,
    pub configuration: Option<String>,
    pub status: GatewayStatus,
    pub status_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_processed_at: NaiveDateTime,
}

impl Gateway {
    #[must_use]
    pub fn new<S: Into<String>>(
        project_id: Id,
        backend_id: Option<Id>,
        name: S,
        region: S,
        wildcard_domain: Option<String>,
        configuration: Option<String>,
    ) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: NoId,
            project_id,
            backend_id,
            gateway_compute_id: None,
            name: name.into(),
            region: region.into(),
            wildcard_domain,
            configuration,
            status: GatewayStatus::Submitted,
            status_message: None,
            created_at: now,
            last_processed_at: now,
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<Gateway<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO gateway (project_id, backend_id, gateway_compute_id, name, region, \
            wildcard_domain, configuration, status, status_message, created_at, \
            last_processed_at) \
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(self.project_id)
        .bind(self.backend_id)
        .bind(self.gateway_compute_id)
        .bind(&self.name)
        .bind(&self.region)
        .bind(&self.wildcard_domain)
        .bind(&self.configuration)
        .bind(self.status)
        .bind(&self.status_message)
        .bind(self.created_at)
        .bind(self.last_processed_at)
        .fetch_one(executor)
        .await?;

        Ok(Gateway {
            id,
            project_id: self.project_id,
            backend_id: self.backend_id,
            gateway_compute_id: self.gateway_compute_id,
            name: self.name,
            region: self.region,
            wildcard_domain: self.wildcard_domain,
            configuration: self.configuration,
            status: self.status,
            status_message: self.status_message,
            created_at: self.created_at,
            last_processed_at: self.last_processed_at,
        })
    }
}

impl Gateway<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM gateway WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_name<'e, E>(
        executor: E,
        project_id: Id,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM gateway WHERE project_id = ? AND name = ?")
            .bind(project_id)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_project_id<'e, E>(
        executor: E,
        project_id: Id,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM gateway WHERE project_id = ? ORDER BY id")
            .bind(project_id)
            .fetch_all(executor)
            .await
    }

    pub async fn update_wildcard_domain<'e, E>(
        executor: E,
        project_id: Id,
        name: &str,
        wildcard_domain: Option<&str>,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query("UPDATE gateway SET wildcard_domain = ? WHERE project_id = ? AND name = ?")
            .bind(wildcard_domain)
            .bind(project_id)
            .bind(name)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn delete<'e, E>(self, executor: E) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query("DELETE FROM gateway WHERE id = ?")
            .bind(self.id)
            .execute(executor)
            .await?;

        Ok(())
    }
}

impl fmt::Display for Gateway<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gateway(ID {}; name {})", self.id, self.name)
    }
}

/// Public view of a gateway, assembled from the gateway row, its compute and
/// the project's default-gateway pointer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GatewayInfo {
    pub name: String,
    pub ip_address: String,
    pub instance_id: String,
    pub region: String,
    pub wildcard_domain: Option<String>,
    pub default: bool,
    pub created_at: NaiveDateTime,
    pub backend: BackendType,
    pub status: GatewayStatus,
    pub status_message: Option<String>,
    pub configuration: GatewayConfiguration,
}
