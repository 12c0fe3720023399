use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, query, query_as, query_scalar};

use crate::db::{Id, NoId};

/// The slice of a run specification this core consumes.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RunSpec {
    pub configuration: ServiceConfiguration,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServiceConfiguration {
    #[serde(default = "default_true")]
    pub https: bool,
    #[serde(default = "default_true")]
    pub auth: bool,
    #[serde(default)]
    pub model: Option<ModelConfiguration>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModelConfiguration {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
}

fn default_true() -> bool {
    true
}

/// How a registered service is reachable, serialized into `Run::service_spec`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ServiceSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ServiceModelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ServiceModelSpec {
    pub name: String,
    pub base_url: String,
    #[serde(rename = "type")]
    pub model_type: String,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Run<I = NoId> {
    pub id: I,
    pub project_id: Id,
    pub gateway_id: Option<Id>,
    pub run_name: String,
    pub run_spec: String,
    pub service_spec: Option<String>,
    pub submitted_at: NaiveDateTime,
}

impl Run {
    #[must_use]
    pub fn new(project_id: Id, run_name: impl Into<String>, run_spec: impl Into<String>) -> Self {
        Self {
            id: NoId,
            project_id,
            gateway_id: None,
            run_name: run_name.into(),
            run_spec: run_spec.into(),
            service_spec: None,
            submitted_at: Utc::now().naive_utc(),
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<Run<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO run (project_id, gateway_id, run_name, run_spec, service_spec, \
            submitted_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(self.project_id)
        .bind(self.gateway_id)
        .bind(&self.run_name)
        .bind(&self.run_spec)
        .bind(&self.service_spec)
        .bind(self.submitted_at)
        .fetch_one(executor)
        .await?;

        Ok(Run {
            id,
            project_id: self.project_id,
            gateway_id: self.gateway_id,
            run_name: self.run_name,
            run_spec: self.run_spec,
            service_spec: self.service_spec,
            submitted_at: self.submitted_at,
        })
    }
}

impl Run<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM run WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Persist the gateway association and service spec of a registered run.
    pub async fn set_service<'e, E>(
        &mut self,
        executor: E,
        gateway_id: Id,
        service_spec: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query("UPDATE run SET gateway_id = ?, service_spec = ? WHERE id = ?")
            .bind(gateway_id)
            .bind(service_spec)
            .bind(self.id)
            .execute(executor)
            .await?;
        self.gateway_id = Some(gateway_id);
        self.service_spec = Some(service_spec.to_string());

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Job<I = NoId> {
    pub id: I,
    pub run_id: Id,
    pub job_num: i64,
    pub hostname: Option<String>,
    pub ssh_port: Option<i64>,
}

impl Job {
    #[must_use]
    pub fn new(run_id: Id, job_num: i64, hostname: Option<String>, ssh_port: Option<i64>) -> Self {
        Self {
            id: NoId,
            run_id,
            job_num,
            hostname,
            ssh_port,
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<Job<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO job (run_id, job_num, hostname, ssh_port) \
            VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(self.run_id)
        .bind(self.job_num)
        .bind(&self.hostname)
        .bind(self.ssh_port)
        .fetch_one(executor)
        .await?;

        Ok(Job {
            id,
            run_id: self.run_id,
            job_num: self.job_num,
            hostname: self.hostname,
            ssh_port: self.ssh_port,
        })
    }
}

impl Job<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM job WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
