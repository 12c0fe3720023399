use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, query_as, query_scalar};
use strum_macros::Display;

use crate::db::{Id, NoId};

/// Cloud providers a project can provision gateways on. `Skylift` is the
/// managed backend; its gateways are not user-mutable.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendType {
    Aws,
    Azure,
    Gcp,
    Kubernetes,
    Skylift,
}

/// Backends that can provision a gateway without a public IP.
pub const BACKENDS_WITH_PRIVATE_GATEWAY_SUPPORT: &[BackendType] = &[BackendType::Kubernetes];

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Backend<I = NoId> {
    pub id: I,
    pub project_id: Id,
    pub backend_type: BackendType,
}

impl Backend {
    #[must_use]
    pub fn new(project_id: Id, backend_type: BackendType) -> Self {
        Self {
            id: NoId,
            project_id,
            backend_type,
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<Backend<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO backend (project_id, backend_type) VALUES (?, ?) RETURNING id",
        )
        .bind(self.project_id)
        .bind(self.backend_type)
        .fetch_one(executor)
        .await?;

        Ok(Backend {
            id,
            project_id: self.project_id,
            backend_type: self.backend_type,
        })
    }
}

impl Backend<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT id, project_id, backend_type FROM backend WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_type<'e, E>(
        executor: E,
        project_id: Id,
        backend_type: BackendType,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as(
            "SELECT id, project_id, backend_type FROM backend \
            WHERE project_id = ? AND backend_type = ?",
        )
        .bind(project_id)
        .bind(backend_type)
        .fetch_optional(executor)
        .await
    }
}
