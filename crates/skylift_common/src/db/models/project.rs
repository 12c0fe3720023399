use sqlx::{SqliteExecutor, query, query_as, query_scalar};

use crate::db::{Id, NoId};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Project<I = NoId> {
    pub id: I,
    pub name: String,
    pub ssh_private_key: String,
    pub default_gateway_id: Option<Id>,
}

impl Project {
    #[must_use]
    pub fn new<S: Into<String>>(name: S, ssh_private_key: S) -> Self {
        Self {
            id: NoId,
            name: name.into(),
            ssh_private_key: ssh_private_key.into(),
            default_gateway_id: None,
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<Project<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO project (name, ssh_private_key, default_gateway_id) \
            VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&self.name)
        .bind(&self.ssh_private_key)
        .bind(self.default_gateway_id)
        .fetch_one(executor)
        .await?;

        Ok(Project {
            id,
            name: self.name,
            ssh_private_key: self.ssh_private_key,
            default_gateway_id: self.default_gateway_id,
        })
    }
}

impl Project<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT id, name, ssh_private_key, default_gateway_id FROM project WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Point the project at its default gateway.
    pub async fn set_default_gateway<'e, E>(
        executor: E,
        project_id: Id,
        gateway_id: Id,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query("UPDATE project SET default_gateway_id = ? WHERE id = ?")
            .bind(gateway_id)
            .bind(project_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
