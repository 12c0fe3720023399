use sqlx::{SqliteExecutor, query, query_as, query_scalar};

use crate::db::{Id, NoId};

/// The VM underlying a gateway. Rows are never hard-deleted; `deleted`
/// tombstones them. `ip_address` never changes after creation.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct GatewayCompute<I = NoId> {
    pub id: I,
    pub backend_id: Option<Id>,
    pub instance_id: String,
    pub ip_address: String,
    pub region: String,
    pub ssh_private_key: String,
    pub ssh_public_key: String,
    pub active: bool,
    pub deleted: bool,
}

impl GatewayCompute {
    #[must_use]
    pub fn new(
        backend_id: Option<Id>,
        instance_id: impl Into<String>,
        ip_address: impl Into<String>,
        region: impl Into<String>,
        ssh_private_key: impl Into<String>,
        ssh_public_key: impl Into<String>,
    ) -> Self {
        Self {
            id: NoId,
            backend_id,
            instance_id: instance_id.into(),
            ip_address: ip_address.into(),
            region: region.into(),
            ssh_private_key: ssh_private_key.into(),
            ssh_public_key: ssh_public_key.into(),
            active: true,
            deleted: false,
        }
    }

    pub async fn save<'e, E>(self, executor: E) -> Result<GatewayCompute<Id>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let id = query_scalar(
            "INSERT INTO gateway_compute (backend_id, instance_id, ip_address, region, \
            ssh_private_key, ssh_public_key, active, deleted) \
            VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(self.backend_id)
        .bind(&self.instance_id)
        .bind(&self.ip_address)
        .bind(&self.region)
        .bind(&self.ssh_private_key)
        .bind(&self.ssh_public_key)
        .bind(self.active)
        .bind(self.deleted)
        .fetch_one(executor)
        .await?;

        Ok(GatewayCompute {
            id,
            backend_id: self.backend_id,
            instance_id: self.instance_id,
            ip_address: self.ip_address,
            region: self.region,
            ssh_private_key: self.ssh_private_key,
            ssh_public_key: self.ssh_public_key,
            active: self.active,
            deleted: self.deleted,
        })
    }
}

impl GatewayCompute<Id> {
    pub async fn find_by_id<'e, E>(executor: E, id: Id) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM gateway_compute WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// All computes the startup reconciler should reconnect to.
    pub async fn find_active<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        query_as("SELECT * FROM gateway_compute WHERE active = TRUE AND deleted = FALSE ORDER BY id")
            .fetch_all(executor)
            .await
    }

    /// Tombstone the compute after its instance has been terminated.
    pub async fn mark_deleted<'e, E>(&mut self, executor: E) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        self.active = false;
        self.deleted = true;
        query("UPDATE gateway_compute SET active = FALSE, deleted = TRUE WHERE id = ?")
            .bind(self.id)
            .execute(executor)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_pool;

    #[tokio::test]
    async fn test_mark_deleted_deactivates() {
        let pool = setup_pool().await;
        let mut compute = GatewayCompute::new(None, "i-012345", "203.0.113.5", "us-east-1", "", "")
            .save(&pool)
            .await
            .expect("Failed to create compute");
        assert!(compute.active);

        compute.mark_deleted(&pool).await.unwrap();
        assert!(!compute.active);
        assert!(compute.deleted);

        let fetched = GatewayCompute::find_by_id(&pool, compute.id)
            .await
            .unwrap()
            .expect("Compute row should survive tombstoning");
        assert!(!fetched.active);
        assert!(fetched.deleted);
        assert!(GatewayCompute::find_active(&pool).await.unwrap().is_empty());
    }
}
