use berth_contracts::{Lease, LeaseAttribute, LeaseLog, LeaseStatus, PolicyScope, Resource, Viewer};
use berth_policy::{Capability, has_capability};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::{Store, StoreError};

impl Store {
    /// The lease locator. A missing row and a viewer without the view
    /// capability both come back as `None`; callers cannot tell which.
    pub async fn lease_for_viewer(
        &self,
        viewer: &Viewer,
        id: i64,
    ) -> Result<Option<Lease>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "SELECT id, status, resource_type, resource_id, until_at, attributes, owner_id, view_scope, edit_scope FROM berth_leases WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        let lease = lease_from_row(&row)?;
        if !has_capability(viewer, &lease, Capability::View) {
            return Ok(None);
        }

        Ok(Some(lease))
    }

    /// Best-effort lookup for the lease page's resource row; absence is
    /// not an error.
    pub async fn resource_by_id(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query("SELECT id, name, resource_type FROM berth_resources WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Resource {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            resource_type: row.try_get("resource_type")?,
        }))
    }

    /// Newest-first log page. Callers pass `limit = page_size + 1` and use
    /// the extra row to decide whether a next page exists.
    pub async fn lease_logs(
        &self,
        lease_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LeaseLog>, StoreError> {
        let rows = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "SELECT id, lease_id, event, detail, created_at FROM berth_lease_logs WHERE lease_id = $1 ORDER BY id DESC OFFSET $2 LIMIT $3",
            )
            .bind(lease_id)
            .bind(offset.max(0))
            .bind(limit.max(0))
            .fetch_all(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let mut logs = Vec::with_capacity(rows.len());
        for row in &rows {
            logs.push(LeaseLog {
                id: row.try_get("id")?,
                lease_id: row.try_get("lease_id")?,
                event: row.try_get("event")?,
                detail: row.try_get("detail")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(logs)
    }

    /// Marks the lease released and appends the matching log row in one
    /// transaction.
    pub async fn release_lease(&self, lease_id: i64, released_by: &str) -> Result<(), StoreError> {
        let detail = format!("released by {}", released_by);

        tokio::time::timeout(self.op_timeout(), async {
            let mut tx = self.pool().begin().await?;

            sqlx::query("UPDATE berth_leases SET status = $1 WHERE id = $2")
                .bind(LeaseStatus::Released.as_str())
                .bind(lease_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO berth_lease_logs (lease_id, event, detail) VALUES ($1, $2, $3)",
            )
            .bind(lease_id)
            .bind("released")
            .bind(&detail)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<(), sqlx::Error>(())
        })
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(())
    }
}

fn lease_from_row(row: &PgRow) -> Result<Lease, StoreError> {
    let status: String = row.try_get("status")?;
    let view_scope: String = row.try_get("view_scope")?;
    let edit_scope: String = row.try_get("edit_scope")?;

    let attributes_json: serde_json::Value = row.try_get("attributes")?;
    let attributes: Vec<LeaseAttribute> =
        serde_json::from_value(attributes_json).unwrap_or_default();

    Ok(Lease {
        id: row.try_get("id")?,
        status: LeaseStatus::parse(&status),
        resource_type: row.try_get("resource_type")?,
        resource_id: row.try_get("resource_id")?,
        until: row.try_get("until_at")?,
        attributes,
        owner_id: row.try_get("owner_id")?,
        view_scope: PolicyScope::parse(&view_scope),
        edit_scope: PolicyScope::parse(&edit_scope),
    })
}
