use berth_contracts::Viewer;
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::{Store, StoreError};

impl Store {
    pub async fn viewer_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Viewer>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query("SELECT id, username, is_admin FROM berth_actors WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        row.as_ref().map(viewer_from_row).transpose()
    }

    pub async fn viewer_by_username(&self, username: &str) -> Result<Option<Viewer>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query("SELECT id, username, is_admin FROM berth_actors WHERE username = $1")
                .bind(username)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        row.as_ref().map(viewer_from_row).transpose()
    }

    pub async fn viewer_by_id(&self, id: i64) -> Result<Option<Viewer>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query("SELECT id, username, is_admin FROM berth_actors WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        row.as_ref().map(viewer_from_row).transpose()
    }
}

fn viewer_from_row(row: &PgRow) -> Result<Viewer, StoreError> {
    Ok(Viewer {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        is_admin: row.try_get("is_admin")?,
    })
}
