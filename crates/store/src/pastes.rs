use berth_contracts::{Paste, PolicyScope, Viewer};
use berth_policy::{Capability, require_capabilities};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::{Store, StoreError};

/// Fields for a new paste row. Content is referenced by `file_id` and
/// never changes after this insert.
pub struct NewPaste<'a> {
    pub title: &'a str,
    pub language: &'a str,
    pub file_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub view_scope: PolicyScope,
    pub edit_scope: PolicyScope,
}

impl Store {
    /// The paste locator. `required` lists every capability the caller
    /// needs; a missing row and a capability miss are both `None`.
    pub async fn paste_for_viewer(
        &self,
        viewer: &Viewer,
        id: i64,
        required: &[Capability],
    ) -> Result<Option<Paste>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "SELECT id, title, language, file_id, author_id, parent_id, view_scope, edit_scope FROM berth_pastes WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        let paste = paste_from_row(&row)?;
        if !require_capabilities(viewer, &paste, required) {
            return Ok(None);
        }

        Ok(Some(paste))
    }

    pub async fn create_paste(&self, record: NewPaste<'_>) -> Result<i64, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "INSERT INTO berth_pastes (title, language, file_id, author_id, parent_id, view_scope, edit_scope) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(record.title)
            .bind(record.language)
            .bind(record.file_id)
            .bind(record.author_id)
            .bind(record.parent_id)
            .bind(record.view_scope.as_str())
            .bind(record.edit_scope.as_str())
            .fetch_one(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.try_get("id")?)
    }

    /// Edit mode touches metadata only; the content reference is fixed at
    /// creation. Last write wins.
    pub async fn update_paste_metadata(
        &self,
        id: i64,
        title: &str,
        language: &str,
    ) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "UPDATE berth_pastes SET title = $1, language = $2, updated_at = now() WHERE id = $3",
            )
            .bind(title)
            .bind(language)
            .bind(id)
            .execute(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(())
    }
}

fn paste_from_row(row: &PgRow) -> Result<Paste, StoreError> {
    let view_scope: String = row.try_get("view_scope")?;
    let edit_scope: String = row.try_get("edit_scope")?;

    Ok(Paste {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        language: row.try_get("language")?,
        file_id: row.try_get("file_id")?,
        author_id: row.try_get("author_id")?,
        parent_id: row.try_get("parent_id")?,
        view_scope: PolicyScope::parse(&view_scope),
        edit_scope: PolicyScope::parse(&edit_scope),
    })
}
