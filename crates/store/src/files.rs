use berth_contracts::FileBlob;
use hex::ToHex;
use sha2::Digest;
use sqlx::Row;

use crate::{Store, StoreError};

pub fn sha256_hex(bytes: &[u8]) -> String {
    sha2::Sha256::digest(bytes).encode_hex()
}

impl Store {
    /// Writes an immutable content blob and returns its id. The row is
    /// never updated afterwards.
    pub async fn create_file(
        &self,
        name: &str,
        author_id: i64,
        data: &[u8],
    ) -> Result<i64, StoreError> {
        let content_hash = sha256_hex(data);

        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "INSERT INTO berth_files (name, content_hash, author_id, data) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(name)
            .bind(&content_hash)
            .bind(author_id)
            .bind(data)
            .fetch_one(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.try_get("id")?)
    }

    pub async fn file_by_id(&self, id: i64) -> Result<Option<FileBlob>, StoreError> {
        let row = tokio::time::timeout(
            self.op_timeout(),
            sqlx::query(
                "SELECT id, name, content_hash, author_id, data FROM berth_files WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(FileBlob {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            content_hash: row.try_get("content_hash")?,
            author_id: row.try_get("author_id")?,
            data: row.try_get("data")?,
        }))
    }
}
