// src/db/photo_rewrite.rs
// DOCUMENTATION: Out-of-band resolved photo URL rewrite
// PURPOSE: Move stored photo URLs to a new host or bucket prefix

use sqlx::PgPool;

use crate::errors::PlacesError;

/// Replace `from` with `to` when `url` starts with `from`
pub fn rewrite_url(url: &str, from: &str, to: &str) -> Option<String> {
    url.strip_prefix(from).map(|rest| format!("{}{}", to, rest))
}

pub struct PhotoUrlRewriter {
    pool: PgPool,
}

impl PhotoUrlRewriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Up to `limit` (old, new) URL pairs the rewrite would produce
    pub async fn preview(
        &self,
        from: &str,
        to: &str,
        limit: i64,
    ) -> Result<Vec<(String, String)>, PlacesError> {
        let urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM resolved_photos WHERE left(url, length($1)) = $1 ORDER BY url LIMIT $2",
        )
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(PlacesError::database("rewrite_prefix: preview"))?;

        Ok(urls
            .into_iter()
            .filter_map(|url| rewrite_url(&url, from, to).map(|new| (url, new)))
            .collect())
    }

    /// Rewrite the prefix of every matching resolved photo URL
    /// DOCUMENTATION: Runs in one transaction and returns the number of rows
    /// that match. With `dry_run` the rows are counted and nothing changes.
    pub async fn rewrite_prefix(
        &self,
        from: &str,
        to: &str,
        dry_run: bool,
    ) -> Result<u64, PlacesError> {
        if from.is_empty() {
            return Err(PlacesError::ValidationError(
                "source prefix must not be empty".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PlacesError::database("rewrite_prefix: begin"))?;

        let matching: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM resolved_photos WHERE left(url, length($1)) = $1",
        )
        .bind(from)
        .fetch_one(&mut *tx)
        .await
        .map_err(PlacesError::database("rewrite_prefix: count"))?;

        if dry_run {
            log::info!(
                "rewrite_prefix (dry run): {} URLs start with {}",
                matching,
                from
            );
            return Ok(matching as u64);
        }

        let updated = sqlx::query(
            r#"
            UPDATE resolved_photos
            SET url = $2 || substr(url, length($1) + 1)
            WHERE left(url, length($1)) = $1
            "#,
        )
        .bind(from)
        .bind(to)
        .execute(&mut *tx)
        .await
        .map_err(PlacesError::database("rewrite_prefix: update"))?
        .rows_affected();

        tx.commit()
            .await
            .map_err(PlacesError::database("rewrite_prefix: commit"))?;

        log::info!("rewrite_prefix: rewrote {} URLs from {} to {}", updated, from, to);

        Ok(updated)
    }
}
