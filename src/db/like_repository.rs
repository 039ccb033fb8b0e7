// src/db/like_repository.rs
// DOCUMENTATION: Like events and like count aggregation
// PURPOSE: Grouped count query kept apart from hydration; its failure never
// aborts a read

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::PlacesError;
use crate::models::Place;

/// Source of like counts
/// DOCUMENTATION: Places without likes are absent from the returned map
#[async_trait]
pub trait LikeCounter: Send + Sync {
    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError>;
}

/// Like counts from the `place_likes` table
#[derive(Clone)]
pub struct PgLikeRepository {
    pool: PgPool,
}

impl PgLikeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a like; false when the user already liked the place
    /// DOCUMENTATION: NotFound when the place does not exist
    pub async fn add_like(&self, place_id: Uuid, user_id: Uuid) -> Result<bool, PlacesError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM places WHERE id = $1)")
            .bind(place_id)
            .fetch_one(&self.pool)
            .await
            .map_err(PlacesError::database("add_like: check place"))?;

        if !exists {
            return Err(PlacesError::NotFound(place_id.to_string()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO place_likes (place_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (place_id, user_id) DO NOTHING
            "#,
        )
        .bind(place_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(PlacesError::database("add_like: insert"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LikeCounter for PgLikeRepository {
    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError> {
        if place_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT place_id, COUNT(*) AS likes
            FROM place_likes
            WHERE place_id = ANY($1)
            GROUP BY place_id
            "#,
        )
        .bind(place_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(PlacesError::database("count_likes"))?;

        Ok(rows.into_iter().collect())
    }
}

/// Merge like counts into hydrated places
/// DOCUMENTATION: Soft failure. A failing counter is logged and every place
/// keeps a count of 0.
pub async fn merge_like_counts(likes: &dyn LikeCounter, places: &mut [Place]) {
    if places.is_empty() {
        return;
    }

    let ids: Vec<Uuid> = places.iter().map(|p| p.id).collect();

    match likes.count_likes(&ids).await {
        Ok(counts) => {
            for place in places.iter_mut() {
                place.like_count = counts.get(&place.id).copied().unwrap_or(0);
            }
        }
        Err(e) => {
            log::warn!(
                "Like count aggregation failed for {} places, returning zero counts: {}",
                ids.len(),
                e
            );
            for place in places.iter_mut() {
                place.like_count = 0;
            }
        }
    }
}
