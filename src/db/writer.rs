// src/db/writer.rs
// DOCUMENTATION: PostgreSQL write path
// PURPOSE: Transactional, dedup-aware multi-table inserts of place aggregates,
// detail augmentation, resolved photos and cascading delete

use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use super::reader::fetch_child_rows;
use crate::errors::PlacesError;
use crate::mapper::{
    flatten_new_place, merge_photo_sources, plan_child_rows, plan_resolved_photos,
    recommendation_row, user_photo_row, CategoryTypeRow, ChildRows, OpeningPeriodRow,
    PhotoAttributionRow, PhotoReferenceRow, PlaceRow, PlaceRowSet, ProviderPlaceRow,
    RecommendationRow, ResolvedPhotoRow, ReviewRow, UserPhotoRow,
};
use crate::models::{
    NewRecommendation, NewUserPhoto, PlaceDetail, ProviderPlaceData, Recommendation,
    ResolvedPhotoData, UserPhoto,
};
use crate::services::pipeline::WritePipeline;

/// Rows per multi-row INSERT; keeps every statement well below the
/// PostgreSQL limit of 65535 bind parameters
const INSERT_CHUNK: usize = 1000;

/// Write side of the PostgreSQL backend
pub struct PlaceWriter {
    pool: PgPool,
    pipeline: WritePipeline,
}

impl PlaceWriter {
    pub fn new(pool: PgPool, pipeline: WritePipeline) -> Self {
        Self { pool, pipeline }
    }

    /// Insert every place of the batch that is not stored yet
    /// DOCUMENTATION: Returns the external ids of the whole (pipelined)
    /// batch, in input order, for re-hydration by the reader. One
    /// transaction covers the batch: any failure rolls back every place.
    pub async fn save_batch(
        &self,
        places: Vec<ProviderPlaceData>,
    ) -> Result<Vec<String>, PlacesError> {
        let places = self.pipeline.prepare_batch(places)?;
        let external_ids: Vec<String> = places.iter().map(|p| p.external_id.clone()).collect();

        if places.is_empty() {
            return Ok(external_ids);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PlacesError::database("save_batch: begin"))?;

        let existing: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT external_id FROM provider_places WHERE external_id = ANY($1)",
        )
        .bind(external_ids.as_slice())
        .fetch_all(&mut *tx)
        .await
        .map_err(PlacesError::database("save_batch: lookup existing"))?
        .into_iter()
        .collect();

        let now = Utc::now();
        let mut rows = PlaceRowSet::default();
        for place in places.iter().filter(|p| !existing.contains(&p.external_id)) {
            rows.extend(flatten_new_place(place, now).into());
        }

        if rows.places.is_empty() {
            log::debug!("save_batch: all {} places already stored", external_ids.len());
            return Ok(external_ids);
        }

        insert_places(&mut tx, &rows.places).await?;
        let inserted = insert_provider_places(&mut tx, &rows.provider_places).await?;

        if inserted.len() < rows.provider_places.len() {
            // Lost the race for these ids to a concurrent writer
            let lost: Vec<Uuid> = rows
                .provider_places
                .iter()
                .filter(|p| !inserted.contains(&p.external_id))
                .map(|p| p.place_id)
                .collect();

            log::info!(
                "save_batch: {} places were stored concurrently, skipping them",
                lost.len()
            );

            sqlx::query("DELETE FROM places WHERE id = ANY($1)")
                .bind(lost.as_slice())
                .execute(&mut *tx)
                .await
                .map_err(PlacesError::database("save_batch: discard lost places"))?;

            rows.retain_external_ids(&inserted);
        }

        insert_children(&mut tx, &rows.children).await?;

        tx.commit()
            .await
            .map_err(PlacesError::database("save_batch: commit"))?;

        log::info!(
            "save_batch: stored {} new places ({} child rows), {} already present",
            rows.places.len(),
            rows.children.len(),
            external_ids.len() - rows.places.len()
        );

        Ok(external_ids)
    }

    /// Add the detail rows whose natural key is not stored yet
    pub async fn save_detail(
        &self,
        external_id: &str,
        detail: PlaceDetail,
    ) -> Result<(), PlacesError> {
        let detail = self.pipeline.prepare_detail(detail)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PlacesError::database("save_detail: begin"))?;

        let provider_place_id = lock_provider_place(&mut tx, external_id).await?;
        let existing = fetch_child_rows(&mut tx, provider_place_id).await?;

        let photos = merge_photo_sources(&[], &detail.photos);
        let planned = plan_child_rows(
            provider_place_id,
            &existing,
            &photos,
            &detail.reviews,
            &detail.opening_periods,
        );

        insert_children(&mut tx, &planned).await?;

        tx.commit()
            .await
            .map_err(PlacesError::database("save_detail: commit"))?;

        log::info!(
            "save_detail: {} new rows for {} ({} photos, {} reviews, {} periods)",
            planned.len(),
            external_id,
            planned.photo_references.len(),
            planned.reviews.len(),
            planned.opening_periods.len()
        );

        Ok(())
    }

    /// Add resolved URLs for references the place already owns
    pub async fn save_photos(
        &self,
        external_id: &str,
        photos: Vec<ResolvedPhotoData>,
    ) -> Result<(), PlacesError> {
        let photos = self.pipeline.prepare_photos(photos)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PlacesError::database("save_photos: begin"))?;

        let provider_place_id = lock_provider_place(&mut tx, external_id).await?;
        let existing = fetch_child_rows(&mut tx, provider_place_id).await?;
        let planned = plan_resolved_photos(&existing, &photos)?;

        insert_resolved_photos(&mut tx, &planned).await?;

        tx.commit()
            .await
            .map_err(PlacesError::database("save_photos: commit"))?;

        log::info!(
            "save_photos: {} new resolved photos for {}",
            planned.len(),
            external_id
        );

        Ok(())
    }

    pub async fn add_user_photo(
        &self,
        place_id: Uuid,
        photo: NewUserPhoto,
    ) -> Result<UserPhoto, PlacesError> {
        photo
            .validate()
            .map_err(|e| PlacesError::ValidationError(e.to_string()))?;
        self.ensure_place(place_id).await?;

        let row = user_photo_row(place_id, &photo, Utc::now());
        insert_user_photos(&self.pool, std::slice::from_ref(&row)).await?;

        Ok(UserPhoto {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            created_at: row.created_at,
        })
    }

    pub async fn add_recommendation(
        &self,
        place_id: Uuid,
        recommendation: NewRecommendation,
    ) -> Result<Recommendation, PlacesError> {
        recommendation
            .validate()
            .map_err(|e| PlacesError::ValidationError(e.to_string()))?;
        self.ensure_place(place_id).await?;

        let row = recommendation_row(place_id, &recommendation, Utc::now());
        insert_recommendations(&self.pool, std::slice::from_ref(&row)).await?;

        Ok(Recommendation {
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            created_at: row.created_at,
        })
    }

    /// Delete a place and every row it owns, child tables first
    pub async fn delete_place(&self, place_id: Uuid) -> Result<bool, PlacesError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PlacesError::database("delete_place: begin"))?;

        let provider_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM provider_places WHERE place_id = $1")
                .bind(place_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(PlacesError::database("delete_place: lookup provider"))?;

        let by_reference = [
            ("resolved_photos", "delete_place: resolved_photos"),
            ("photo_attributions", "delete_place: photo_attributions"),
        ];
        for (table, context) in by_reference {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE photo_reference_id IN \
                 (SELECT id FROM photo_references WHERE provider_place_id = ANY($1))",
                table
            ))
            .bind(provider_ids.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(PlacesError::database(context))?;
        }

        let by_provider = [
            ("photo_references", "delete_place: photo_references"),
            ("reviews", "delete_place: reviews"),
            ("opening_periods", "delete_place: opening_periods"),
            ("category_types", "delete_place: category_types"),
        ];
        for (table, context) in by_provider {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE provider_place_id = ANY($1)",
                table
            ))
            .bind(provider_ids.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(PlacesError::database(context))?;
        }

        let by_place = [
            ("provider_places", "delete_place: provider_places"),
            ("user_photos", "delete_place: user_photos"),
            ("recommendations", "delete_place: recommendations"),
            ("place_likes", "delete_place: place_likes"),
        ];
        for (table, context) in by_place {
            sqlx::query(&format!("DELETE FROM {} WHERE place_id = $1", table))
                .bind(place_id)
                .execute(&mut *tx)
                .await
                .map_err(PlacesError::database(context))?;
        }

        let deleted = sqlx::query("DELETE FROM places WHERE id = $1")
            .bind(place_id)
            .execute(&mut *tx)
            .await
            .map_err(PlacesError::database("delete_place: places"))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(PlacesError::database("delete_place: commit"))?;

        if deleted > 0 {
            log::info!("delete_place: removed place {}", place_id);
        }

        Ok(deleted > 0)
    }

    async fn ensure_place(&self, place_id: Uuid) -> Result<(), PlacesError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM places WHERE id = $1)")
            .bind(place_id)
            .fetch_one(&self.pool)
            .await
            .map_err(PlacesError::database("check place"))?;

        if exists {
            Ok(())
        } else {
            Err(PlacesError::NotFound(place_id.to_string()))
        }
    }
}

/// Provider place id for an external id, row-locked for the transaction
async fn lock_provider_place(
    conn: &mut PgConnection,
    external_id: &str,
) -> Result<Uuid, PlacesError> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM provider_places WHERE external_id = $1 FOR UPDATE")
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(PlacesError::database("lookup provider place"))?
        .ok_or_else(|| PlacesError::NotFound(external_id.to_string()))
}

async fn insert_places(conn: &mut PgConnection, rows: &[PlaceRow]) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO places (id, name, created_at) ");
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.name.as_str())
                .push_bind(row.created_at);
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert places"))?;
    }
    Ok(())
}

/// Insert provider places, skipping external ids stored concurrently
/// DOCUMENTATION: Returns the external ids this call actually inserted
async fn insert_provider_places(
    conn: &mut PgConnection,
    rows: &[ProviderPlaceRow],
) -> Result<HashSet<String>, PlacesError> {
    let mut inserted = HashSet::new();

    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO provider_places (id, external_id, place_id, name, lat, lon, point, \
             price_level, rating, rating_count, formatted_address) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.external_id.as_str())
                .push_bind(row.place_id)
                .push_bind(row.name.as_str())
                .push_bind(row.lat)
                .push_bind(row.lon)
                .push("ST_SetSRID(ST_MakePoint(")
                .push_bind_unseparated(row.lon)
                .push_unseparated(", ")
                .push_bind_unseparated(row.lat)
                .push_unseparated("), 4326)::geography")
                .push_bind(row.price_level)
                .push_bind(row.rating)
                .push_bind(row.rating_count)
                .push_bind(row.formatted_address.as_deref());
        });
        qb.push(" ON CONFLICT (external_id) DO NOTHING RETURNING external_id");

        let ids: Vec<String> = qb
            .build_query_scalar()
            .fetch_all(&mut *conn)
            .await
            .map_err(PlacesError::database("insert provider_places"))?;
        inserted.extend(ids);
    }

    Ok(inserted)
}

/// Insert child rows in dependency order
async fn insert_children(conn: &mut PgConnection, rows: &ChildRows) -> Result<(), PlacesError> {
    insert_category_types(conn, &rows.category_types).await?;
    insert_photo_references(conn, &rows.photo_references).await?;
    insert_photo_attributions(conn, &rows.photo_attributions).await?;
    insert_resolved_photos(conn, &rows.resolved_photos).await?;
    insert_reviews(conn, &rows.reviews).await?;
    insert_opening_periods(conn, &rows.opening_periods).await?;
    Ok(())
}

async fn insert_category_types(
    conn: &mut PgConnection,
    rows: &[CategoryTypeRow],
) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO category_types (id, provider_place_id, type, order_num) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.provider_place_id)
                .push_bind(row.type_name.as_str())
                .push_bind(row.order_num);
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert category_types"))?;
    }
    Ok(())
}

async fn insert_photo_references(
    conn: &mut PgConnection,
    rows: &[PhotoReferenceRow],
) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO photo_references (id, provider_place_id, reference, width, height, position) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.provider_place_id)
                .push_bind(row.reference.as_str())
                .push_bind(row.width)
                .push_bind(row.height)
                .push_bind(row.position);
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert photo_references"))?;
    }
    Ok(())
}

async fn insert_photo_attributions(
    conn: &mut PgConnection,
    rows: &[PhotoAttributionRow],
) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO photo_attributions (id, photo_reference_id, html_attribution, position) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.photo_reference_id)
                .push_bind(row.html_attribution.as_str())
                .push_bind(row.position);
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert photo_attributions"))?;
    }
    Ok(())
}

async fn insert_resolved_photos(
    conn: &mut PgConnection,
    rows: &[ResolvedPhotoRow],
) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO resolved_photos (id, photo_reference_id, width, height, url) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.photo_reference_id)
                .push_bind(row.width)
                .push_bind(row.height)
                .push_bind(row.url.as_str());
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert resolved_photos"))?;
    }
    Ok(())
}

async fn insert_reviews(conn: &mut PgConnection, rows: &[ReviewRow]) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO reviews (id, provider_place_id, rating, text, time, author_name, \
             author_url, author_photo_url, language) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.provider_place_id)
                .push_bind(row.rating)
                .push_bind(row.text.as_deref())
                .push_bind(row.time)
                .push_bind(row.author_name.as_str())
                .push_bind(row.author_url.as_deref())
                .push_bind(row.author_photo_url.as_deref())
                .push_bind(row.language.as_deref());
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert reviews"))?;
    }
    Ok(())
}

async fn insert_opening_periods(
    conn: &mut PgConnection,
    rows: &[OpeningPeriodRow],
) -> Result<(), PlacesError> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO opening_periods (id, provider_place_id, open_day, close_day, \
             open_time, close_time) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.provider_place_id)
                .push_bind(row.open_day)
                .push_bind(row.close_day)
                .push_bind(row.open_time.as_str())
                .push_bind(row.close_time.as_str());
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(PlacesError::database("insert opening_periods"))?;
    }
    Ok(())
}

async fn insert_user_photos(pool: &PgPool, rows: &[UserPhotoRow]) -> Result<(), PlacesError> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO user_photos (id, place_id, user_id, url, created_at) ");
    qb.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.place_id)
            .push_bind(row.user_id)
            .push_bind(row.url.as_str())
            .push_bind(row.created_at);
    });
    qb.build()
        .execute(pool)
        .await
        .map_err(PlacesError::database("insert user_photos"))?;
    Ok(())
}

async fn insert_recommendations(
    pool: &PgPool,
    rows: &[RecommendationRow],
) -> Result<(), PlacesError> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO recommendations (id, place_id, user_id, text, created_at) ");
    qb.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.place_id)
            .push_bind(row.user_id)
            .push_bind(row.text.as_str())
            .push_bind(row.created_at);
    });
    qb.build()
        .execute(pool)
        .await
        .map_err(PlacesError::database("insert recommendations"))?;
    Ok(())
}
