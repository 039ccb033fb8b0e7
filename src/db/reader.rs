// src/db/reader.rs
// DOCUMENTATION: PostgreSQL read path
// PURPOSE: Joined-row retrieval of provider places with every child relation,
// handed to the pure hydrate reducer

use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::like_repository::{merge_like_counts, LikeCounter};
use crate::errors::PlacesError;
use crate::mapper::{
    hydrate, CategoryTypeRow, ChildRows, JoinedPlaceRow, OpeningPeriodRow, PhotoAttributionRow,
    PhotoReferenceRow, PlaceRowSet, RecommendationRow, ResolvedPhotoRow, ReviewRow, UserPhotoRow,
};
use crate::models::Place;
use crate::services::geo_search::RadiusQuery;

/// Provider place joined with its parent place and every child relation,
/// each aggregated into a JSON array
const HYDRATE_SELECT: &str = r#"
    SELECT
        p.id AS place_id,
        p.name AS place_name,
        p.created_at AS place_created_at,
        pp.id,
        pp.external_id,
        pp.name,
        pp.lat,
        pp.lon,
        pp.price_level,
        pp.rating,
        pp.rating_count,
        pp.formatted_address,
        COALESCE((
            SELECT json_agg(ct ORDER BY ct.order_num)
            FROM category_types ct
            WHERE ct.provider_place_id = pp.id
        ), '[]'::json) AS category_types,
        COALESCE((
            SELECT json_agg(pr ORDER BY pr.position)
            FROM photo_references pr
            WHERE pr.provider_place_id = pp.id
        ), '[]'::json) AS photo_references,
        COALESCE((
            SELECT json_agg(pa ORDER BY pa.photo_reference_id, pa.position)
            FROM photo_attributions pa
            JOIN photo_references pr ON pr.id = pa.photo_reference_id
            WHERE pr.provider_place_id = pp.id
        ), '[]'::json) AS photo_attributions,
        COALESCE((
            SELECT json_agg(rp ORDER BY rp.width, rp.height)
            FROM resolved_photos rp
            JOIN photo_references pr ON pr.id = rp.photo_reference_id
            WHERE pr.provider_place_id = pp.id
        ), '[]'::json) AS resolved_photos,
        COALESCE((
            SELECT json_agg(r ORDER BY r.time, r.author_name)
            FROM reviews r
            WHERE r.provider_place_id = pp.id
        ), '[]'::json) AS reviews,
        COALESCE((
            SELECT json_agg(op ORDER BY op.open_day, op.open_time)
            FROM opening_periods op
            WHERE op.provider_place_id = pp.id
        ), '[]'::json) AS opening_periods
    FROM provider_places pp
    JOIN places p ON p.id = pp.place_id
"#;

/// Read side of the PostgreSQL backend
pub struct PlaceReader {
    pool: PgPool,
    likes: Arc<dyn LikeCounter>,
}

impl PlaceReader {
    pub fn new(pool: PgPool, likes: Arc<dyn LikeCounter>) -> Self {
        Self { pool, likes }
    }

    pub fn set_like_counter(&mut self, likes: Arc<dyn LikeCounter>) {
        self.likes = likes;
    }

    pub async fn find_by_external_ids(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<Place>, PlacesError> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE pp.external_id = ANY($1)", HYDRATE_SELECT);
        let rows: Vec<JoinedPlaceRow> = sqlx::query_as(&sql)
            .bind(external_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(PlacesError::database("find_by_external_ids"))?;

        let places = self.assemble(rows).await?;
        let mut by_external_id: HashMap<String, Place> = places
            .into_iter()
            .filter_map(|p| p.external_id().map(str::to_string).map(|id| (id, p)))
            .collect();

        Ok(external_ids
            .iter()
            .filter_map(|id| by_external_id.remove(id))
            .collect())
    }

    pub async fn find_by_place_ids(&self, place_ids: &[Uuid]) -> Result<Vec<Place>, PlacesError> {
        if place_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE p.id = ANY($1)", HYDRATE_SELECT);
        let rows: Vec<JoinedPlaceRow> = sqlx::query_as(&sql)
            .bind(place_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(PlacesError::database("find_by_place_ids"))?;

        let places = self.assemble(rows).await?;
        let mut by_id: HashMap<Uuid, Place> = places.into_iter().map(|p| (p.id, p)).collect();

        Ok(place_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Radius search with optional any-of category filter
    /// DOCUMENTATION: Bounding rectangle on the indexed lat/lon columns first,
    /// then exact spherical distance on the geography point
    pub async fn find_by_radius(&self, query: &RadiusQuery) -> Result<Vec<Place>, PlacesError> {
        query.validate()?;

        let rect = query.bounding_rect();
        let category_join = if query.categories.is_empty() {
            ""
        } else {
            "JOIN category_types f ON f.provider_place_id = pp.id AND f.type = ANY($8)"
        };

        let sql = format!(
            r#"
            {select}
            {category_join}
            WHERE pp.lat BETWEEN $1 AND $2
              AND pp.lon BETWEEN $3 AND $4
              AND ST_Distance(pp.point, ST_SetSRID(ST_MakePoint($5, $6), 4326)::geography, false) <= $7
            ORDER BY ST_Distance(pp.point, ST_SetSRID(ST_MakePoint($5, $6), 4326)::geography, false), pp.id
            "#,
            select = HYDRATE_SELECT,
            category_join = category_join,
        );

        log::debug!(
            "Radius query: center=({}, {}) radius={}m categories={:?}",
            query.center.lat,
            query.center.lon,
            query.radius_meters,
            query.categories
        );

        let mut q = sqlx::query_as::<_, JoinedPlaceRow>(&sql)
            .bind(rect.min().y)
            .bind(rect.max().y)
            .bind(rect.min().x)
            .bind(rect.max().x)
            .bind(query.center.lon)
            .bind(query.center.lat)
            .bind(query.radius_meters);
        if !query.categories.is_empty() {
            q = q.bind(query.categories.as_slice());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(PlacesError::database("find_by_radius"))?;

        self.assemble(rows).await
    }

    /// Split joined rows, load place attachments, hydrate and merge likes
    async fn assemble(&self, rows: Vec<JoinedPlaceRow>) -> Result<Vec<Place>, PlacesError> {
        let mut set = PlaceRowSet::from_joined(rows);
        if set.places.is_empty() {
            return Ok(Vec::new());
        }

        let place_ids: Vec<Uuid> = set.places.iter().map(|p| p.id).collect();

        set.user_photos = sqlx::query_as::<_, UserPhotoRow>(
            r#"
            SELECT id, place_id, user_id, url, created_at
            FROM user_photos
            WHERE place_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(place_ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(PlacesError::database("load user_photos"))?;

        set.recommendations = sqlx::query_as::<_, RecommendationRow>(
            r#"
            SELECT id, place_id, user_id, text, created_at
            FROM recommendations
            WHERE place_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(place_ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(PlacesError::database("load recommendations"))?;

        let mut places = hydrate(set);
        merge_like_counts(self.likes.as_ref(), &mut places).await;

        Ok(places)
    }
}

/// Load every stored child row of one provider place
/// DOCUMENTATION: Runs on the caller's connection so it sees the rows of
/// the enclosing transaction
pub async fn fetch_child_rows(
    conn: &mut PgConnection,
    provider_place_id: Uuid,
) -> Result<ChildRows, PlacesError> {
    let category_types = sqlx::query_as::<_, CategoryTypeRow>(
        "SELECT id, provider_place_id, type, order_num FROM category_types WHERE provider_place_id = $1",
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load category_types"))?;

    let photo_references = sqlx::query_as::<_, PhotoReferenceRow>(
        r#"
        SELECT id, provider_place_id, reference, width, height, position
        FROM photo_references
        WHERE provider_place_id = $1
        ORDER BY position
        "#,
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load photo_references"))?;

    let photo_attributions = sqlx::query_as::<_, PhotoAttributionRow>(
        r#"
        SELECT pa.id, pa.photo_reference_id, pa.html_attribution, pa.position
        FROM photo_attributions pa
        JOIN photo_references pr ON pr.id = pa.photo_reference_id
        WHERE pr.provider_place_id = $1
        ORDER BY pa.photo_reference_id, pa.position
        "#,
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load photo_attributions"))?;

    let resolved_photos = sqlx::query_as::<_, ResolvedPhotoRow>(
        r#"
        SELECT rp.id, rp.photo_reference_id, rp.width, rp.height, rp.url
        FROM resolved_photos rp
        JOIN photo_references pr ON pr.id = rp.photo_reference_id
        WHERE pr.provider_place_id = $1
        "#,
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load resolved_photos"))?;

    let reviews = sqlx::query_as::<_, ReviewRow>(
        r#"
        SELECT id, provider_place_id, rating, text, time, author_name,
               author_url, author_photo_url, language
        FROM reviews
        WHERE provider_place_id = $1
        "#,
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load reviews"))?;

    let opening_periods = sqlx::query_as::<_, OpeningPeriodRow>(
        r#"
        SELECT id, provider_place_id, open_day, close_day, open_time, close_time
        FROM opening_periods
        WHERE provider_place_id = $1
        "#,
    )
    .bind(provider_place_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(PlacesError::database("load opening_periods"))?;

    Ok(ChildRows {
        category_types,
        photo_references,
        photo_attributions,
        resolved_photos,
        reviews,
        opening_periods,
    })
}
