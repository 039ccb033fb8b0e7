// src/db/postgres.rs
// DOCUMENTATION: PostgreSQL place store
// PURPOSE: Compose writer, reader and like repository behind PlaceStore

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::like_repository::{LikeCounter, PgLikeRepository};
use super::reader::PlaceReader;
use super::store::PlaceStore;
use super::writer::PlaceWriter;
use crate::errors::PlacesError;
use crate::models::{
    NewRecommendation, NewUserPhoto, Place, PlaceDetail, ProviderPlaceData, Recommendation,
    ResolvedPhotoData, UserPhoto,
};
use crate::services::geo_search::RadiusQuery;
use crate::services::pipeline::WritePipeline;

pub struct PgPlaceStore {
    writer: PlaceWriter,
    reader: PlaceReader,
    likes: PgLikeRepository,
}

impl PgPlaceStore {
    pub fn new(pool: PgPool, pipeline: WritePipeline) -> Self {
        let likes = PgLikeRepository::new(pool.clone());

        Self {
            writer: PlaceWriter::new(pool.clone(), pipeline),
            reader: PlaceReader::new(pool, Arc::new(likes.clone())),
            likes,
        }
    }

    /// Replace the like counter used when merging counts into reads
    pub fn with_like_counter(mut self, counter: Arc<dyn LikeCounter>) -> Self {
        self.reader.set_like_counter(counter);
        self
    }
}

#[async_trait]
impl PlaceStore for PgPlaceStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn save_batch(&self, places: Vec<ProviderPlaceData>) -> Result<Vec<Place>, PlacesError> {
        let external_ids = self.writer.save_batch(places).await?;
        self.reader.find_by_external_ids(&external_ids).await
    }

    async fn save_detail(&self, external_id: &str, detail: PlaceDetail) -> Result<(), PlacesError> {
        self.writer.save_detail(external_id, detail).await
    }

    async fn save_photos(
        &self,
        external_id: &str,
        photos: Vec<ResolvedPhotoData>,
    ) -> Result<(), PlacesError> {
        self.writer.save_photos(external_id, photos).await
    }

    async fn find_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<Place>, PlacesError> {
        self.reader.find_by_external_ids(external_ids).await
    }

    async fn find_by_place_ids(&self, place_ids: &[Uuid]) -> Result<Vec<Place>, PlacesError> {
        self.reader.find_by_place_ids(place_ids).await
    }

    async fn find_by_radius(&self, query: &RadiusQuery) -> Result<Vec<Place>, PlacesError> {
        self.reader.find_by_radius(query).await
    }

    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError> {
        self.likes.count_likes(place_ids).await
    }

    async fn add_like(&self, place_id: Uuid, user_id: Uuid) -> Result<bool, PlacesError> {
        self.likes.add_like(place_id, user_id).await
    }

    async fn add_user_photo(
        &self,
        place_id: Uuid,
        photo: NewUserPhoto,
    ) -> Result<UserPhoto, PlacesError> {
        self.writer.add_user_photo(place_id, photo).await
    }

    async fn add_recommendation(
        &self,
        place_id: Uuid,
        recommendation: NewRecommendation,
    ) -> Result<Recommendation, PlacesError> {
        self.writer.add_recommendation(place_id, recommendation).await
    }

    async fn delete_place(&self, place_id: Uuid) -> Result<bool, PlacesError> {
        self.writer.delete_place(place_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::run_migrations;
    use crate::models::{GeoPoint, OpeningPeriod, PhotoData, Review};
    use chrono::{TimeZone, Utc};
    use sqlx::postgres::PgPoolOptions;
    use tokio_test::{assert_err, assert_ok};

    /// Store against TEST_DATABASE_URL, None when it is not set
    async fn test_store() -> Option<(PgPlaceStore, PgPool)> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .ok()?;
        run_migrations(&pool).await.ok()?;
        Some((PgPlaceStore::new(pool.clone(), WritePipeline::standard()), pool))
    }

    fn place(external_id: &str, lat: f64, lon: f64) -> ProviderPlaceData {
        ProviderPlaceData {
            external_id: external_id.to_string(),
            name: format!("Place {}", external_id),
            location: GeoPoint::new(lat, lon),
            price_level: Some(2),
            rating: Some(4.2),
            rating_count: Some(10),
            formatted_address: None,
            types: vec!["bar".to_string(), "food".to_string()],
            photos: vec![PhotoData {
                reference: format!("{}-photo", external_id),
                width: 800,
                height: 600,
                html_attributions: vec!["<a>author</a>".to_string()],
                resolved: vec![],
            }],
            detail: Some(PlaceDetail {
                reviews: vec![Review {
                    rating: 5,
                    text: Some("Genial".to_string()),
                    time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                    author_name: "Elena".to_string(),
                    author_url: None,
                    author_photo_url: None,
                    language: Some("es".to_string()),
                }],
                ..PlaceDetail::default()
            }),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_round_trip_and_delete() {
        let Some((store, pool)) = test_store().await else {
            return;
        };
        let external_id = format!("pg-test-{}", Uuid::new_v4());
        let input = place(&external_id, 41.6488, -0.8891);

        let saved = assert_ok!(store.save_batch(vec![input.clone(), input.clone()]).await);
        assert_eq!(saved.len(), 1);
        assert_ok!(store.save_batch(vec![input.clone()]).await);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM provider_places WHERE external_id = $1")
                .bind(&external_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        let found = assert_ok!(store.find_by_external_id(&external_id).await).unwrap();
        let provider = found.provider.as_ref().unwrap();
        assert_eq!(provider.types, vec!["bar", "food"]);
        assert_eq!(provider.photos.len(), 1);
        assert_eq!(provider.reviews.len(), 1);

        assert_ok!(store.save_detail(&external_id, input.detail.clone().unwrap()).await);
        let again = assert_ok!(store.find_by_external_id(&external_id).await).unwrap();
        assert_eq!(again.provider.unwrap().reviews.len(), 1);

        assert_err!(store.save_detail("pg-missing", PlaceDetail::default()).await);

        // attach a row to every child table before deleting
        assert_ok!(
            store
                .save_photos(
                    &external_id,
                    vec![ResolvedPhotoData {
                        reference: format!("{}-photo", external_id),
                        url: "https://cdn.example.com/pg.jpg".to_string(),
                        width: 400,
                        height: 300,
                    }],
                )
                .await
        );
        assert!(assert_ok!(store.add_like(found.id, Uuid::new_v4()).await));
        assert_ok!(
            store
                .add_user_photo(
                    found.id,
                    NewUserPhoto {
                        user_id: Uuid::new_v4(),
                        url: "https://cdn.example.com/user.jpg".to_string(),
                    },
                )
                .await
        );
        assert_ok!(
            store
                .add_recommendation(
                    found.id,
                    NewRecommendation {
                        user_id: Uuid::new_v4(),
                        text: "Pide las bravas".to_string(),
                    },
                )
                .await
        );
        let opening_periods = PlaceDetail {
            opening_periods: vec![OpeningPeriod {
                open_day: 1,
                open_time: "1200".to_string(),
                close_day: 1,
                close_time: "2300".to_string(),
            }],
            ..PlaceDetail::default()
        };
        assert_ok!(store.save_detail(&external_id, opening_periods).await);

        let provider_id = provider.id;
        let reference_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM photo_references WHERE provider_place_id = $1")
                .bind(provider_id)
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(!reference_ids.is_empty());

        assert!(assert_ok!(store.delete_place(found.id).await));
        assert!(assert_ok!(store.find_by_external_id(&external_id).await).is_none());
        assert!(!assert_ok!(store.delete_place(found.id).await));

        let by_provider = [
            "SELECT COUNT(*) FROM category_types WHERE provider_place_id = $1",
            "SELECT COUNT(*) FROM photo_references WHERE provider_place_id = $1",
            "SELECT COUNT(*) FROM reviews WHERE provider_place_id = $1",
            "SELECT COUNT(*) FROM opening_periods WHERE provider_place_id = $1",
            "SELECT COUNT(*) FROM provider_places WHERE id = $1",
        ];
        for sql in by_provider {
            let orphans: i64 = sqlx::query_scalar(sql)
                .bind(provider_id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(orphans, 0, "{}", sql);
        }

        let by_reference = [
            "SELECT COUNT(*) FROM photo_attributions WHERE photo_reference_id = ANY($1)",
            "SELECT COUNT(*) FROM resolved_photos WHERE photo_reference_id = ANY($1)",
        ];
        for sql in by_reference {
            let orphans: i64 = sqlx::query_scalar(sql)
                .bind(reference_ids.as_slice())
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(orphans, 0, "{}", sql);
        }

        let by_place = [
            "SELECT COUNT(*) FROM user_photos WHERE place_id = $1",
            "SELECT COUNT(*) FROM recommendations WHERE place_id = $1",
            "SELECT COUNT(*) FROM place_likes WHERE place_id = $1",
            "SELECT COUNT(*) FROM places WHERE id = $1",
        ];
        for sql in by_place {
            let orphans: i64 = sqlx::query_scalar(sql)
                .bind(found.id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(orphans, 0, "{}", sql);
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_radius_with_categories() {
        let Some((store, _pool)) = test_store().await else {
            return;
        };
        let near = format!("pg-near-{}", Uuid::new_v4());
        let far = format!("pg-far-{}", Uuid::new_v4());

        assert_ok!(
            store
                .save_batch(vec![
                    place(&near, 10.0005, 20.0),
                    place(&far, 10.1, 20.0),
                ])
                .await
        );

        let query = RadiusQuery::new(
            GeoPoint::new(10.0, 20.0),
            1_000.0,
            vec!["bar".to_string(), "food".to_string()],
        );
        let found = assert_ok!(store.find_by_radius(&query).await);
        let ids: Vec<&str> = found.iter().filter_map(|p| p.external_id()).collect();

        assert!(ids.contains(&near.as_str()));
        assert!(!ids.contains(&far.as_str()));
        assert_eq!(ids.iter().filter(|id| **id == near).count(), 1);
    }
}
