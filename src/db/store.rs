// src/db/store.rs
// DOCUMENTATION: Place store contract
// PURPOSE: Operation surface shared by the PostgreSQL and document backends

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::PlacesError;
use crate::models::{
    NewRecommendation, NewUserPhoto, Place, PlaceDetail, ProviderPlaceData, Recommendation,
    ResolvedPhotoData, UserPhoto,
};
use crate::services::geo_search::RadiusQuery;

/// Read/write operations on place aggregates
/// DOCUMENTATION: Reads return `Ok(None)` or an empty vec for absence and
/// reserve errors for real failures. Every read merges like counts with a
/// soft-failure policy.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    /// Short name used in logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Persist newly discovered places and return the aggregates for every
    /// input external id, including ones that were already stored
    async fn save_batch(&self, places: Vec<ProviderPlaceData>) -> Result<Vec<Place>, PlacesError>;

    /// Add detail rows that are not stored yet
    async fn save_detail(&self, external_id: &str, detail: PlaceDetail) -> Result<(), PlacesError>;

    /// Add resolved URLs for photo references the place already owns
    async fn save_photos(
        &self,
        external_id: &str,
        photos: Vec<ResolvedPhotoData>,
    ) -> Result<(), PlacesError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Place>, PlacesError> {
        let mut places = self
            .find_by_external_ids(&[external_id.to_string()])
            .await?;
        Ok(places.pop())
    }

    /// Results follow input order, absent ids are skipped
    async fn find_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<Place>, PlacesError>;

    async fn find_by_place_ids(&self, place_ids: &[Uuid]) -> Result<Vec<Place>, PlacesError>;

    /// Results ordered by ascending distance from the center
    async fn find_by_radius(&self, query: &RadiusQuery) -> Result<Vec<Place>, PlacesError>;

    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError>;

    /// Returns false when the user already liked the place
    async fn add_like(&self, place_id: Uuid, user_id: Uuid) -> Result<bool, PlacesError>;

    async fn add_user_photo(
        &self,
        place_id: Uuid,
        photo: NewUserPhoto,
    ) -> Result<UserPhoto, PlacesError>;

    async fn add_recommendation(
        &self,
        place_id: Uuid,
        recommendation: NewRecommendation,
    ) -> Result<Recommendation, PlacesError>;

    /// Remove a place and every row it owns; false when it did not exist
    async fn delete_place(&self, place_id: Uuid) -> Result<bool, PlacesError>;
}
