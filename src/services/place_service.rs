// src/services/place_service.rs
// DOCUMENTATION: Request-scoped façade over the place store
// PURPOSE: Intermediary between handlers/binaries and the store; applies the
// per-call deadline and converts provider payloads

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::PlaceStore;
use crate::errors::PlacesError;
use crate::mapper::GooglePlace;
use crate::models::{
    NewRecommendation, NewUserPhoto, Place, PlaceDetail, ProviderPlaceData, Recommendation,
    ResolvedPhotoData, UserPhoto,
};
use crate::services::geo_search::RadiusQuery;

#[derive(Clone)]
pub struct PlaceService {
    store: Arc<dyn PlaceStore>,
    deadline: Duration,
}

impl PlaceService {
    pub fn new(store: Arc<dyn PlaceStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Run a store operation under the per-call deadline
    /// DOCUMENTATION: The operation future is dropped on expiry, which
    /// cancels the query and rolls back an open transaction
    async fn within<T, F>(&self, operation: &'static str, fut: F) -> Result<T, PlacesError>
    where
        F: Future<Output = Result<T, PlacesError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("{} exceeded deadline of {:?}", operation, self.deadline);
                Err(PlacesError::Timeout(format!(
                    "{} exceeded {}ms",
                    operation,
                    self.deadline.as_millis()
                )))
            }
        }
    }

    /// Store newly discovered places
    pub async fn save_batch(
        &self,
        places: Vec<ProviderPlaceData>,
    ) -> Result<Vec<Place>, PlacesError> {
        self.within("save_batch", self.store.save_batch(places)).await
    }

    /// Store raw Google Places results (search or details payloads)
    pub async fn import_google_places(
        &self,
        results: Vec<GooglePlace>,
    ) -> Result<Vec<Place>, PlacesError> {
        let places: Vec<ProviderPlaceData> =
            results.iter().map(GooglePlace::to_provider_data).collect();
        log::info!("Importing {} Google Places results", places.len());

        self.save_batch(places).await
    }

    pub async fn save_detail(
        &self,
        external_id: &str,
        detail: PlaceDetail,
    ) -> Result<(), PlacesError> {
        self.within("save_detail", self.store.save_detail(external_id, detail))
            .await
    }

    /// Store the detail part of a Google Place Details payload
    pub async fn save_google_detail(
        &self,
        external_id: &str,
        details: &GooglePlace,
    ) -> Result<(), PlacesError> {
        self.save_detail(external_id, details.to_detail()).await
    }

    pub async fn save_photos(
        &self,
        external_id: &str,
        photos: Vec<ResolvedPhotoData>,
    ) -> Result<(), PlacesError> {
        self.within("save_photos", self.store.save_photos(external_id, photos))
            .await
    }

    /// Place by external id, `None` when it is not stored
    pub async fn find_place(&self, external_id: &str) -> Result<Option<Place>, PlacesError> {
        self.within(
            "find_by_external_id",
            self.store.find_by_external_id(external_id),
        )
        .await
    }

    /// Place by external id for callers that treat absence as an error
    pub async fn get_place(&self, external_id: &str) -> Result<Place, PlacesError> {
        self.find_place(external_id)
            .await?
            .ok_or_else(|| PlacesError::NotFound(external_id.to_string()))
    }

    pub async fn find_places(&self, external_ids: &[String]) -> Result<Vec<Place>, PlacesError> {
        self.within(
            "find_by_external_ids",
            self.store.find_by_external_ids(external_ids),
        )
        .await
    }

    pub async fn find_by_place_ids(&self, place_ids: &[Uuid]) -> Result<Vec<Place>, PlacesError> {
        self.within("find_by_place_ids", self.store.find_by_place_ids(place_ids))
            .await
    }

    /// Places within the radius, closest first
    pub async fn nearby(&self, query: &RadiusQuery) -> Result<Vec<Place>, PlacesError> {
        self.within("find_by_radius", self.store.find_by_radius(query))
            .await
    }

    pub async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError> {
        self.within("count_likes", self.store.count_likes(place_ids))
            .await
    }

    pub async fn like_place(&self, place_id: Uuid, user_id: Uuid) -> Result<bool, PlacesError> {
        self.within("add_like", self.store.add_like(place_id, user_id))
            .await
    }

    pub async fn add_user_photo(
        &self,
        place_id: Uuid,
        photo: NewUserPhoto,
    ) -> Result<UserPhoto, PlacesError> {
        self.within("add_user_photo", self.store.add_user_photo(place_id, photo))
            .await
    }

    pub async fn add_recommendation(
        &self,
        place_id: Uuid,
        recommendation: NewRecommendation,
    ) -> Result<Recommendation, PlacesError> {
        self.within(
            "add_recommendation",
            self.store.add_recommendation(place_id, recommendation),
        )
        .await
    }

    pub async fn delete_place(&self, place_id: Uuid) -> Result<bool, PlacesError> {
        self.within("delete_place", self.store.delete_place(place_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DocumentPlaceStore;
    use tokio_test::assert_ok;

    fn service() -> PlaceService {
        PlaceService::new(
            Arc::new(DocumentPlaceStore::default()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout() {
        let service = PlaceService::new(
            Arc::new(DocumentPlaceStore::default()),
            Duration::from_millis(20),
        );

        let result: Result<(), PlacesError> = service
            .within("slow_operation", async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PlacesError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_get_place_missing_is_not_found() {
        let service = service();

        assert!(assert_ok!(service.find_place("ChIJ-unknown").await).is_none());
        assert!(matches!(
            service.get_place("ChIJ-unknown").await,
            Err(PlacesError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_import_google_places() {
        let service = service();
        let results: Vec<GooglePlace> = serde_json::from_str(
            r#"[
                {
                    "place_id": "ChIJ-central",
                    "name": "Mercado Central",
                    "types": ["food", "point_of_interest"],
                    "geometry": { "location": { "lat": 41.6555, "lng": -0.8802 } },
                    "vicinity": "Av. de César Augusto",
                    "photos": [{ "photo_reference": "ref-mc", "width": 1200, "height": 800 }]
                }
            ]"#,
        )
        .unwrap();

        let saved = assert_ok!(service.import_google_places(results).await);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].external_id(), Some("ChIJ-central"));

        let place = assert_ok!(service.get_place("ChIJ-central").await);
        assert_eq!(place.provider.unwrap().photos[0].reference, "ref-mc");
    }
}
