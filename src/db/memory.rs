// src/db/memory.rs
// DOCUMENTATION: In-process document store
// PURPOSE: One document per place behind an async RwLock; satisfies the same
// PlaceStore contract as PostgreSQL and shares its mapping and dedup code

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use super::like_repository::{merge_like_counts, LikeCounter};
use super::store::PlaceStore;
use crate::errors::PlacesError;
use crate::mapper::{
    flatten_new_place, hydrate, merge_photo_sources, plan_child_rows, plan_resolved_photos,
    recommendation_row, user_photo_row, ChildRows, NewPlaceRows, PlaceRow, PlaceRowSet,
    ProviderPlaceRow, RecommendationRow, UserPhotoRow,
};
use crate::models::{
    GeoPoint, NewRecommendation, NewUserPhoto, Place, PlaceDetail, ProviderPlaceData,
    Recommendation, ResolvedPhotoData, UserPhoto,
};
use crate::services::geo_search::RadiusQuery;
use crate::services::pipeline::WritePipeline;

/// Everything stored for one place
#[derive(Debug, Clone)]
struct PlaceDocument {
    place: PlaceRow,
    provider: Option<ProviderPlaceRow>,
    children: ChildRows,
    user_photos: Vec<UserPhotoRow>,
    recommendations: Vec<RecommendationRow>,
}

impl From<NewPlaceRows> for PlaceDocument {
    fn from(rows: NewPlaceRows) -> Self {
        Self {
            place: rows.place,
            provider: Some(rows.provider),
            children: rows.children,
            user_photos: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

impl PlaceDocument {
    fn location(&self) -> Option<GeoPoint> {
        self.provider.as_ref().map(|p| GeoPoint::new(p.lat, p.lon))
    }

    fn types(&self) -> Vec<String> {
        self.children
            .category_types
            .iter()
            .map(|c| c.type_name.clone())
            .collect()
    }
}

fn to_row_set<'a>(documents: impl Iterator<Item = &'a PlaceDocument>) -> PlaceRowSet {
    let mut set = PlaceRowSet::default();
    for doc in documents {
        set.places.push(doc.place.clone());
        set.provider_places.extend(doc.provider.clone());
        set.children.extend(doc.children.clone());
        set.user_photos.extend(doc.user_photos.iter().cloned());
        set.recommendations
            .extend(doc.recommendations.iter().cloned());
    }
    set
}

#[derive(Default)]
struct Documents {
    places: HashMap<Uuid, PlaceDocument>,
    by_external_id: HashMap<String, Uuid>,
}

impl Documents {
    fn by_external_id_mut(&mut self, external_id: &str) -> Result<&mut PlaceDocument, PlacesError> {
        self.by_external_id
            .get(external_id)
            .and_then(|id| self.places.get_mut(id))
            .ok_or_else(|| PlacesError::NotFound(external_id.to_string()))
    }
}

/// Like events kept in memory
#[derive(Default)]
pub struct MemoryLikes {
    likes: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl MemoryLikes {
    pub async fn add(&self, place_id: Uuid, user_id: Uuid) -> bool {
        self.likes
            .write()
            .await
            .entry(place_id)
            .or_default()
            .insert(user_id)
    }

    pub async fn remove_place(&self, place_id: Uuid) {
        self.likes.write().await.remove(&place_id);
    }
}

#[async_trait]
impl LikeCounter for MemoryLikes {
    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError> {
        let likes = self.likes.read().await;
        Ok(place_ids
            .iter()
            .filter_map(|id| {
                likes
                    .get(id)
                    .filter(|users| !users.is_empty())
                    .map(|users| (*id, users.len() as i64))
            })
            .collect())
    }
}

/// Document-backed place store
pub struct DocumentPlaceStore {
    documents: RwLock<Documents>,
    pipeline: WritePipeline,
    likes: Arc<MemoryLikes>,
    like_counter: Arc<dyn LikeCounter>,
}

impl DocumentPlaceStore {
    pub fn new(pipeline: WritePipeline) -> Self {
        let likes = Arc::new(MemoryLikes::default());

        Self {
            documents: RwLock::new(Documents::default()),
            pipeline,
            like_counter: likes.clone(),
            likes,
        }
    }

    /// Replace the like counter used when merging counts into reads
    pub fn with_like_counter(mut self, counter: Arc<dyn LikeCounter>) -> Self {
        self.like_counter = counter;
        self
    }

    async fn finish(&self, set: PlaceRowSet) -> Vec<Place> {
        let mut places = hydrate(set);
        merge_like_counts(self.like_counter.as_ref(), &mut places).await;
        places
    }
}

impl Default for DocumentPlaceStore {
    fn default() -> Self {
        Self::new(WritePipeline::standard())
    }
}

#[async_trait]
impl PlaceStore for DocumentPlaceStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn save_batch(&self, places: Vec<ProviderPlaceData>) -> Result<Vec<Place>, PlacesError> {
        let places = self.pipeline.prepare_batch(places)?;
        let external_ids: Vec<String> = places.iter().map(|p| p.external_id.clone()).collect();

        {
            let mut docs = self.documents.write().await;
            let now = Utc::now();
            let mut stored = 0;

            for place in &places {
                if docs.by_external_id.contains_key(&place.external_id) {
                    continue;
                }
                let doc = PlaceDocument::from(flatten_new_place(place, now));
                docs.by_external_id
                    .insert(place.external_id.clone(), doc.place.id);
                docs.places.insert(doc.place.id, doc);
                stored += 1;
            }

            log::info!(
                "save_batch: stored {} new places, {} already present",
                stored,
                places.len() - stored
            );
        }

        self.find_by_external_ids(&external_ids).await
    }

    async fn save_detail(&self, external_id: &str, detail: PlaceDetail) -> Result<(), PlacesError> {
        let detail = self.pipeline.prepare_detail(detail)?;

        let mut docs = self.documents.write().await;
        let doc = docs.by_external_id_mut(external_id)?;
        let provider_place_id = doc
            .provider
            .as_ref()
            .map(|p| p.id)
            .ok_or_else(|| PlacesError::NotFound(external_id.to_string()))?;

        let photos = merge_photo_sources(&[], &detail.photos);
        let planned = plan_child_rows(
            provider_place_id,
            &doc.children,
            &photos,
            &detail.reviews,
            &detail.opening_periods,
        );

        log::info!("save_detail: {} new rows for {}", planned.len(), external_id);
        doc.children.extend(planned);

        Ok(())
    }

    async fn save_photos(
        &self,
        external_id: &str,
        photos: Vec<ResolvedPhotoData>,
    ) -> Result<(), PlacesError> {
        let photos = self.pipeline.prepare_photos(photos)?;

        let mut docs = self.documents.write().await;
        let doc = docs.by_external_id_mut(external_id)?;
        let planned = plan_resolved_photos(&doc.children, &photos)?;

        log::info!(
            "save_photos: {} new resolved photos for {}",
            planned.len(),
            external_id
        );
        doc.children.resolved_photos.extend(planned);

        Ok(())
    }

    async fn find_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<Place>, PlacesError> {
        let set = {
            let docs = self.documents.read().await;
            let mut seen = HashSet::new();
            to_row_set(
                external_ids
                    .iter()
                    .filter_map(|id| docs.by_external_id.get(id))
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| docs.places.get(id)),
            )
        };

        Ok(self.finish(set).await)
    }

    async fn find_by_place_ids(&self, place_ids: &[Uuid]) -> Result<Vec<Place>, PlacesError> {
        let set = {
            let docs = self.documents.read().await;
            let mut seen = HashSet::new();
            to_row_set(
                place_ids
                    .iter()
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| docs.places.get(id)),
            )
        };

        Ok(self.finish(set).await)
    }

    async fn find_by_radius(&self, query: &RadiusQuery) -> Result<Vec<Place>, PlacesError> {
        query.validate()?;

        let set = {
            let docs = self.documents.read().await;
            let mut matches: Vec<(f64, Uuid, &PlaceDocument)> = docs
                .places
                .values()
                .filter_map(|doc| {
                    let location = doc.location()?;
                    if !query.contains(&location) || !query.matches_categories(&doc.types()) {
                        return None;
                    }
                    let provider_id = doc.provider.as_ref()?.id;
                    Some((query.distance_to(&location), provider_id, doc))
                })
                .collect();

            matches.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            to_row_set(matches.into_iter().map(|(_, _, doc)| doc))
        };

        Ok(self.finish(set).await)
    }

    async fn count_likes(&self, place_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, PlacesError> {
        self.like_counter.count_likes(place_ids).await
    }

    async fn add_like(&self, place_id: Uuid, user_id: Uuid) -> Result<bool, PlacesError> {
        if !self.documents.read().await.places.contains_key(&place_id) {
            return Err(PlacesError::NotFound(place_id.to_string()));
        }
        Ok(self.likes.add(place_id, user_id).await)
    }

    async fn add_user_photo(
        &self,
        place_id: Uuid,
        photo: NewUserPhoto,
    ) -> Result<UserPhoto, PlacesError> {
        photo
            .validate()
            .map_err(|e| PlacesError::ValidationError(e.to_string()))?;

        let mut docs = self.documents.write().await;
        let doc = docs
            .places
            .get_mut(&place_id)
            .ok_or_else(|| PlacesError::NotFound(place_id.to_string()))?;

        let row = user_photo_row(place_id, &photo, Utc::now());
        doc.user_photos.push(row.clone());

        Ok(UserPhoto {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            created_at: row.created_at,
        })
    }

    async fn add_recommendation(
        &self,
        place_id: Uuid,
        recommendation: NewRecommendation,
    ) -> Result<Recommendation, PlacesError> {
        recommendation
            .validate()
            .map_err(|e| PlacesError::ValidationError(e.to_string()))?;

        let mut docs = self.documents.write().await;
        let doc = docs
            .places
            .get_mut(&place_id)
            .ok_or_else(|| PlacesError::NotFound(place_id.to_string()))?;

        let row = recommendation_row(place_id, &recommendation, Utc::now());
        doc.recommendations.push(row.clone());

        Ok(Recommendation {
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            created_at: row.created_at,
        })
    }

    async fn delete_place(&self, place_id: Uuid) -> Result<bool, PlacesError> {
        let removed = {
            let mut docs = self.documents.write().await;
            let removed = docs.places.remove(&place_id);
            if let Some(provider) = removed.as_ref().and_then(|d| d.provider.as_ref()) {
                docs.by_external_id.remove(&provider.external_id);
            }
            removed.is_some()
        };

        if removed {
            self.likes.remove_place(place_id).await;
            log::info!("delete_place: removed place {}", place_id);
        }

        Ok(removed)
    }
}
