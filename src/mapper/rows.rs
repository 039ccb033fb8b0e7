// src/mapper/rows.rs
// DOCUMENTATION: Flat per-table row representations
// PURPOSE: One struct per table, shared by the SQL layer (FromRow), the
// document backend (as nested document parts) and the pure mappers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlaceRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Provider record; the PostGIS point is computed from lat/lon on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProviderPlaceRow {
    pub id: Uuid,
    pub place_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub price_level: Option<i32>,
    pub rating: Option<f32>,
    pub rating_count: Option<i32>,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CategoryTypeRow {
    pub id: Uuid,
    pub provider_place_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub type_name: String,
    pub order_num: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PhotoReferenceRow {
    pub id: Uuid,
    pub provider_place_id: Uuid,
    pub reference: String,
    pub width: i32,
    pub height: i32,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PhotoAttributionRow {
    pub id: Uuid,
    pub photo_reference_id: Uuid,
    pub html_attribution: String,
    /// Write order within the photo reference
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResolvedPhotoRow {
    pub id: Uuid,
    pub photo_reference_id: Uuid,
    pub width: i32,
    pub height: i32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub provider_place_id: Uuid,
    pub rating: i32,
    pub text: Option<String>,
    pub time: DateTime<Utc>,
    pub author_name: String,
    pub author_url: Option<String>,
    pub author_photo_url: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OpeningPeriodRow {
    pub id: Uuid,
    pub provider_place_id: Uuid,
    pub open_day: i16,
    pub close_day: i16,
    pub open_time: String,
    pub close_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserPhotoRow {
    pub id: Uuid,
    pub place_id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RecommendationRow {
    pub id: Uuid,
    pub place_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Rows owned (directly or through photo references) by provider places
/// DOCUMENTATION: Listed in insert dependency order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildRows {
    pub category_types: Vec<CategoryTypeRow>,
    pub photo_references: Vec<PhotoReferenceRow>,
    pub photo_attributions: Vec<PhotoAttributionRow>,
    pub resolved_photos: Vec<ResolvedPhotoRow>,
    pub reviews: Vec<ReviewRow>,
    pub opening_periods: Vec<OpeningPeriodRow>,
}

impl ChildRows {
    pub fn extend(&mut self, other: ChildRows) {
        self.category_types.extend(other.category_types);
        self.photo_references.extend(other.photo_references);
        self.photo_attributions.extend(other.photo_attributions);
        self.resolved_photos.extend(other.resolved_photos);
        self.reviews.extend(other.reviews);
        self.opening_periods.extend(other.opening_periods);
    }

    /// Total number of rows across every child table
    pub fn len(&self) -> usize {
        self.category_types.len()
            + self.photo_references.len()
            + self.photo_attributions.len()
            + self.resolved_photos.len()
            + self.reviews.len()
            + self.opening_periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only rows belonging to the given provider places
    pub fn retain_providers(&mut self, provider_ids: &HashSet<Uuid>) {
        self.category_types
            .retain(|r| provider_ids.contains(&r.provider_place_id));
        self.photo_references
            .retain(|r| provider_ids.contains(&r.provider_place_id));
        self.reviews
            .retain(|r| provider_ids.contains(&r.provider_place_id));
        self.opening_periods
            .retain(|r| provider_ids.contains(&r.provider_place_id));

        let reference_ids: HashSet<Uuid> = self.photo_references.iter().map(|r| r.id).collect();
        self.photo_attributions
            .retain(|r| reference_ids.contains(&r.photo_reference_id));
        self.resolved_photos
            .retain(|r| reference_ids.contains(&r.photo_reference_id));
    }
}

/// Flat representation of any number of place aggregates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceRowSet {
    pub places: Vec<PlaceRow>,
    pub provider_places: Vec<ProviderPlaceRow>,
    pub children: ChildRows,
    pub user_photos: Vec<UserPhotoRow>,
    pub recommendations: Vec<RecommendationRow>,
}

impl PlaceRowSet {
    pub fn extend(&mut self, other: PlaceRowSet) {
        self.places.extend(other.places);
        self.provider_places.extend(other.provider_places);
        self.children.extend(other.children);
        self.user_photos.extend(other.user_photos);
        self.recommendations.extend(other.recommendations);
    }

    /// Drop every place whose provider external id is not in `external_ids`
    /// DOCUMENTATION: Used when a concurrent writer won the insert race for
    /// some ids; their rows must not be written by this transaction
    pub fn retain_external_ids(&mut self, external_ids: &HashSet<String>) {
        self.provider_places
            .retain(|p| external_ids.contains(&p.external_id));

        let place_ids: HashSet<Uuid> = self.provider_places.iter().map(|p| p.place_id).collect();
        let provider_ids: HashSet<Uuid> = self.provider_places.iter().map(|p| p.id).collect();

        self.places.retain(|p| place_ids.contains(&p.id));
        self.user_photos.retain(|p| place_ids.contains(&p.place_id));
        self.recommendations
            .retain(|r| place_ids.contains(&r.place_id));
        self.children.retain_providers(&provider_ids);
    }

    /// Split joined query rows into per-table rows
    /// DOCUMENTATION: A category-filtered join yields one row per matching
    /// category; repeated provider places are collapsed to their first row
    pub fn from_joined(rows: Vec<JoinedPlaceRow>) -> Self {
        let mut set = PlaceRowSet::default();
        let mut seen = HashSet::new();

        for row in rows {
            if !seen.insert(row.id) {
                continue;
            }

            set.places.push(PlaceRow {
                id: row.place_id,
                name: row.place_name,
                created_at: row.place_created_at,
            });
            set.provider_places.push(ProviderPlaceRow {
                id: row.id,
                place_id: row.place_id,
                external_id: row.external_id,
                name: row.name,
                lat: row.lat,
                lon: row.lon,
                price_level: row.price_level,
                rating: row.rating,
                rating_count: row.rating_count,
                formatted_address: row.formatted_address,
            });
            set.children.extend(ChildRows {
                category_types: row.category_types.0,
                photo_references: row.photo_references.0,
                photo_attributions: row.photo_attributions.0,
                resolved_photos: row.resolved_photos.0,
                reviews: row.reviews.0,
                opening_periods: row.opening_periods.0,
            });
        }

        set
    }
}

/// One row of the hydration query
/// DOCUMENTATION: Provider place columns plus every child relation
/// aggregated into a JSON array column. User photos and recommendations
/// are loaded by separate queries.
#[derive(Debug, FromRow)]
pub struct JoinedPlaceRow {
    pub place_id: Uuid,
    pub place_name: String,
    pub place_created_at: DateTime<Utc>,
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub price_level: Option<i32>,
    pub rating: Option<f32>,
    pub rating_count: Option<i32>,
    pub formatted_address: Option<String>,
    pub category_types: Json<Vec<CategoryTypeRow>>,
    pub photo_references: Json<Vec<PhotoReferenceRow>>,
    pub photo_attributions: Json<Vec<PhotoAttributionRow>>,
    pub resolved_photos: Json<Vec<ResolvedPhotoRow>>,
    pub reviews: Json<Vec<ReviewRow>>,
    pub opening_periods: Json<Vec<OpeningPeriodRow>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(external_id: &str) -> (PlaceRow, ProviderPlaceRow) {
        let place = PlaceRow {
            id: Uuid::new_v4(),
            name: external_id.to_string(),
            created_at: Utc::now(),
        };
        let provider = ProviderPlaceRow {
            id: Uuid::new_v4(),
            place_id: place.id,
            external_id: external_id.to_string(),
            name: external_id.to_string(),
            lat: 41.65,
            lon: -0.88,
            price_level: None,
            rating: None,
            rating_count: None,
            formatted_address: None,
        };
        (place, provider)
    }

    #[test]
    fn test_retain_external_ids_drops_children_of_lost_places() {
        let (place_a, provider_a) = provider("a");
        let (place_b, provider_b) = provider("b");
        let reference_b = PhotoReferenceRow {
            id: Uuid::new_v4(),
            provider_place_id: provider_b.id,
            reference: "ref-b".to_string(),
            width: 100,
            height: 100,
            position: 0,
        };

        let mut set = PlaceRowSet {
            places: vec![place_a.clone(), place_b],
            provider_places: vec![provider_a.clone(), provider_b.clone()],
            children: ChildRows {
                category_types: vec![CategoryTypeRow {
                    id: Uuid::new_v4(),
                    provider_place_id: provider_a.id,
                    type_name: "bar".to_string(),
                    order_num: 0,
                }],
                photo_attributions: vec![PhotoAttributionRow {
                    id: Uuid::new_v4(),
                    photo_reference_id: reference_b.id,
                    html_attribution: "by b".to_string(),
                    position: 0,
                }],
                photo_references: vec![reference_b],
                ..ChildRows::default()
            },
            ..PlaceRowSet::default()
        };

        let keep: HashSet<String> = ["a".to_string()].into_iter().collect();
        set.retain_external_ids(&keep);

        assert_eq!(set.places, vec![place_a]);
        assert_eq!(set.provider_places, vec![provider_a]);
        assert_eq!(set.children.category_types.len(), 1);
        assert!(set.children.photo_references.is_empty());
        assert!(set.children.photo_attributions.is_empty());
    }

    #[test]
    fn test_from_joined_collapses_category_join_rows() {
        let (place, provider) = provider("ChIJ-join");
        let category = |type_name: &str, order_num: i32| CategoryTypeRow {
            id: Uuid::new_v4(),
            provider_place_id: provider.id,
            type_name: type_name.to_string(),
            order_num,
        };
        let joined = || JoinedPlaceRow {
            place_id: place.id,
            place_name: place.name.clone(),
            place_created_at: place.created_at,
            id: provider.id,
            external_id: provider.external_id.clone(),
            name: provider.name.clone(),
            lat: provider.lat,
            lon: provider.lon,
            price_level: None,
            rating: None,
            rating_count: None,
            formatted_address: None,
            category_types: Json(vec![category("bar", 0), category("cafe", 1)]),
            photo_references: Json(vec![]),
            photo_attributions: Json(vec![]),
            resolved_photos: Json(vec![]),
            reviews: Json(vec![]),
            opening_periods: Json(vec![]),
        };

        // one row per matching category ("bar" and "cafe")
        let set = PlaceRowSet::from_joined(vec![joined(), joined()]);

        assert_eq!(set.places, vec![place]);
        assert_eq!(set.provider_places, vec![provider]);
        assert_eq!(set.children.category_types.len(), 2);
    }

    #[test]
    fn test_child_rows_len() {
        let mut rows = ChildRows::default();
        assert!(rows.is_empty());
        rows.category_types.push(CategoryTypeRow {
            id: Uuid::new_v4(),
            provider_place_id: Uuid::new_v4(),
            type_name: "cafe".to_string(),
            order_num: 0,
        });
        assert_eq!(rows.len(), 1);
    }
}
