// src/models/provider.rs
// DOCUMENTATION: Write-side data transfer objects
// PURPOSE: Provider place data as it arrives from search/detail fetches,
// plus inputs for resolved photos and platform-native attachments

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{GeoPoint, OpeningPeriod, PhotoUrl, Review};

/// Provider place as discovered by a search, optionally with its detail
/// DOCUMENTATION: Input to SaveBatch. `photos` holds the coarse search photos;
/// `detail.photos` holds the full photo set. Both are merged on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_finite_rating"))]
pub struct ProviderPlaceData {
    /// Natural key from the provider
    #[validate(length(min = 1, max = 255))]
    pub external_id: String,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate]
    pub location: GeoPoint,

    #[serde(default)]
    #[validate(range(min = 0, max = 4))]
    pub price_level: Option<i32>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f32>,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub rating_count: Option<i32>,

    #[serde(default)]
    pub formatted_address: Option<String>,

    /// Category types in provider order
    #[serde(default)]
    pub types: Vec<String>,

    /// Photos from the search result
    #[serde(default)]
    #[validate]
    pub photos: Vec<PhotoData>,

    /// Detail fetch, when already available at discovery time
    #[serde(default)]
    #[validate]
    pub detail: Option<PlaceDetail>,
}

fn validate_finite_rating(data: &ProviderPlaceData) -> Result<(), ValidationError> {
    match data.rating {
        Some(rating) if !rating.is_finite() => Err(ValidationError::new("finite_rating")),
        _ => Ok(()),
    }
}

/// Richer provider data fetched after discovery
/// DOCUMENTATION: Input to SaveDetail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PlaceDetail {
    #[serde(default)]
    #[validate]
    pub photos: Vec<PhotoData>,

    #[serde(default)]
    #[validate]
    pub reviews: Vec<Review>,

    #[serde(default)]
    #[validate]
    pub opening_periods: Vec<OpeningPeriod>,
}

/// Provider photo handle with declared size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PhotoData {
    #[validate(length(min = 1))]
    pub reference: String,

    #[validate(range(min = 0))]
    pub width: i32,

    #[validate(range(min = 0))]
    pub height: i32,

    #[serde(default)]
    pub html_attributions: Vec<String>,

    /// URLs already resolved for this reference
    #[serde(default)]
    #[validate]
    pub resolved: Vec<PhotoUrl>,
}

/// Resolved URL for an existing photo reference
/// DOCUMENTATION: Input to SavePhotos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ResolvedPhotoData {
    #[validate(length(min = 1))]
    pub reference: String,

    #[validate(length(min = 1))]
    pub url: String,

    #[validate(range(min = 0))]
    pub width: i32,

    #[validate(range(min = 0))]
    pub height: i32,
}

/// Request to attach a user photo to a place
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUserPhoto {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
}

/// Request to attach a recommendation to a place
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewRecommendation {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
}
