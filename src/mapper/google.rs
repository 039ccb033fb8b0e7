// src/mapper/google.rs
// DOCUMENTATION: Google Places wire format and factory
// PURPOSE: Deserialize Nearby Search / Place Details payloads and convert
// them into provider place data for the writer

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{GeoPoint, OpeningPeriod, PhotoData, PlaceDetail, ProviderPlaceData, Review};

/// Individual place from Google Places API
/// DOCUMENTATION: Search results carry the coarse fields and a few photos;
/// Place Details adds reviews, opening periods and the full photo list
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GooglePlace {
    /// Google's unique place identifier
    pub place_id: String,
    pub name: String,
    /// Place types array (e.g., ["restaurant", "food", "point_of_interest"])
    #[serde(default)]
    pub types: Vec<String>,
    pub geometry: GoogleGeometry,
    /// Formatted address (detailed, from Place Details)
    pub formatted_address: Option<String>,
    /// Vicinity (short address, from Nearby Search)
    pub vicinity: Option<String>,
    pub rating: Option<f32>,
    pub user_ratings_total: Option<i32>,
    /// Price level (0-4: free to very expensive)
    pub price_level: Option<i32>,
    pub opening_hours: Option<GoogleOpeningHours>,
    pub reviews: Option<Vec<GoogleReview>>,
    pub photos: Option<Vec<GooglePhoto>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleGeometry {
    pub location: GoogleLocation,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleLocation {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleOpeningHours {
    pub open_now: Option<bool>,
    pub periods: Option<Vec<GoogleOpeningPeriod>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleOpeningPeriod {
    pub open: Option<GoogleOpeningTime>,
    pub close: Option<GoogleOpeningTime>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleOpeningTime {
    pub day: Option<i32>,
    pub time: Option<String>,
}

/// Review from Google Places
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleReview {
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub language: Option<String>,
    pub profile_photo_url: Option<String>,
    /// Rating (1-5)
    pub rating: Option<i32>,
    pub text: Option<String>,
    /// Time of review (Unix timestamp)
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GooglePhoto {
    /// Photo reference (used to fetch actual photo)
    pub photo_reference: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// HTML attributions (required by Google)
    pub html_attributions: Option<Vec<String>>,
}

impl GooglePhoto {
    fn to_photo_data(&self) -> PhotoData {
        PhotoData {
            reference: self.photo_reference.clone(),
            width: self.width.unwrap_or(0),
            height: self.height.unwrap_or(0),
            html_attributions: self.html_attributions.clone().unwrap_or_default(),
            resolved: Vec::new(),
        }
    }
}

impl GoogleReview {
    /// None when a required field is missing or out of range
    fn to_review(&self) -> Option<Review> {
        let review = Review {
            rating: self.rating?,
            text: self.text.clone().filter(|t| !t.is_empty()),
            time: Utc.timestamp_opt(self.time?, 0).single()?,
            author_name: self.author_name.clone()?,
            author_url: self.author_url.clone(),
            author_photo_url: self.profile_photo_url.clone(),
            language: self.language.clone(),
        };
        review.validate().ok().map(|_| review)
    }
}

impl GoogleOpeningPeriod {
    /// None for open-ended periods (e.g. always open) and malformed entries
    fn to_period(&self) -> Option<OpeningPeriod> {
        let open = self.open.as_ref()?;
        let close = self.close.as_ref()?;

        let period = OpeningPeriod {
            open_day: i16::try_from(open.day?).ok()?,
            open_time: open.time.clone()?,
            close_day: i16::try_from(close.day?).ok()?,
            close_time: close.time.clone()?,
        };
        period.validate().ok().map(|_| period)
    }
}

impl GooglePlace {
    /// Photos as listed in this payload
    pub fn to_photos(&self) -> Vec<PhotoData> {
        self.photos
            .iter()
            .flatten()
            .map(GooglePhoto::to_photo_data)
            .collect()
    }

    /// Detail data carried by this payload
    /// DOCUMENTATION: Reviews and periods missing required fields are dropped
    pub fn to_detail(&self) -> PlaceDetail {
        PlaceDetail {
            photos: self.to_photos(),
            reviews: self
                .reviews
                .iter()
                .flatten()
                .filter_map(GoogleReview::to_review)
                .collect(),
            opening_periods: self
                .opening_hours
                .iter()
                .filter_map(|hours| hours.periods.as_ref())
                .flatten()
                .filter_map(GoogleOpeningPeriod::to_period)
                .collect(),
        }
    }

    fn has_detail(&self) -> bool {
        self.reviews.is_some()
            || self
                .opening_hours
                .as_ref()
                .map_or(false, |hours| hours.periods.is_some())
    }

    /// Convert a single payload (search result or details) into provider data
    pub fn to_provider_data(&self) -> ProviderPlaceData {
        ProviderPlaceData {
            external_id: self.place_id.clone(),
            name: self.name.clone(),
            location: GeoPoint::new(self.geometry.location.lat, self.geometry.location.lng),
            price_level: self.price_level,
            rating: self.rating,
            rating_count: self.user_ratings_total,
            // Prefer formatted_address over vicinity (more detailed)
            formatted_address: self
                .formatted_address
                .clone()
                .or_else(|| self.vicinity.clone()),
            types: self.types.clone(),
            photos: self.to_photos(),
            detail: if self.has_detail() {
                Some(self.to_detail())
            } else {
                None
            },
        }
    }

    /// Combine a search result with its details fetch
    /// DOCUMENTATION: Search photos stay the primary list, the details
    /// payload supplies the detail part
    pub fn with_details(&self, details: &GooglePlace) -> ProviderPlaceData {
        let mut data = self.to_provider_data();
        if details.formatted_address.is_some() {
            data.formatted_address = details.formatted_address.clone();
        }
        data.detail = Some(details.to_detail());
        data
    }
}
