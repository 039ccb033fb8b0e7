// src/models/place.rs
// DOCUMENTATION: Core data structures for places
// PURPOSE: The nested place aggregate returned by every store backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Geographic coordinate in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_finite_point"))]
pub struct GeoPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<GeoPoint> for geo_types::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo_types::Point::new(p.lon, p.lat)
    }
}

impl From<geo_types::Point<f64>> for GeoPoint {
    fn from(p: geo_types::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}

/// Represents a complete place aggregate
/// DOCUMENTATION: Canonical place plus its provider record and attachments.
/// `like_count` is derived at read time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Unique identifier (UUID v4), generated on first discovery
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Number of likes (0 when the like count could not be computed)
    pub like_count: i64,

    /// When the place was first discovered
    pub created_at: DateTime<Utc>,

    /// External provider record (1:1)
    pub provider: Option<ProviderPlace>,

    /// Photos uploaded by platform users
    pub user_photos: Vec<UserPhoto>,

    /// Recommendations written by platform users
    pub recommendations: Vec<Recommendation>,
}

impl Place {
    /// External id of the provider record, if any
    pub fn external_id(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.external_id.as_str())
    }
}

/// Provider place record with its child relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPlace {
    pub id: Uuid,

    /// Natural key from the provider (Google place_id)
    pub external_id: String,

    pub name: String,

    pub location: GeoPoint,

    /// Price level (0-4: free to very expensive)
    pub price_level: Option<i32>,

    /// Rating (0-5)
    pub rating: Option<f32>,

    /// Number of ratings
    pub rating_count: Option<i32>,

    pub formatted_address: Option<String>,

    /// Category types in provider order
    pub types: Vec<String>,

    /// Photos in provider order
    pub photos: Vec<Photo>,

    /// Reviews ordered by time
    pub reviews: Vec<Review>,

    /// Opening periods ordered by open day and time
    pub opening_periods: Vec<OpeningPeriod>,
}

/// Provider photo reference with its resolved URLs
/// DOCUMENTATION: `small` is the resolved URL with the minimum width,
/// `large` the one with the maximum width (same entry when only one exists)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub reference: String,
    pub width: i32,
    pub height: i32,
    pub attributions: Vec<String>,
    pub small: Option<PhotoUrl>,
    pub large: Option<PhotoUrl>,
}

/// Concrete URL for a photo reference at a given size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PhotoUrl {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(range(min = 0))]
    pub width: i32,
    #[validate(range(min = 0))]
    pub height: i32,
}

/// Provider review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Review {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    pub text: Option<String>,
    pub time: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub author_name: String,
    pub author_url: Option<String>,
    pub author_photo_url: Option<String>,
    pub language: Option<String>,
}

/// Weekly opening period
/// DOCUMENTATION: Days are 0-6 (0 = Sunday), times are "HHMM"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct OpeningPeriod {
    #[validate(range(min = 0, max = 6))]
    pub open_day: i16,
    #[validate(custom = "validate_hhmm")]
    pub open_time: String,
    #[validate(range(min = 0, max = 6))]
    pub close_day: i16,
    #[validate(custom = "validate_hhmm")]
    pub close_time: String,
}

/// Photo uploaded by a platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPhoto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Recommendation written by a platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// `range` accepts NaN, so coordinates are also required to be finite
pub fn validate_finite_point(point: &GeoPoint) -> Result<(), ValidationError> {
    if point.lat.is_finite() && point.lon.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("finite_coordinates"))
    }
}

/// Time of day in provider format, e.g. "0930" or "2300"
pub fn validate_hhmm(value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == 4
        && value.chars().all(|c| c.is_ascii_digit())
        && value[..2].parse::<u32>().map(|h| h < 24).unwrap_or(false)
        && value[2..].parse::<u32>().map(|m| m < 60).unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("hhmm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hhmm() {
        assert!(validate_hhmm("0000").is_ok());
        assert!(validate_hhmm("2359").is_ok());
        assert!(validate_hhmm("2400").is_err());
        assert!(validate_hhmm("12:30").is_err());
        assert!(validate_hhmm("930").is_err());
    }

    #[test]
    fn test_opening_period_day_range() {
        let period = OpeningPeriod {
            open_day: 7,
            open_time: "0900".to_string(),
            close_day: 0,
            close_time: "1800".to_string(),
        };
        assert!(period.validate().is_err());
    }

    #[test]
    fn test_geo_point_rejects_nan() {
        assert!(GeoPoint::new(41.65, -0.88).validate().is_ok());
        assert!(GeoPoint::new(f64::NAN, -0.88).validate().is_err());
        assert!(GeoPoint::new(41.65, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_geo_point_conversion() {
        let point: geo_types::Point<f64> = GeoPoint::new(41.65, -0.88).into();
        assert_eq!(point.x(), -0.88);
        assert_eq!(GeoPoint::from(point), GeoPoint::new(41.65, -0.88));
    }
}
