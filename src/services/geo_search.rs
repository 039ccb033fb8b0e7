// src/services/geo_search.rs
// DOCUMENTATION: Geospatial helpers for radius search
// PURPOSE: Great-circle distance plus bounding rectangle prefilter, shared
// by both store backends

use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::PlacesError;
use crate::models::GeoPoint;

/// Mean Earth radius in meters (IUGG)
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Slack added to every side of the bounding rectangle, in degrees (~1 cm)
const MBR_MARGIN_DEGREES: f64 = 1e-7;

/// Great-circle distance in meters between two coordinates
/// Uses Haversine formula
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Radius search parameters
/// DOCUMENTATION: An empty category list means no category filter;
/// otherwise a place matches when it has any of the listed categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusQuery {
    pub center: GeoPoint,
    pub radius_meters: f64,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl RadiusQuery {
    pub fn new(center: GeoPoint, radius_meters: f64, categories: Vec<String>) -> Self {
        Self {
            center,
            radius_meters,
            categories,
        }
    }

    pub fn validate(&self) -> Result<(), PlacesError> {
        self.center
            .validate()
            .map_err(|e| PlacesError::ValidationError(format!("invalid center: {}", e)))?;

        if !self.center.lat.is_finite() || !self.center.lon.is_finite() {
            return Err(PlacesError::ValidationError(
                "center coordinates must be finite".to_string(),
            ));
        }

        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(PlacesError::ValidationError(format!(
                "radius must be a positive finite number of meters, got {}",
                self.radius_meters
            )));
        }

        Ok(())
    }

    /// Axis-aligned rectangle enclosing the search circle (x = lon, y = lat)
    /// DOCUMENTATION: Spans every longitude when the circle reaches a pole or
    /// crosses the antimeridian
    pub fn bounding_rect(&self) -> Rect<f64> {
        let angular = self.radius_meters / EARTH_RADIUS_METERS;
        let d_lat = angular.to_degrees() + MBR_MARGIN_DEGREES;

        let min_lat = self.center.lat - d_lat;
        let max_lat = self.center.lat + d_lat;

        let full_lon = || (-180.0, 180.0);

        let (min_lon, max_lon) = if min_lat <= -90.0 || max_lat >= 90.0 {
            full_lon()
        } else {
            let ratio = angular.sin() / self.center.lat.to_radians().cos();
            if ratio >= 1.0 {
                full_lon()
            } else {
                let d_lon = ratio.asin().to_degrees() + MBR_MARGIN_DEGREES;
                let (min_lon, max_lon) = (self.center.lon - d_lon, self.center.lon + d_lon);
                if min_lon < -180.0 || max_lon > 180.0 {
                    full_lon()
                } else {
                    (min_lon, max_lon)
                }
            }
        };

        Rect::new(
            coord! { x: min_lon, y: min_lat.max(-90.0) },
            coord! { x: max_lon, y: max_lat.min(90.0) },
        )
    }

    pub fn distance_to(&self, point: &GeoPoint) -> f64 {
        haversine_distance(&self.center, point)
    }

    /// Two-phase check: bounding rectangle first, exact distance second
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let rect = self.bounding_rect();
        let in_rect = point.lon >= rect.min().x
            && point.lon <= rect.max().x
            && point.lat >= rect.min().y
            && point.lat <= rect.max().y;

        in_rect && self.distance_to(point) <= self.radius_meters
    }

    pub fn matches_categories(&self, types: &[String]) -> bool {
        self.categories.is_empty() || types.iter().any(|t| self.categories.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_distance() {
        let p = GeoPoint::new(41.65, -0.88);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_real_distance() {
        let madrid = GeoPoint::new(40.4168, -3.7038);
        let barcelona = GeoPoint::new(41.3874, 2.1686);

        let d = haversine_distance(&madrid, &barcelona);
        assert!(d > 500_000.0 && d < 510_000.0, "got {}", d);
    }

    #[test]
    fn test_radius_boundary() {
        let query = RadiusQuery::new(GeoPoint::new(0.0, 0.0), 1000.0, vec![]);
        let lat_at = |meters: f64| (meters / EARTH_RADIUS_METERS).to_degrees();

        assert!(query.contains(&GeoPoint::new(lat_at(999.0), 0.0)));
        assert!(!query.contains(&GeoPoint::new(lat_at(1001.0), 0.0)));
        assert!(query.contains(&GeoPoint::new(0.0, -lat_at(999.0))));
        assert!(!query.contains(&GeoPoint::new(0.0, -lat_at(1001.0))));
    }

    #[test]
    fn test_bounding_rect_near_pole_spans_all_longitudes() {
        let query = RadiusQuery::new(GeoPoint::new(89.99, 10.0), 5000.0, vec![]);
        let rect = query.bounding_rect();

        assert_eq!(rect.min().x, -180.0);
        assert_eq!(rect.max().x, 180.0);
        assert_eq!(rect.max().y, 90.0);
        assert!(query.contains(&GeoPoint::new(89.995, -170.0)));
    }

    #[test]
    fn test_bounding_rect_across_antimeridian() {
        let query = RadiusQuery::new(GeoPoint::new(0.0, 179.99), 5000.0, vec![]);
        let rect = query.bounding_rect();

        assert_eq!(rect.min().x, -180.0);
        assert!(query.contains(&GeoPoint::new(0.0, -179.99)));
    }

    #[test]
    fn test_validate() {
        let center = GeoPoint::new(41.65, -0.88);
        assert!(RadiusQuery::new(center, 500.0, vec![]).validate().is_ok());
        assert!(RadiusQuery::new(center, 0.0, vec![]).validate().is_err());
        assert!(RadiusQuery::new(center, f64::NAN, vec![]).validate().is_err());
        assert!(RadiusQuery::new(GeoPoint::new(91.0, 0.0), 500.0, vec![])
            .validate()
            .is_err());
    }

    #[test]
    fn test_matches_categories() {
        let types = vec!["bar".to_string(), "restaurant".to_string()];
        let center = GeoPoint::new(0.0, 0.0);

        assert!(RadiusQuery::new(center, 1.0, vec![]).matches_categories(&types));
        assert!(RadiusQuery::new(center, 1.0, vec!["cafe".to_string(), "bar".to_string()])
            .matches_categories(&types));
        assert!(!RadiusQuery::new(center, 1.0, vec!["museum".to_string()])
            .matches_categories(&types));
    }
}
