// src/handlers/places.rs
// DOCUMENTATION: HTTP handlers for place operations
// PURPOSE: Parse requests, call the place service, return responses

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::PlacesError;
use crate::mapper::GooglePlace;
use crate::models::{
    GeoPoint, NewRecommendation, NewUserPhoto, PlaceDetail, ProviderPlaceData, ResolvedPhotoData,
};
use crate::services::{PlaceService, RadiusQuery};

/// Query string for GET /places/nearby
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    /// Comma-separated category filter (any of)
    pub category: Option<String>,
}

impl NearbyQuery {
    fn to_radius_query(&self) -> RadiusQuery {
        let categories = self
            .category
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        RadiusQuery::new(GeoPoint::new(self.lat, self.lon), self.radius_m, categories)
    }
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub user_id: Uuid,
}

/// POST /places/batch
/// Store newly discovered places, returns every aggregate of the batch
pub async fn save_batch(
    service: web::Data<PlaceService>,
    body: web::Json<Vec<ProviderPlaceData>>,
) -> Result<impl Responder, PlacesError> {
    let places = service.save_batch(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(places))
}

/// POST /places/google
/// Store raw Google Places results
pub async fn import_google(
    service: web::Data<PlaceService>,
    body: web::Json<Vec<GooglePlace>>,
) -> Result<impl Responder, PlacesError> {
    let places = service.import_google_places(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(places))
}

/// GET /places/nearby?lat=..&lon=..&radius_m=..&category=bar,cafe
pub async fn nearby(
    service: web::Data<PlaceService>,
    query: web::Query<NearbyQuery>,
) -> Result<impl Responder, PlacesError> {
    let places = service.nearby(&query.to_radius_query()).await?;
    Ok(HttpResponse::Ok().json(places))
}

/// GET /places/{external_id}
pub async fn get_place(
    service: web::Data<PlaceService>,
    path: web::Path<String>,
) -> Result<impl Responder, PlacesError> {
    let place = service.get_place(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(place))
}

/// PUT /places/{external_id}/detail
pub async fn save_detail(
    service: web::Data<PlaceService>,
    path: web::Path<String>,
    body: web::Json<PlaceDetail>,
) -> Result<impl Responder, PlacesError> {
    service
        .save_detail(&path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /places/{external_id}/google-detail
/// Store the detail part of a raw Google Place Details result
pub async fn save_google_detail(
    service: web::Data<PlaceService>,
    path: web::Path<String>,
    body: web::Json<GooglePlace>,
) -> Result<impl Responder, PlacesError> {
    service
        .save_google_detail(&path.into_inner(), &body)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /places/{external_id}/photos
pub async fn save_photos(
    service: web::Data<PlaceService>,
    path: web::Path<String>,
    body: web::Json<Vec<ResolvedPhotoData>>,
) -> Result<impl Responder, PlacesError> {
    service
        .save_photos(&path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /places/{place_id}/likes
/// 201 for a new like, 200 when the user already liked the place
pub async fn like_place(
    service: web::Data<PlaceService>,
    path: web::Path<Uuid>,
    body: web::Json<LikeRequest>,
) -> Result<impl Responder, PlacesError> {
    let created = service.like_place(path.into_inner(), body.user_id).await?;

    if created {
        Ok(HttpResponse::Created().finish())
    } else {
        Ok(HttpResponse::Ok().finish())
    }
}

/// POST /places/{place_id}/user-photos
pub async fn add_user_photo(
    service: web::Data<PlaceService>,
    path: web::Path<Uuid>,
    body: web::Json<NewUserPhoto>,
) -> Result<impl Responder, PlacesError> {
    let photo = service
        .add_user_photo(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(photo))
}

/// POST /places/{place_id}/recommendations
pub async fn add_recommendation(
    service: web::Data<PlaceService>,
    path: web::Path<Uuid>,
    body: web::Json<NewRecommendation>,
) -> Result<impl Responder, PlacesError> {
    let recommendation = service
        .add_recommendation(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(recommendation))
}

/// Configuration for place routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/places")
            .route("/batch", web::post().to(save_batch))
            .route("/google", web::post().to(import_google))
            .route("/nearby", web::get().to(nearby))
            .route("/{external_id}", web::get().to(get_place))
            .route("/{external_id}/detail", web::put().to(save_detail))
            .route("/{external_id}/google-detail", web::put().to(save_google_detail))
            .route("/{external_id}/photos", web::put().to(save_photos))
            .route("/{place_id}/likes", web::post().to(like_place))
            .route("/{place_id}/user-photos", web::post().to(add_user_photo))
            .route("/{place_id}/recommendations", web::post().to(add_recommendation)),
    );
}
