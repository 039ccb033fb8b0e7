// src/handlers/admin.rs
// DOCUMENTATION: Admin handlers for destructive operations
// PURPOSE: Token-protected place removal

use crate::config::Config;
use crate::errors::PlacesError;
use crate::services::PlaceService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

/// DELETE /admin/places/{place_id}
/// Remove a place with its provider record and every attachment
///
/// DOCUMENTATION: Requires admin authentication via X-Admin-Token header
pub async fn delete_place(
    service: web::Data<PlaceService>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, PlacesError> {
    verify_admin_token(&req, &config)?;

    let place_id = path.into_inner();
    log::info!("Admin delete requested for place {}", place_id);

    if !service.delete_place(place_id).await? {
        return Err(PlacesError::NotFound(place_id.to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Helper function to verify admin authentication
/// DOCUMENTATION: Checks X-Admin-Token header against configured admin token
fn verify_admin_token(req: &HttpRequest, config: &Config) -> Result<(), PlacesError> {
    let token = req
        .headers()
        .get("X-Admin-Token")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            log::warn!("Admin request without token");
            PlacesError::Unauthorized
        })?;

    if token != config.admin_token {
        log::warn!("Admin request with invalid token");
        return Err(PlacesError::Unauthorized);
    }

    Ok(())
}

/// Configuration for admin routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/admin").route("/places/{place_id}", web::delete().to(delete_place)));
}
