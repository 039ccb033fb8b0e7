// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for the place store and its transport

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Application-specific error types
/// DOCUMENTATION: Reads never use NotFound for absence (they return None),
/// writes that target a missing provider place do.
#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("Place not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Unauthorized access")]
    Unauthorized,
}

impl PlacesError {
    /// Wrap a sqlx error with the operation that produced it
    /// DOCUMENTATION: Used as `.map_err(PlacesError::database("save_batch: insert places"))`
    pub fn database(context: &'static str) -> impl Fn(sqlx::Error) -> PlacesError {
        move |e| {
            log::error!("{} failed: {}", context, e);
            PlacesError::DatabaseError(format!("{}: {}", context, e))
        }
    }

    fn code(&self) -> &'static str {
        match self {
            PlacesError::NotFound(_) => "NOT_FOUND",
            PlacesError::ValidationError(_) => "VALIDATION_ERROR",
            PlacesError::DatabaseError(_) => "DATABASE_ERROR",
            PlacesError::Timeout(_) => "TIMEOUT",
            PlacesError::Unauthorized => "UNAUTHORIZED",
        }
    }
}

/// Convert PlacesError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for PlacesError {
    fn error_response(&self) -> HttpResponse {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PlacesError::NotFound(_) => StatusCode::NOT_FOUND,
            PlacesError::ValidationError(_) => StatusCode::BAD_REQUEST,
            PlacesError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PlacesError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PlacesError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}
