// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod geo_search;
pub mod pipeline;
pub mod place_service;

pub use geo_search::*;
pub use pipeline::*;
pub use place_service::*;
