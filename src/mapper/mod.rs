// src/mapper/mod.rs
// DOCUMENTATION: Mapper module organization
// PURPOSE: Pure conversions between aggregates, rows and provider payloads

pub mod flatten;
pub mod google;
pub mod hydrate;
pub mod rows;

pub use flatten::*;
pub use google::*;
pub use hydrate::hydrate;
pub use rows::*;
