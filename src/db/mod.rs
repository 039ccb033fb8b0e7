// src/db/mod.rs
// DOCUMENTATION: Database module organization
// PURPOSE: Re-export store contract and backends

pub mod like_repository;
pub mod memory;
pub mod photo_rewrite;
pub mod postgres;
pub mod reader;
pub mod store;
pub mod writer;

pub use like_repository::{merge_like_counts, LikeCounter, PgLikeRepository};
pub use memory::{DocumentPlaceStore, MemoryLikes};
pub use photo_rewrite::{rewrite_url, PhotoUrlRewriter};
pub use postgres::PgPlaceStore;
pub use store::PlaceStore;
