// src/lib.rs
// DOCUMENTATION: Library root
// PURPOSE: Shared by the HTTP server and the maintenance binaries

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod mapper;
pub mod models;
pub mod services;
