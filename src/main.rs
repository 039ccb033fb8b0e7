// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, place store, and start HTTP server

use actix_web::{middleware::Logger, web, App, HttpServer};
use auphere_place_store::config::{self, Config, StoreBackend};
use auphere_place_store::db::{DocumentPlaceStore, PgPlaceStore, PlaceStore};
use auphere_place_store::handlers;
use auphere_place_store::services::{PlaceService, WritePipeline};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            config.log_level.as_str()
        } else {
            "info,actix_web=info,sqlx=warn"
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    log::info!("Starting auphere-place-store...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Initialize the place store
    let store: Arc<dyn PlaceStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = match config::init_db_pool(&config).await {
                Ok(pool) => pool,
                Err(e) => {
                    log::error!("Failed to connect to database: {}", e);
                    std::process::exit(1);
                }
            };

            if config.run_migrations {
                if let Err(e) = config::run_migrations(&pool).await {
                    log::error!("Failed to apply migrations: {}", e);
                    std::process::exit(1);
                }
            }

            Arc::new(PgPlaceStore::new(pool, WritePipeline::standard()))
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory document store, data is lost on restart");
            Arc::new(DocumentPlaceStore::new(WritePipeline::standard()))
        }
    };

    let service = PlaceService::new(store, config.query_timeout());
    log::info!(
        "Place store ready (backend: {}, deadline: {:?})",
        service.backend_name(),
        config.query_timeout()
    );

    // 5. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let service = web::Data::new(service);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            // Application state (place service and config)
            .app_data(service.clone())
            .app_data(config.clone())
            // Middleware
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::places_config)
            .configure(handlers::admin_config)
    })
    .bind(&server_addr)?
    .run()
    .await
}
