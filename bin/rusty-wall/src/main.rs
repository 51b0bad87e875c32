//! # Rusty-Wall Binary
//!
//! The entry point that assembles the wall from its plugins.

mod config;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use wall_api::handlers::AppState;
use wall_api::middleware::{cors_policy, standard_middleware};
use wall_api::HeaderIdentity;
use wall_core::directory::InMemoryUserDirectory;
use wall_core::{LogDispatcher, WallService};
use wall_db_sqlite::SqliteMessageRepo;

use crate::config::WallConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = WallConfig::load()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(cfg.log_level.as_str()));

    // 1. Initialize Database Implementation
    let repo = SqliteMessageRepo::with_lock_timeout(&cfg.database_url, cfg.lock_timeout()).await?;
    let count = repo.check_integrity().await?;
    log::info!("message forest intact ({count} messages)");

    // 2. Wrap in AppState (Using dynamic dispatch for maximum flexibility)
    let service = WallService::new(Arc::new(repo), Arc::new(LogDispatcher), cfg.wall_settings());
    let state = web::Data::new(AppState {
        service,
        directory: Arc::new(InMemoryUserDirectory::new()),
        identity: Box::new(HeaderIdentity),
    });

    log::info!("Rusty-Wall starting on http://{}", cfg.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .configure(wall_api::configure_routes)
    })
    .bind(cfg.bind_addr.as_str())?
    .run()
    .await?;
    Ok(())
}
