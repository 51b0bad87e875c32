//! # wall-api
//!
//! The web routing and orchestration layer for the wall.

pub mod handlers;
pub mod identity;
pub mod middleware;

use actix_web::web;

pub use handlers::{ApiError, AppState};
pub use identity::{HeaderIdentity, IdentityProvider};

/// Configures the routes of the wall.
///
/// Everything lives under `/wall` so the binary can mount other services
/// next to it.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wall")
            .route("", web::get().to(handlers::wall_page))
            .route("", web::post().to(handlers::post_message))
            .route("/latest", web::get().to(handlers::latest))
            .route("/messages/{id}", web::get().to(handlers::view_thread))
            .route("/messages/{id}", web::put().to(handlers::edit))
            .route("/messages/{id}", web::delete().to(handlers::delete))
            .route("/messages/{id}/replies", web::post().to(handlers::reply))
            .route("/messages/{id}/hide", web::post().to(handlers::hide))
            .route("/messages/{id}/unhide", web::post().to(handlers::unhide))
            .route("/users/{user_id}/messages", web::get().to(handlers::by_author)),
    );
}
