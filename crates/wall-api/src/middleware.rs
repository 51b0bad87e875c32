//! Middleware shared by every wall deployment.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;

use crate::identity::{USER_ID_HEADER, USER_ROLE_HEADER};

/// Request logging.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent" time
    Logger::default()
}

// Important if the UI and API ever live on different subdomains.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .allowed_header(USER_ID_HEADER)
        .allowed_header(USER_ROLE_HEADER)
        .expose_headers(vec![header::RETRY_AFTER, header::LOCATION])
        .max_age(3600)
}
