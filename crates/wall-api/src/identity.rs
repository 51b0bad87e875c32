//! # Identity
//!
//! Sessions are handled upstream; the wall only needs to know who is asking.

use actix_web::HttpRequest;
use uuid::Uuid;
use wall_core::error::{AppError, Result};
use wall_core::models::{Role, Viewer};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Turns a request into a [`Viewer`].
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, req: &HttpRequest) -> Result<Viewer>;
}

/// Trusts identity headers set by an authenticating gateway.
///
/// No user id means an anonymous viewer; a user id without a role is a
/// plain `user`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderIdentity;

fn header<'a>(req: &'a HttpRequest, name: &str) -> Result<Option<&'a str>> {
    match req.headers().get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| AppError::Unauthorized(format!("{name} is not valid text"))),
    }
}

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, req: &HttpRequest) -> Result<Viewer> {
        let Some(raw_id) = header(req, USER_ID_HEADER)? else {
            return Ok(Viewer::anonymous());
        };
        let user_id = Uuid::parse_str(raw_id)
            .map_err(|_| AppError::Unauthorized(format!("{USER_ID_HEADER} is not a valid id")))?;
        let role = match header(req, USER_ROLE_HEADER)? {
            Some(raw) => raw.parse::<Role>().map_err(|_| AppError::Unauthorized(format!("unknown role '{raw}'")))?,
            None => Role::User,
        };
        Ok(Viewer::user(user_id, role))
    }
}
