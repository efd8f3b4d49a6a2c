use crate::models::ApiResponse;
use actix_session::{Session, SessionExt};
use actix_web::{dev, error::InternalError, FromRequest, HttpRequest, HttpResponse};
use serde::Serialize;
use std::future::{ready, Ready};

pub const SESSION_USERNAME_KEY: &str = "username";

/// Username of the logged-in user, taken from the session cookie.
///
/// Roles are not kept in the session; handlers reload them per request so a
/// role change takes effect without a new login.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        match session_username(&session) {
            Some(username) => ready(Ok(AuthenticatedUser { username })),
            None => {
                let response =
                    HttpResponse::Unauthorized().json(ApiResponse::<()>::failure("Not logged in."));
                ready(Err(InternalError::from_response("Not logged in.", response).into()))
            }
        }
    }
}

pub fn session_username(session: &Session) -> Option<String> {
    session.get::<String>(SESSION_USERNAME_KEY).unwrap_or_else(|e| {
        log::warn!("Discarding unreadable session entry: {}", e);
        None
    })
}
