//! Request guards that enforce authentication at the type level.
//! A handler taking `User` cannot run without a verified bearer token.

use crate::error::AppError;
use crate::middleware::auth::verify_token;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

/// The authenticated caller, extracted from the Authorization header.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn authenticate(req: &HttpRequest) -> Result<User, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or(AppError::Internal)?;
    let token = bearer_token(req).ok_or(AppError::Unauthorized)?;
    let claims = verify_token(&state.config.jwt_secret, token)?;
    Ok(User {
        id: claims.user_id()?,
    })
}

impl FromRequest for User {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(authenticate(req).map_err(Error::from))
    }
}
