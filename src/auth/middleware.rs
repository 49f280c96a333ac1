use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::auth::cookie;
use crate::db as queries;
use crate::db::User;
use crate::error::ApiError;
use crate::web::AppState;

/// Current authenticated user (if any).
/// Use this extractor when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let pool = state.db.pool();

        let Some(token) = cookie::session_token(
            &parts.headers,
            &state.config.session_cookie_name,
            &state.config.cookie_secret,
        ) else {
            return Ok(MaybeUser(None));
        };

        let Some(session) = queries::get_session_by_token(pool, token).await? else {
            return Ok(MaybeUser(None));
        };

        if session.expires_at < queries::now_timestamp() {
            // Clean up expired session
            let _ = queries::delete_session(pool, token).await;
            return Ok(MaybeUser(None));
        }

        let Some(user) = queries::get_user_by_id(pool, session.user_id).await? else {
            return Ok(MaybeUser(None));
        };

        let _ = queries::update_session_last_used(pool, session.id).await;

        Ok(MaybeUser(Some(user)))
    }
}

/// Current authenticated user (required).
/// Returns 401 Unauthorized if not logged in.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        user.map(RequireUser).ok_or(ApiError::LoginRequired)
    }
}

/// Guard for routes only guests may use (signup, login).
/// Returns 401 Unauthorized if a session is already active.
#[derive(Debug, Clone, Copy)]
pub struct RequireGuest;

#[async_trait]
impl<S> FromRequestParts<S> for RequireGuest
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        match user {
            Some(_) => Err(ApiError::AlreadyLoggedIn),
            None => Ok(RequireGuest),
        }
    }
}
