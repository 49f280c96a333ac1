//! `/user` routes: accounts, sessions, profiles and follows.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AppState, PageParams, POSTS_PAGE_SIZE};
use crate::auth::{
    cookie, generate_session_token, hash_password, session_expiry, verify_password, MaybeUser,
    RequireGuest, RequireUser,
};
use crate::db::{self as queries, FullPost, MyInfo, PublicProfile, UserRef};
use crate::error::{ApiError, ApiResult};

const USER_MISSING: &str = "User does not exist.";
const DEFAULT_FOLLOW_LIST_LIMIT: i64 = 3;
const MAX_FOLLOW_LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_info).post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/nickname", patch(change_nickname))
        .route("/followers", get(list_followers))
        .route("/followings", get(list_followings))
        .route("/follower/:user_id", delete(remove_follower))
        .route("/:user_id", get(profile))
        .route("/:user_id/follow", patch(follow).delete(unfollow))
        .route("/:user_id/posts", get(user_posts))
}

#[derive(Debug, Deserialize)]
struct SignupBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct NicknameBody {
    #[serde(default)]
    nickname: String,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

impl LimitParams {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_FOLLOW_LIST_LIMIT)
            .clamp(1, MAX_FOLLOW_LIST_LIMIT)
    }
}

#[derive(Debug, Serialize)]
struct FollowResponse {
    #[serde(rename = "UserId")]
    user_id: i64,
}

/// GET /user - the logged-in user, or `null`.
async fn my_info(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> ApiResult<Json<Option<MyInfo>>> {
    match user {
        Some(user) => Ok(Json(Some(
            queries::get_my_info(state.db.pool(), user).await?,
        ))),
        None => Ok(Json(None)),
    }
}

/// POST /user - register a new account.
async fn signup(
    State(state): State<AppState>,
    _guest: RequireGuest,
    Json(body): Json<SignupBody>,
) -> ApiResult<(StatusCode, &'static str)> {
    let email = body.email.trim();
    let nickname = body.nickname.trim();
    if email.is_empty() || nickname.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email, nickname and password are required.".to_string(),
        ));
    }

    let pool = state.db.pool();
    if queries::email_exists(pool, email).await? {
        return Err(ApiError::Forbidden("Email is already in use."));
    }

    let password_hash = hash_password(&body.password)?;
    let user_id = match queries::create_user(pool, email, nickname, &password_hash).await {
        Ok(id) => id,
        Err(e) if queries::is_unique_violation(&e) => {
            return Err(ApiError::Forbidden("Email is already in use."));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id, "User registered");
    Ok((StatusCode::CREATED, "ok"))
}

/// POST /user/login - check credentials and start a session.
async fn login(
    State(state): State<AppState>,
    _guest: RequireGuest,
    Json(body): Json<LoginBody>,
) -> ApiResult<Response> {
    let pool = state.db.pool();

    let user = queries::get_user_by_email(pool, body.email.trim())
        .await?
        .ok_or(ApiError::Unauthorized("No such user."))?;

    if !verify_password(&body.password, &user.password_hash)? {
        debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized("Wrong password."));
    }

    let token = generate_session_token();
    let expires_at = session_expiry(state.config.session_ttl);
    queries::create_session(pool, user.id, &token, &expires_at).await?;

    info!(user_id = user.id, "User logged in");

    let set_cookie = cookie::session_cookie(
        &state.config.session_cookie_name,
        &token,
        &state.config.cookie_secret,
        state.config.session_ttl.as_secs(),
    )?;
    let info = queries::get_my_info(pool, user).await?;

    Ok(([(header::SET_COOKIE, set_cookie)], Json(info)).into_response())
}

/// POST /user/logout - end the current session.
async fn logout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if let Some(token) = cookie::session_token(
        &headers,
        &state.config.session_cookie_name,
        &state.config.cookie_secret,
    ) {
        queries::delete_session(state.db.pool(), token).await?;
    }

    info!(user_id = user.id, "User logged out");

    let clear = cookie::clear_session_cookie(&state.config.session_cookie_name);
    Ok(([(header::SET_COOKIE, clear)], "ok").into_response())
}

/// PATCH /user/nickname
async fn change_nickname(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<NicknameBody>,
) -> ApiResult<Json<NicknameBody>> {
    let nickname = body.nickname.trim();
    if nickname.is_empty() {
        return Err(ApiError::BadRequest("Nickname is required.".to_string()));
    }

    queries::update_user_nickname(state.db.pool(), user.id, nickname).await?;

    Ok(Json(NicknameBody {
        nickname: nickname.to_string(),
    }))
}

/// GET /user/followers?limit=N
async fn list_followers(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<UserRef>>> {
    let followers = queries::get_followers(state.db.pool(), user.id, params.limit()).await?;
    Ok(Json(followers))
}

/// GET /user/followings?limit=N
async fn list_followings(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<UserRef>>> {
    let followings = queries::get_followings(state.db.pool(), user.id, params.limit()).await?;
    Ok(Json(followings))
}

/// PATCH /user/:user_id/follow
async fn follow(
    State(state): State<AppState>,
    RequireUser(me): RequireUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<FollowResponse>> {
    let pool = state.db.pool();

    if user_id == me.id {
        return Err(ApiError::Forbidden("You cannot follow yourself."));
    }
    if !queries::user_exists(pool, user_id).await? {
        return Err(ApiError::Forbidden(USER_MISSING));
    }

    queries::follow_user(pool, me.id, user_id).await?;
    info!(follower_id = me.id, following_id = user_id, "User followed");

    Ok(Json(FollowResponse { user_id }))
}

/// DELETE /user/:user_id/follow
async fn unfollow(
    State(state): State<AppState>,
    RequireUser(me): RequireUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<FollowResponse>> {
    let pool = state.db.pool();

    if !queries::user_exists(pool, user_id).await? {
        return Err(ApiError::Forbidden(USER_MISSING));
    }

    queries::unfollow_user(pool, me.id, user_id).await?;
    info!(follower_id = me.id, following_id = user_id, "User unfollowed");

    Ok(Json(FollowResponse { user_id }))
}

/// DELETE /user/follower/:user_id - stop `user_id` from following me.
async fn remove_follower(
    State(state): State<AppState>,
    RequireUser(me): RequireUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<FollowResponse>> {
    let pool = state.db.pool();

    if !queries::user_exists(pool, user_id).await? {
        return Err(ApiError::Forbidden(USER_MISSING));
    }

    queries::unfollow_user(pool, user_id, me.id).await?;
    info!(follower_id = user_id, following_id = me.id, "Follower removed");

    Ok(Json(FollowResponse { user_id }))
}

/// GET /user/:user_id - public profile.
async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<PublicProfile>> {
    queries::get_public_profile(state.db.pool(), user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(USER_MISSING))
}

/// GET /user/:user_id/posts?lastId=N
async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<FullPost>>> {
    let pool = state.db.pool();

    if !queries::user_exists(pool, user_id).await? {
        return Err(ApiError::NotFound(USER_MISSING));
    }

    let posts = queries::list_user_posts(pool, user_id, page.cursor(), POSTS_PAGE_SIZE).await?;
    Ok(Json(posts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_params() {
        assert_eq!(LimitParams { limit: None }.limit(), 3);
        assert_eq!(LimitParams { limit: Some(0) }.limit(), 1);
        assert_eq!(LimitParams { limit: Some(50) }.limit(), 50);
        assert_eq!(LimitParams { limit: Some(10_000) }.limit(), 100);
    }
}
