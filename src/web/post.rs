//! `/post` routes: create, upload images, comment, retweet, like, edit, delete, fetch.

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::auth::RequireUser;
use crate::db::{self as queries, Comment, FullPost};
use crate::error::{ApiError, ApiResult};
use crate::hashtag::extract_hashtags;
use crate::storage::content_type_for;

/// Upper bound on files accepted by one `POST /post/images` request.
pub const MAX_IMAGES_PER_UPLOAD: usize = 10;

const POST_MISSING: &str = "Post does not exist.";
const ALREADY_RETWEETED: &str = "Already retweeted.";

pub fn router(upload_body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route(
            "/images",
            post(upload_images).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/:post_id",
            get(get_post).patch(edit_post).delete(delete_post),
        )
        .route("/:post_id/comment", post(add_comment))
        .route("/:post_id/retweet", post(retweet))
        .route("/:post_id/like", patch(like_post).delete(unlike_post))
}

/// `image` may be sent as a single src or a list of srcs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageField {
    One(String),
    Many(Vec<String>),
}

impl ImageField {
    fn into_srcs(self) -> Vec<String> {
        let srcs = match self {
            Self::One(src) => vec![src],
            Self::Many(srcs) => srcs,
        };
        srcs.into_iter().filter(|s| !s.trim().is_empty()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct CreatePostBody {
    #[serde(default)]
    content: String,
    image: Option<ImageField>,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct LikeResponse {
    #[serde(rename = "PostId")]
    post_id: i64,
    #[serde(rename = "UserId")]
    user_id: i64,
}

#[derive(Debug, Serialize)]
struct EditResponse {
    #[serde(rename = "PostId")]
    post_id: i64,
    content: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    #[serde(rename = "PostId")]
    post_id: i64,
}

fn require_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Content is required.".to_string()));
    }
    Ok(())
}

/// POST /post - write a new post.
async fn create_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreatePostBody>,
) -> ApiResult<(StatusCode, Json<FullPost>)> {
    require_content(&body.content)?;

    let hashtags = extract_hashtags(&body.content);
    let images = body.image.map(ImageField::into_srcs).unwrap_or_default();

    let post_id =
        queries::create_post(state.db.pool(), user.id, &body.content, &hashtags, &images).await?;

    info!(
        post_id,
        user_id = user.id,
        hashtags = hashtags.len(),
        images = images.len(),
        "Post created"
    );

    let full = queries::get_full_post(state.db.pool(), post_id)
        .await?
        .context("Created post not found")?;

    Ok((StatusCode::CREATED, Json(full)))
}

/// POST /post/images - store uploaded files and return their srcs.
async fn upload_images(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Vec<String>>> {
    let mut srcs = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        if srcs.len() >= MAX_IMAGES_PER_UPLOAD {
            return Err(ApiError::BadRequest(format!(
                "At most {MAX_IMAGES_PER_UPLOAD} images per upload."
            )));
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = content_type_for(&file_name, field.content_type());
        let data = field.bytes().await?;

        if data.is_empty() {
            continue;
        }
        if data.len() > state.config.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "{file_name} exceeds the {} byte upload limit.",
                state.config.max_upload_bytes
            )));
        }

        let src = state.images.put(&file_name, &content_type, &data).await?;
        srcs.push(src);
    }

    info!(
        user_id = user.id,
        count = srcs.len(),
        store = state.images.name(),
        "Images uploaded"
    );

    Ok(Json(srcs))
}

/// POST /post/:post_id/comment
async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
    Json(body): Json<ContentBody>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let pool = state.db.pool();

    if queries::get_post(pool, post_id).await?.is_none() {
        return Err(ApiError::Forbidden(POST_MISSING));
    }
    require_content(&body.content)?;

    let comment_id = queries::create_comment(pool, post_id, user.id, &body.content).await?;
    info!(comment_id, post_id, user_id = user.id, "Comment created");

    let comment = queries::get_comment(pool, comment_id)
        .await?
        .context("Created comment not found")?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// POST /post/:post_id/retweet
async fn retweet(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<FullPost>)> {
    let pool = state.db.pool();

    let post = queries::get_post(pool, post_id)
        .await?
        .ok_or(ApiError::Forbidden(POST_MISSING))?;

    let mut own = post.user_id == user.id;
    if let Some(origin_id) = post.retweet_id {
        if let Some(origin) = queries::get_post(pool, origin_id).await? {
            own |= origin.user_id == user.id;
        }
    }
    if own {
        return Err(ApiError::Forbidden("You cannot retweet your own post."));
    }

    let target_id = post.retweet_target();
    if queries::find_retweet(pool, user.id, target_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Forbidden(ALREADY_RETWEETED));
    }

    // A concurrent request may have inserted the same retweet since the check.
    let retweet_id = match queries::create_retweet(pool, user.id, target_id).await {
        Ok(id) => id,
        Err(e) if queries::is_unique_violation(&e) => {
            return Err(ApiError::Forbidden(ALREADY_RETWEETED));
        }
        Err(e) => return Err(e.into()),
    };
    info!(retweet_id, target_id, user_id = user.id, "Post retweeted");

    let full = queries::get_full_post(pool, retweet_id)
        .await?
        .context("Created retweet not found")?;

    Ok((StatusCode::CREATED, Json(full)))
}

/// PATCH /post/:post_id/like
async fn like_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<LikeResponse>> {
    let pool = state.db.pool();

    if queries::get_post(pool, post_id).await?.is_none() {
        return Err(ApiError::Unauthorized(POST_MISSING));
    }
    queries::add_like(pool, post_id, user.id).await?;

    Ok(Json(LikeResponse {
        post_id,
        user_id: user.id,
    }))
}

/// DELETE /post/:post_id/like
async fn unlike_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<LikeResponse>> {
    let pool = state.db.pool();

    if queries::get_post(pool, post_id).await?.is_none() {
        return Err(ApiError::Unauthorized(POST_MISSING));
    }
    queries::remove_like(pool, post_id, user.id).await?;

    Ok(Json(LikeResponse {
        post_id,
        user_id: user.id,
    }))
}

/// PATCH /post/:post_id - replace content and append new hashtags.
async fn edit_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
    Json(body): Json<ContentBody>,
) -> ApiResult<Json<EditResponse>> {
    let pool = state.db.pool();

    let post = queries::get_post(pool, post_id)
        .await?
        .ok_or(ApiError::NotFound(POST_MISSING))?;
    if post.user_id != user.id {
        return Err(ApiError::Forbidden("You can only edit your own posts."));
    }
    require_content(&body.content)?;

    let hashtags = extract_hashtags(&body.content);
    queries::update_post(pool, post_id, &body.content, &hashtags).await?;
    info!(post_id, user_id = user.id, "Post edited");

    Ok(Json(EditResponse {
        post_id,
        content: body.content,
    }))
}

/// DELETE /post/:post_id - delete the post and its comments.
async fn delete_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    let pool = state.db.pool();

    let post = queries::get_post(pool, post_id)
        .await?
        .ok_or(ApiError::NotFound(POST_MISSING))?;
    if post.user_id != user.id {
        return Err(ApiError::Forbidden("You can only delete your own posts."));
    }

    if !queries::delete_post(pool, post_id, user.id).await? {
        return Err(ApiError::NotFound(POST_MISSING));
    }
    info!(post_id, user_id = user.id, "Post deleted");

    Ok(Json(DeleteResponse { post_id }))
}

/// GET /post/:post_id
async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<FullPost>> {
    queries::get_full_post(state.db.pool(), post_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(POST_MISSING))
}
