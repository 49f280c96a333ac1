//! `/posts` route: the main timeline.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{AppState, PageParams, POSTS_PAGE_SIZE};
use crate::db::{self as queries, FullPost};
use crate::error::ApiResult;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_posts))
}

/// GET /posts?lastId=N
async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<FullPost>>> {
    let posts = queries::list_posts(state.db.pool(), page.cursor(), POSTS_PAGE_SIZE).await?;
    Ok(Json(posts))
}
