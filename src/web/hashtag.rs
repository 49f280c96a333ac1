//! `/hashtag` route: posts carrying a hashtag.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{AppState, PageParams, POSTS_PAGE_SIZE};
use crate::db::{self as queries, FullPost};
use crate::error::ApiResult;

pub fn router() -> Router<AppState> {
    Router::new().route("/:tag", get(list_hashtag_posts))
}

/// GET /hashtag/:tag?lastId=N
///
/// The path segment arrives percent-decoded; a leading `#` is tolerated.
async fn list_hashtag_posts(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<FullPost>>> {
    let name = tag.trim_start_matches('#').to_lowercase();
    let posts =
        queries::list_hashtag_posts(state.db.pool(), &name, page.cursor(), POSTS_PAGE_SIZE)
            .await?;
    Ok(Json(posts))
}
