use anyhow::{Context, Result};
use chrono::SecondsFormat;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{
    Comment, FullPost, Hashtag, IdRef, Image, MyInfo, Post, PublicProfile, RetweetOrigin,
    Session, User, UserRef,
};

/// Content stored on retweet rows.
pub const RETWEET_CONTENT: &str = "retweet";

/// Current time in the same format as the column defaults
/// (`strftime('%Y-%m-%dT%H:%M:%fZ')`), so timestamps compare lexically.
#[must_use]
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ========== Users ==========

/// Create a new user.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    nickname: &str,
    password_hash: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (email, nickname, password_hash)
        VALUES (?, ?, ?)
        ",
    )
    .bind(email)
    .bind(nickname)
    .bind(password_hash)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

/// Get a user by ID.
pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by id")
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by email")
}

/// Check if an email is already registered.
pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("Failed to check email existence")?;
    Ok(row.0 > 0)
}

/// Check if a user exists.
pub async fn user_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to check user existence")?;
    Ok(row.0 > 0)
}

/// Change a user's nickname.
pub async fn update_user_nickname(pool: &SqlitePool, user_id: i64, nickname: &str) -> Result<()> {
    sqlx::query("UPDATE users SET nickname = ?, updated_at = ? WHERE id = ?")
        .bind(nickname)
        .bind(now_timestamp())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update nickname")?;
    Ok(())
}

/// Get the public reference (id, nickname) for a user.
pub async fn get_user_ref(pool: &SqlitePool, id: i64) -> Result<Option<UserRef>> {
    sqlx::query_as("SELECT id, nickname FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user reference")
}

/// Build the "my info" payload for a logged-in user.
pub async fn get_my_info(pool: &SqlitePool, user: User) -> Result<MyInfo> {
    let posts = sqlx::query_as("SELECT id FROM posts WHERE user_id = ? ORDER BY id DESC")
        .bind(user.id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch post ids")?;
    let followings = following_ids(pool, user.id).await?;
    let followers = follower_ids(pool, user.id).await?;

    Ok(MyInfo {
        user,
        posts,
        followings,
        followers,
    })
}

/// Get another user's profile with relation counts.
pub async fn get_public_profile(pool: &SqlitePool, id: i64) -> Result<Option<PublicProfile>> {
    let row: Option<(i64, String, i64, i64, i64)> = sqlx::query_as(
        r"
        SELECT
            u.id,
            u.nickname,
            (SELECT COUNT(*) FROM posts WHERE user_id = u.id),
            (SELECT COUNT(*) FROM follows WHERE follower_id = u.id),
            (SELECT COUNT(*) FROM follows WHERE following_id = u.id)
        FROM users u
        WHERE u.id = ?
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch public profile")?;

    Ok(row.map(
        |(id, nickname, posts, followings, followers)| PublicProfile {
            id,
            nickname,
            posts,
            followings,
            followers,
        },
    ))
}

// ========== Follows ==========

/// Make `follower_id` follow `following_id`. Following twice is a no-op.
pub async fn follow_user(pool: &SqlitePool, follower_id: i64, following_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO follows (follower_id, following_id) VALUES (?, ?)")
        .bind(follower_id)
        .bind(following_id)
        .execute(pool)
        .await
        .context("Failed to follow user")?;
    Ok(())
}

/// Remove a follow relation. Returns the number of rows removed.
pub async fn unfollow_user(pool: &SqlitePool, follower_id: i64, following_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
        .bind(follower_id)
        .bind(following_id)
        .execute(pool)
        .await
        .context("Failed to unfollow user")?;
    Ok(result.rows_affected())
}

/// Users following `user_id`, most recent first.
pub async fn get_followers(pool: &SqlitePool, user_id: i64, limit: i64) -> Result<Vec<UserRef>> {
    sqlx::query_as(
        r"
        SELECT u.id, u.nickname
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = ?
        ORDER BY f.created_at DESC, u.id DESC
        LIMIT ?
        ",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch followers")
}

/// Users `user_id` follows, most recent first.
pub async fn get_followings(pool: &SqlitePool, user_id: i64, limit: i64) -> Result<Vec<UserRef>> {
    sqlx::query_as(
        r"
        SELECT u.id, u.nickname
        FROM follows f
        JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = ?
        ORDER BY f.created_at DESC, u.id DESC
        LIMIT ?
        ",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch followings")
}

async fn follower_ids(pool: &SqlitePool, user_id: i64) -> Result<Vec<IdRef>> {
    sqlx::query_as("SELECT follower_id AS id FROM follows WHERE following_id = ? ORDER BY follower_id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch follower ids")
}

async fn following_ids(pool: &SqlitePool, user_id: i64) -> Result<Vec<IdRef>> {
    sqlx::query_as("SELECT following_id AS id FROM follows WHERE follower_id = ? ORDER BY following_id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch following ids")
}

// ========== Posts ==========

/// Create a post together with its hashtags and images.
///
/// Hashtags are found or created by name. Everything is written in one
/// transaction.
pub async fn create_post(
    pool: &SqlitePool,
    user_id: i64,
    content: &str,
    hashtags: &[String],
    image_srcs: &[String],
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let post_id = sqlx::query("INSERT INTO posts (content, user_id) VALUES (?, ?)")
        .bind(content)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_rowid();

    attach_hashtags(&mut *tx, post_id, hashtags).await?;

    for src in image_srcs {
        sqlx::query("INSERT INTO images (src, post_id) VALUES (?, ?)")
            .bind(src)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .context("Failed to create image")?;
    }

    tx.commit().await.context("Failed to commit post")?;
    Ok(post_id)
}

/// Create a retweet of `target_id` by `user_id`.
pub async fn create_retweet(pool: &SqlitePool, user_id: i64, target_id: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO posts (content, user_id, retweet_id) VALUES (?, ?, ?)")
        .bind(RETWEET_CONTENT)
        .bind(user_id)
        .bind(target_id)
        .execute(pool)
        .await
        .context("Failed to create retweet")?;
    Ok(result.last_insert_rowid())
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Find `user_id`'s existing retweet of `target_id`, if any.
pub async fn find_retweet(pool: &SqlitePool, user_id: i64, target_id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE user_id = ? AND retweet_id = ? LIMIT 1")
        .bind(user_id)
        .bind(target_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up existing retweet")
}

/// Replace a post's content and link the given hashtags.
///
/// Hashtags already linked to the post are kept; new ones are appended.
pub async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    content: &str,
    hashtags: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE posts SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now_timestamp())
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    attach_hashtags(&mut *tx, post_id, hashtags).await?;

    tx.commit().await.context("Failed to commit post update")?;
    Ok(())
}

/// Delete a post owned by `user_id` along with its comments.
///
/// Returns `false` if no such post is owned by the user.
pub async fn delete_post(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r"
        DELETE FROM comments
        WHERE post_id = ?
          AND EXISTS (SELECT 1 FROM posts WHERE id = ? AND user_id = ?)
        ",
    )
    .bind(post_id)
    .bind(post_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comments")?;

    let deleted = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?
        .rows_affected();

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(deleted > 0)
}

/// Newest posts, optionally older than `last_id`.
pub async fn list_posts(
    pool: &SqlitePool,
    last_id: Option<i64>,
    limit: i64,
) -> Result<Vec<FullPost>> {
    let posts: Vec<Post> = sqlx::query_as(
        r"
        SELECT * FROM posts
        WHERE (? IS NULL OR id < ?)
        ORDER BY id DESC
        LIMIT ?
        ",
    )
    .bind(last_id)
    .bind(last_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    load_full_posts(pool, posts).await
}

/// Newest posts by one user, optionally older than `last_id`.
pub async fn list_user_posts(
    pool: &SqlitePool,
    user_id: i64,
    last_id: Option<i64>,
    limit: i64,
) -> Result<Vec<FullPost>> {
    let posts: Vec<Post> = sqlx::query_as(
        r"
        SELECT * FROM posts
        WHERE user_id = ? AND (? IS NULL OR id < ?)
        ORDER BY id DESC
        LIMIT ?
        ",
    )
    .bind(user_id)
    .bind(last_id)
    .bind(last_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list user posts")?;

    load_full_posts(pool, posts).await
}

/// Newest posts tagged with `name`, optionally older than `last_id`.
pub async fn list_hashtag_posts(
    pool: &SqlitePool,
    name: &str,
    last_id: Option<i64>,
    limit: i64,
) -> Result<Vec<FullPost>> {
    let posts: Vec<Post> = sqlx::query_as(
        r"
        SELECT p.* FROM posts p
        JOIN post_hashtags ph ON ph.post_id = p.id
        JOIN hashtags h ON h.id = ph.hashtag_id
        WHERE h.name = ? AND (? IS NULL OR p.id < ?)
        ORDER BY p.id DESC
        LIMIT ?
        ",
    )
    .bind(name)
    .bind(last_id)
    .bind(last_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list hashtag posts")?;

    load_full_posts(pool, posts).await
}

/// Get a post with author, images, comments, likers and retweet origin.
pub async fn get_full_post(pool: &SqlitePool, id: i64) -> Result<Option<FullPost>> {
    match get_post(pool, id).await? {
        Some(post) => Ok(Some(load_full_post(pool, post).await?)),
        None => Ok(None),
    }
}

async fn load_full_posts(pool: &SqlitePool, posts: Vec<Post>) -> Result<Vec<FullPost>> {
    let mut full = Vec::with_capacity(posts.len());
    for post in posts {
        full.push(load_full_post(pool, post).await?);
    }
    Ok(full)
}

async fn load_full_post(pool: &SqlitePool, post: Post) -> Result<FullPost> {
    let user = author_of(pool, &post).await?;
    let images = images_for_post(pool, post.id).await?;
    let comments = comments_for_post(pool, post.id).await?;
    let likers = likers_for_post(pool, post.id).await?;
    let hashtags = hashtags_for_post(pool, post.id).await?;

    let retweet = match post.retweet_id {
        Some(origin_id) => match get_post(pool, origin_id).await? {
            Some(origin) => {
                let origin_user = author_of(pool, &origin).await?;
                let origin_images = images_for_post(pool, origin.id).await?;
                Some(RetweetOrigin {
                    post: origin,
                    user: origin_user,
                    images: origin_images,
                })
            }
            None => None,
        },
        None => None,
    };

    Ok(FullPost {
        post,
        user,
        images,
        comments,
        likers,
        hashtags,
        retweet,
    })
}

async fn author_of(pool: &SqlitePool, post: &Post) -> Result<UserRef> {
    get_user_ref(pool, post.user_id)
        .await?
        .with_context(|| format!("Author {} of post {} is missing", post.user_id, post.id))
}

// ========== Hashtags ==========

/// Find-or-create each hashtag and link it to the post.
async fn attach_hashtags(
    conn: &mut SqliteConnection,
    post_id: i64,
    names: &[String],
) -> Result<()> {
    for name in names {
        sqlx::query("INSERT OR IGNORE INTO hashtags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .context("Failed to create hashtag")?;

        let (hashtag_id,): (i64,) = sqlx::query_as("SELECT id FROM hashtags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to fetch hashtag")?;

        sqlx::query("INSERT OR IGNORE INTO post_hashtags (post_id, hashtag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(hashtag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link hashtag")?;
    }
    Ok(())
}

/// Hashtags linked to a post, by name.
pub async fn hashtags_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Hashtag>> {
    sqlx::query_as(
        r"
        SELECT h.id, h.name
        FROM hashtags h
        JOIN post_hashtags ph ON ph.hashtag_id = h.id
        WHERE ph.post_id = ?
        ORDER BY h.name
        ",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch hashtags for post")
}

// ========== Images ==========

/// Images attached to a post, in upload order.
pub async fn images_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Image>> {
    sqlx::query_as("SELECT id, src, post_id FROM images WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch images for post")
}

// ========== Comments ==========

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    content: String,
    post_id: i64,
    user_id: i64,
    created_at: String,
    updated_at: String,
    author_nickname: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            post_id: row.post_id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user: UserRef {
                id: row.user_id,
                nickname: row.author_nickname,
            },
        }
    }
}

/// Create a comment on a post.
pub async fn create_comment(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    content: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO comments (post_id, user_id, content)
        VALUES (?, ?, ?)
        ",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(result.last_insert_rowid())
}

/// Get a comment with its author.
pub async fn get_comment(pool: &SqlitePool, comment_id: i64) -> Result<Option<Comment>> {
    let row: Option<CommentRow> = sqlx::query_as(
        r"
        SELECT c.id, c.content, c.post_id, c.user_id, c.created_at, c.updated_at,
               u.nickname AS author_nickname
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.id = ?
        ",
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch comment")?;

    Ok(row.map(Comment::from))
}

/// All comments on a post, oldest first.
pub async fn comments_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Comment>> {
    let rows: Vec<CommentRow> = sqlx::query_as(
        r"
        SELECT c.id, c.content, c.post_id, c.user_id, c.created_at, c.updated_at,
               u.nickname AS author_nickname
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.post_id = ?
        ORDER BY c.id
        ",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch comments for post")?;

    Ok(rows.into_iter().map(Comment::from).collect())
}

// ========== Likes ==========

/// Record that a user likes a post. Liking twice is a no-op.
pub async fn add_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to add like")?;
    Ok(())
}

/// Remove a user's like from a post.
pub async fn remove_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove like")?;
    Ok(())
}

/// Users who like a post.
pub async fn likers_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<UserRef>> {
    sqlx::query_as(
        r"
        SELECT u.id, u.nickname
        FROM likes l
        JOIN users u ON u.id = l.user_id
        WHERE l.post_id = ?
        ORDER BY l.created_at, u.id
        ",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch likers")
}

// ========== Sessions ==========

/// Create a new session.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expires_at: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO sessions (user_id, token, expires_at)
        VALUES (?, ?, ?)
        ",
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(result.last_insert_rowid())
}

/// Get a session by token.
pub async fn get_session_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch session by token")
}

/// Update session last_used_at.
pub async fn update_session_last_used(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
        .bind(now_timestamp())
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to update session last_used")?;
    Ok(())
}

/// Delete a session.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session")?;
    Ok(())
}

/// Delete expired sessions.
pub async fn delete_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now_timestamp())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;
    Ok(result.rows_affected())
}
