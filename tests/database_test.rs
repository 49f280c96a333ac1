//! Integration tests for database operations.

use nodebird_server::auth::cleanup::cleanup_once;
use nodebird_server::db::{
    add_like, comments_for_post, create_comment, create_post, create_retweet, create_session,
    create_user, delete_post, find_retweet, follow_user, get_full_post, get_my_info,
    get_public_profile, get_session_by_token, get_user_by_email, get_user_by_id,
    hashtags_for_post, likers_for_post, list_hashtag_posts, list_posts, list_user_posts,
    unfollow_user, update_post, Database,
};
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn user(db: &Database, name: &str) -> i64 {
    create_user(db.pool(), &format!("{name}@example.com"), name, "hash")
        .await
        .expect("Failed to create user")
}

fn tags(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_create_and_get_user() {
    let (db, _temp_dir) = setup_db().await;

    let id = user(&db, "alice").await;
    assert!(id > 0);

    let by_id = get_user_by_id(db.pool(), id).await.unwrap().unwrap();
    assert_eq!(by_id.nickname, "alice");
    assert!(by_id.created_at.ends_with('Z'));

    let by_email = get_user_by_email(db.pool(), "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, id);

    // Email is unique.
    assert!(create_user(db.pool(), "alice@example.com", "again", "hash")
        .await
        .is_err());
}

#[tokio::test]
async fn test_post_with_hashtags_shares_tag_rows() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;

    let first = create_post(db.pool(), alice, "a #rust", &tags(&["rust"]), &[])
        .await
        .unwrap();
    let second = create_post(db.pool(), alice, "b #rust #web", &tags(&["rust", "web"]), &[])
        .await
        .unwrap();

    let first_tags = hashtags_for_post(db.pool(), first).await.unwrap();
    let second_tags = hashtags_for_post(db.pool(), second).await.unwrap();
    assert_eq!(first_tags.len(), 1);
    assert_eq!(second_tags.len(), 2);
    assert_eq!(first_tags[0].id, second_tags[0].id);

    let tagged = list_hashtag_posts(db.pool(), "rust", None, 10).await.unwrap();
    assert_eq!(tagged.len(), 2);
    assert_eq!(tagged[0].post.id, second);

    let older = list_hashtag_posts(db.pool(), "rust", Some(second), 10)
        .await
        .unwrap();
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].post.id, first);
}

#[tokio::test]
async fn test_update_post_appends_hashtags() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let post = create_post(db.pool(), alice, "#old", &tags(&["old"]), &[])
        .await
        .unwrap();

    update_post(db.pool(), post, "#new", &tags(&["new"])).await.unwrap();

    let names: Vec<String> = hashtags_for_post(db.pool(), post)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.name)
        .collect();
    assert_eq!(names, vec!["new", "old"]);

    let full = get_full_post(db.pool(), post).await.unwrap().unwrap();
    assert_eq!(full.post.content, "#new");
}

#[tokio::test]
async fn test_full_post_includes_relations() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;

    let post = create_post(
        db.pool(),
        alice,
        "pics",
        &[],
        &tags(&["1.png", "2.png"]),
    )
    .await
    .unwrap();
    create_comment(db.pool(), post, bob, "wow").await.unwrap();
    add_like(db.pool(), post, bob).await.unwrap();
    add_like(db.pool(), post, bob).await.unwrap();

    let full = get_full_post(db.pool(), post).await.unwrap().unwrap();
    assert_eq!(full.user.nickname, "alice");
    assert_eq!(full.images.len(), 2);
    assert_eq!(full.images[0].post_id, Some(post));
    assert_eq!(full.comments.len(), 1);
    assert_eq!(full.comments[0].user.nickname, "bob");
    assert_eq!(full.likers.len(), 1);
    assert!(full.retweet.is_none());

    let json = serde_json::to_value(&full).unwrap();
    assert_eq!(json["UserId"], alice);
    assert!(json["createdAt"].is_string());
    assert_eq!(json["Comments"][0]["User"]["nickname"], "bob");
}

#[tokio::test]
async fn test_retweet_points_at_original() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let original = create_post(db.pool(), alice, "original", &[], &tags(&["o.png"]))
        .await
        .unwrap();

    let retweet = create_retweet(db.pool(), bob, original).await.unwrap();

    let found = find_retweet(db.pool(), bob, original).await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(retweet));
    assert!(find_retweet(db.pool(), alice, original).await.unwrap().is_none());

    let full = get_full_post(db.pool(), retweet).await.unwrap().unwrap();
    assert_eq!(full.post.retweet_id, Some(original));
    assert_eq!(full.post.retweet_target(), original);
    let origin = full.retweet.unwrap();
    assert_eq!(origin.user.nickname, "alice");
    assert_eq!(origin.images.len(), 1);
}

#[tokio::test]
async fn test_deleting_original_detaches_retweets() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let original = create_post(db.pool(), alice, "gone soon", &[], &[])
        .await
        .unwrap();
    let retweet = create_retweet(db.pool(), bob, original).await.unwrap();

    assert!(delete_post(db.pool(), original, alice).await.unwrap());

    let full = get_full_post(db.pool(), retweet).await.unwrap().unwrap();
    assert!(full.post.retweet_id.is_none());
    assert!(full.retweet.is_none());
}

#[tokio::test]
async fn test_delete_post_is_owner_scoped() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let post = create_post(db.pool(), alice, "mine", &[], &[]).await.unwrap();
    create_comment(db.pool(), post, bob, "hi").await.unwrap();
    add_like(db.pool(), post, bob).await.unwrap();

    assert!(!delete_post(db.pool(), post, bob).await.unwrap());
    assert_eq!(comments_for_post(db.pool(), post).await.unwrap().len(), 1);

    assert!(delete_post(db.pool(), post, alice).await.unwrap());
    assert!(get_full_post(db.pool(), post).await.unwrap().is_none());
    assert!(comments_for_post(db.pool(), post).await.unwrap().is_empty());
    assert!(likers_for_post(db.pool(), post).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_posts_pagination() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let mut ids = Vec::new();
    for i in 0..5 {
        let author = if i % 2 == 0 { alice } else { bob };
        ids.push(
            create_post(db.pool(), author, &format!("post {i}"), &[], &[])
                .await
                .unwrap(),
        );
    }

    let page: Vec<i64> = list_posts(db.pool(), None, 3)
        .await
        .unwrap()
        .iter()
        .map(|p| p.post.id)
        .collect();
    assert_eq!(page, vec![ids[4], ids[3], ids[2]]);

    let next: Vec<i64> = list_posts(db.pool(), Some(ids[2]), 3)
        .await
        .unwrap()
        .iter()
        .map(|p| p.post.id)
        .collect();
    assert_eq!(next, vec![ids[1], ids[0]]);

    let alice_posts = list_user_posts(db.pool(), alice, None, 10).await.unwrap();
    assert_eq!(alice_posts.len(), 3);
    assert!(alice_posts.iter().all(|p| p.post.user_id == alice));
}

#[tokio::test]
async fn test_follow_relations() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;

    follow_user(db.pool(), alice, bob).await.unwrap();
    follow_user(db.pool(), alice, bob).await.unwrap();

    let alice_user = get_user_by_id(db.pool(), alice).await.unwrap().unwrap();
    let info = get_my_info(db.pool(), alice_user).await.unwrap();
    assert_eq!(info.followings.len(), 1);
    assert_eq!(info.followings[0].id, bob);
    assert!(info.followers.is_empty());

    let profile = get_public_profile(db.pool(), bob).await.unwrap().unwrap();
    assert_eq!(profile.followers, 1);
    assert_eq!(profile.followings, 0);

    assert_eq!(unfollow_user(db.pool(), alice, bob).await.unwrap(), 1);
    assert_eq!(unfollow_user(db.pool(), alice, bob).await.unwrap(), 0);

    assert!(get_public_profile(db.pool(), 999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_sessions_are_cleaned_up() {
    let (db, _temp_dir) = setup_db().await;
    let alice = user(&db, "alice").await;

    create_session(db.pool(), alice, "expired", "2000-01-01T00:00:00.000Z")
        .await
        .unwrap();
    create_session(db.pool(), alice, "live", "2999-01-01T00:00:00.000Z")
        .await
        .unwrap();

    assert_eq!(cleanup_once(db.pool()).await, 1);
    assert!(get_session_by_token(db.pool(), "expired")
        .await
        .unwrap()
        .is_none());
    assert!(get_session_by_token(db.pool(), "live").await.unwrap().is_some());
}
