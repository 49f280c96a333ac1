//! Row types and the JSON shapes the client consumes.
//!
//! Field names on the wire follow the client's conventions (`UserId`,
//! `createdAt`, nested `User`/`Images`/...), so most fields carry an explicit
//! serde rename.

use serde::Serialize;

/// An account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// The public part of a user embedded in posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserRef {
    pub id: i64,
    pub nickname: String,
}

/// A bare id, used for the `Posts`/`Followers`/`Followings` lists on "my info".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct IdRef {
    pub id: i64,
}

/// A post row. `retweet_id` is set when the post shares another post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub content: String,
    #[serde(rename = "UserId")]
    pub user_id: i64,
    #[serde(rename = "RetweetId")]
    pub retweet_id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl Post {
    /// The post a retweet of this post must point at.
    ///
    /// Retweets never nest: retweeting a retweet targets its original.
    #[must_use]
    pub fn retweet_target(&self) -> i64 {
        self.retweet_id.unwrap_or(self.id)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub src: String,
    #[serde(rename = "PostId")]
    pub post_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Hashtag {
    pub id: i64,
    pub name: String,
}

/// A comment with its author.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    #[serde(rename = "PostId")]
    pub post_id: i64,
    #[serde(rename = "UserId")]
    pub user_id: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "User")]
    pub user: UserRef,
}

/// The post a retweet points at, with its author and images.
#[derive(Debug, Clone, Serialize)]
pub struct RetweetOrigin {
    #[serde(flatten)]
    pub post: Post,
    #[serde(rename = "User")]
    pub user: UserRef,
    #[serde(rename = "Images")]
    pub images: Vec<Image>,
}

/// A post with everything the client renders alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct FullPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(rename = "User")]
    pub user: UserRef,
    #[serde(rename = "Images")]
    pub images: Vec<Image>,
    #[serde(rename = "Comments")]
    pub comments: Vec<Comment>,
    #[serde(rename = "Likers")]
    pub likers: Vec<UserRef>,
    #[serde(rename = "Hashtags")]
    pub hashtags: Vec<Hashtag>,
    #[serde(rename = "Retweet")]
    pub retweet: Option<RetweetOrigin>,
}

/// The logged-in user as returned by `GET /user` and login.
#[derive(Debug, Clone, Serialize)]
pub struct MyInfo {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "Posts")]
    pub posts: Vec<IdRef>,
    #[serde(rename = "Followings")]
    pub followings: Vec<IdRef>,
    #[serde(rename = "Followers")]
    pub followers: Vec<IdRef>,
}

/// Another user's profile. Relations are reduced to counts.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: i64,
    pub nickname: String,
    #[serde(rename = "Posts")]
    pub posts: i64,
    #[serde(rename = "Followings")]
    pub followings: i64,
    #[serde(rename = "Followers")]
    pub followers: i64,
}

/// A login session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, retweet_id: Option<i64>) -> Post {
        Post {
            id,
            content: "hello".to_string(),
            user_id: 1,
            retweet_id,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_retweet_target_collapses_chain() {
        assert_eq!(post(5, None).retweet_target(), 5);
        assert_eq!(post(9, Some(5)).retweet_target(), 5);
    }

    #[test]
    fn test_full_post_wire_names() {
        let full = FullPost {
            post: post(2, Some(1)),
            user: UserRef {
                id: 1,
                nickname: "zero".to_string(),
            },
            images: vec![],
            comments: vec![],
            likers: vec![],
            hashtags: vec![Hashtag {
                id: 3,
                name: "rust".to_string(),
            }],
            retweet: None,
        };
        let value = serde_json::to_value(&full).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["UserId"], 1);
        assert_eq!(value["RetweetId"], 1);
        assert_eq!(value["User"]["nickname"], "zero");
        assert!(value["Retweet"].is_null());
        assert!(value["Images"].as_array().unwrap().is_empty());
        assert_eq!(value["Hashtags"][0]["name"], "rust");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_user_hides_password_hash() {
        let user = User {
            id: 1,
            email: "a@b.c".to_string(),
            nickname: "a".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "a@b.c");
    }
}
