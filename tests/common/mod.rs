//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use nodebird_server::config::{Config, StorageBackend};
use nodebird_server::db::Database;
use nodebird_server::storage::LocalImageStore;
use nodebird_server::web::{create_app, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const COOKIE_NAME: &str = "connect.sid";
pub const COOKIE_SECRET: &str = "test-cookie-secret";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub uploads_dir: PathBuf,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "Response is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `name=value` of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| v.starts_with(&format!("{COOKIE_NAME}=")))
            .filter_map(|v| v.split(';').next())
            .map(str::to_string)
            .next()
    }
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        cookie_secret: COOKIE_SECRET.to_string(),
        session_cookie_name: COOKIE_NAME.to_string(),
        session_ttl: Duration::from_secs(3600),
        database_path: dir.join("test.db"),
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
        cors_origin: "http://localhost:3060".to_string(),
        uploads_dir: dir.join("uploads"),
        max_upload_bytes: 1024,
        storage_backend: StorageBackend::Local,
        s3_bucket: "test-bucket".to_string(),
        s3_region: "ap-northeast-2".to_string(),
        s3_endpoint: None,
        s3_access_key_id: None,
        s3_secret_access_key: None,
    }
}

pub async fn spawn_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let db = Database::new(&config.database_path).await.unwrap();
    let images = LocalImageStore::new(&config.uploads_dir).await.unwrap();
    let uploads_dir = config.uploads_dir.clone();

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        images: Arc::new(images),
    };
    let router = create_app(state).unwrap();

    TestApp {
        router,
        db,
        uploads_dir,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, None)).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> TestResponse {
        self.send(request(method, uri, cookie, Some(body))).await
    }

    pub async fn empty(&self, method: Method, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(method, uri, cookie, None)).await
    }

    /// Register an account and log in, returning the session cookie.
    pub async fn register(&self, email: &str, nickname: &str) -> String {
        let signup = self
            .json(
                Method::POST,
                "/user",
                None,
                serde_json::json!({ "email": email, "nickname": nickname, "password": "pw1234" }),
            )
            .await;
        assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.text());

        let login = self
            .json(
                Method::POST,
                "/user/login",
                None,
                serde_json::json!({ "email": email, "password": "pw1234" }),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.text());
        login.session_cookie().expect("login sets a session cookie")
    }

    /// Id of the user behind a session cookie.
    pub async fn user_id(&self, cookie: &str) -> i64 {
        let me = self.get("/user", Some(cookie)).await;
        me.json()["id"].as_i64().expect("logged in")
    }

    /// Create a post and return its id.
    pub async fn create_post(&self, cookie: &str, content: &str) -> i64 {
        let res = self
            .json(
                Method::POST,
                "/post",
                Some(cookie),
                serde_json::json!({ "content": content }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        res.json()["id"].as_i64().unwrap()
    }
}

pub fn request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build a `multipart/form-data` body from `(field, file name, bytes)` parts.
pub fn multipart_request(uri: &str, cookie: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let boundary = "nodebird-test-boundary";
    let mut body = Vec::new();
    for (field, file_name, data) in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}
