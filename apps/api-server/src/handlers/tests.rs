use std::path::Path;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use serde_json::{Value, json};

use quill_core::domain::User;
use quill_core::ports::{BaseRepository, TokenKind, TokenService};
use quill_infra::{JwtConfig, JwtTokenService, Repositories};

use super::configure_routes;
use crate::config::MediaConfig;
use crate::state::AppState;

const BOUNDARY: &str = "quill-test-boundary";
const PASSWORD: &str = "correct horse";

fn test_state(media_root: &Path) -> AppState {
    let jwt = JwtConfig {
        secret: "test-secret".to_string(),
        ..JwtConfig::default()
    };
    let media = MediaConfig {
        root: media_root.to_path_buf(),
        url: "/media/".to_string(),
        max_upload_bytes: 1024,
    };
    AppState::with_repositories(Repositories::in_memory(), jwt, &media)
}

/// Insert a user directly and return an `Authorization` header value.
async fn bearer(state: &AppState, username: &str, staff: bool) -> String {
    let hash = state.password_service.hash(PASSWORD).unwrap();
    let mut user = User::new(username.to_string(), hash);
    if staff {
        user = user.staff();
    }
    let user = state.users.insert(user).await.unwrap();
    let token = state
        .token_service
        .generate_token(user.id, &user.username, user.roles(), TokenKind::Access)
        .unwrap();
    format!("Bearer {token}")
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Number of uploaded images written under `root`.
fn stored_images(root: &Path) -> usize {
    std::fs::read_dir(root.join("post"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_register_login_refresh_and_me() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/user/register/")
        .set_json(json!({"username": "alice", "password": PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["is_staff"], false);

    let req = test::TestRequest::post()
        .uri("/api/user/register/")
        .set_json(json!({"username": "alice", "password": "short"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["username"].is_array());
    assert!(body["errors"]["password"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/token/")
        .set_json(json!({"username": "alice", "password": "wrong password"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/token/")
        .set_json(json!({"username": "alice", "password": PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tokens: Value = test::read_body_json(resp).await;
    let access = tokens["access"].as_str().unwrap().to_string();
    let refresh = tokens["refresh"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/me/")
        .insert_header((header::AUTHORIZATION, format!("Bearer {access}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["username"], "alice");

    // A refresh token does not authenticate requests.
    let req = test::TestRequest::get()
        .uri("/api/me/")
        .insert_header((header::AUTHORIZATION, format!("Bearer {refresh}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    // And an access token does not refresh.
    let req = test::TestRequest::post()
        .uri("/api/token/refresh/")
        .set_json(json!({"refresh": access}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/token/refresh/")
        .set_json(json!({"refresh": refresh}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["access"].is_string());
}

#[actix_web::test]
async fn test_post_lifecycle_over_http() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);
    let alice = bearer(&state, "alice", false).await;
    let bob = bearer(&state, "bob", false).await;
    let admin = bearer(&state, "admin", true).await;

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .set_json(json!({"title": "Test Post", "content": "Body"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    for expected in ["test-post", "test-post-1"] {
        let req = test::TestRequest::post()
            .uri("/api/posts/")
            .insert_header((header::AUTHORIZATION, alice.clone()))
            .set_json(json!({"title": "Test Post", "content": "Body"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["slug"], expected);
        assert_eq!(body["user"], "alice");
        assert_eq!(body["image"], "/media/post/placeholder.webp");
        assert_eq!(body["category"], Value::Null);
        assert_eq!(body["comment_count"], 0);
    }

    let req = test::TestRequest::put()
        .uri("/api/posts/test-post/")
        .insert_header((header::AUTHORIZATION, bob.clone()))
        .set_json(json!({"title": "Mine now", "content": "x"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri("/api/posts/test-post/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"title": "Renamed", "slug": "ignored"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["slug"], "test-post");
    assert_eq!(body["content"], "Body");

    let req = test::TestRequest::delete()
        .uri("/api/posts/test-post/")
        .insert_header((header::AUTHORIZATION, bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri("/api/posts/test-post/")
        .insert_header((header::AUTHORIZATION, admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/posts/test-post/").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/posts/").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn test_categories_and_filtering() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);
    let alice = bearer(&state, "alice", false).await;

    let req = test::TestRequest::post()
        .uri("/api/categories/")
        .set_json(json!({"name": "Rust"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/categories/")
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("Rust")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/categories/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"name": "Rust"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/categories/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"name": "Rust"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["name"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"title": "Hello", "content": "x", "category": "Missing"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["category"][0],
        "Object with name=Missing does not exist."
    );

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice))
        .set_json(json!({"title": "Ownership", "content": "x", "category": "Rust"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/posts/category/Rust/").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body[0]["category"], "Rust");

    let req = test::TestRequest::get().uri("/api/posts/category/Nope/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!([]));

    let req = test::TestRequest::get().uri("/api/posts/?search=OWNER").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::get().uri("/api/categories/").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body[0]["name"], "Rust");
}

#[actix_web::test]
async fn test_comments_over_http() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);
    let alice = bearer(&state, "alice", false).await;

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"title": "Talk", "content": "x"}))
        .to_request();
    let post: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let post_id = post["id"].as_str().unwrap().to_string();
    let uri = format!("/api/posts/{post_id}/comments/");

    for text in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header((header::AUTHORIZATION, alice.clone()))
            .set_json(json!({"content": text}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get().uri(&uri).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body[0]["content"], "second");
    assert_eq!(body[1]["content"], "first");
    assert_eq!(body[0]["user"], "alice");
    assert_eq!(body[0]["post"], post_id.as_str());

    let req = test::TestRequest::get().uri("/api/posts/talk/").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["comment_count"], 2);

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"content": "anon"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let ghost = format!("/api/posts/{}/comments/", uuid::Uuid::now_v7());
    let req = test::TestRequest::post()
        .uri(&ghost)
        .insert_header((header::AUTHORIZATION, alice))
        .set_json(json!({"content": "hello?"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri(&ghost).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body, json!([]));

    let req = test::TestRequest::get()
        .uri("/api/posts/not-a-uuid/comments/")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_multipart_upload() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);
    let alice = bearer(&state, "alice", false).await;
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");

    let body = multipart_body(
        &[("title", "Pictured"), ("content", "x"), ("category", "")],
        Some(("photo.png", b"\x89PNG fake")),
    );
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post: Value = test::read_body_json(resp).await;
    let image = post["image"].as_str().unwrap();
    assert!(image.starts_with("/media/post/photo-"));
    assert_eq!(post["category"], Value::Null);

    let file_name = image.trim_start_matches("/media/post/");
    assert!(media.path().join("post").join(file_name).exists());

    let body = multipart_body(
        &[("title", "Bad"), ("content", "x")],
        Some(("notes.txt", b"plain text")),
    );
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let errors: Value = test::read_body_json(resp).await;
    assert!(errors["errors"]["image"].is_array());

    let oversized = vec![0u8; 2048];
    let body = multipart_body(
        &[("title", "Huge"), ("content", "x")],
        Some(("huge.png", &oversized)),
    );
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    // A failed create leaves no file behind.
    let body = multipart_body(&[("content", "no title")], Some(("orphan.png", b"img")));
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice))
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let stored = std::fs::read_dir(media.path().join("post")).unwrap().count();
    assert_eq!(stored, 1);
}

#[actix_web::test]
async fn test_writes_check_the_caller_before_the_body() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);
    let alice = bearer(&state, "alice", false).await;
    let bob = bearer(&state, "bob", false).await;
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");

    // Anonymous multipart with a file that would fail validation.
    let body = multipart_body(&[("title", "Sneaky")], Some(("x.txt", b"text")));
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    // Anonymous multipart with a valid image stores nothing.
    let body = multipart_body(
        &[("title", "Sneaky"), ("content", "x")],
        Some(("x.png", b"img")),
    );
    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stored_images(media.path()), 0);

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({"title": "Owned", "content": "x"}))
        .to_request();
    let post: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let comments = format!("/api/posts/{}/comments/", post["id"].as_str().unwrap());

    // A stranger's upload to someone else's post never reaches the store.
    let body = multipart_body(&[("title", "Mine")], Some(("x.png", b"img")));
    let req = test::TestRequest::put()
        .uri("/api/posts/owned/")
        .insert_header((header::AUTHORIZATION, bob))
        .insert_header((header::CONTENT_TYPE, content_type.clone()))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(stored_images(media.path()), 0);

    // Anonymous update of a missing post is still a 404.
    let req = test::TestRequest::patch()
        .uri("/api/posts/missing/")
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("garbage")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&comments)
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("hello")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri(&comments)
        .insert_header((header::AUTHORIZATION, alice))
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("hello")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unusable_token_is_rejected_with_reason() {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(media.path());
    let app = app!(state);

    let stale = JwtTokenService::new(JwtConfig {
        secret: "test-secret".to_string(),
        access_ttl_minutes: -10,
        ..JwtConfig::default()
    })
    .generate_token(uuid::Uuid::new_v4(), "alice", vec![], TokenKind::Access)
    .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, format!("Bearer {stale}")))
        .set_json(json!({"title": "Late", "content": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Token Expired");

    let req = test::TestRequest::delete()
        .uri("/api/posts/anything/")
        .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Invalid Token");

    // Post listings take no credentials at all.
    let req = test::TestRequest::get()
        .uri("/api/posts/")
        .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
