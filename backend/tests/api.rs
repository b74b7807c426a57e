use actix_web::{App, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use backend::auth::jwt::JwtService;
use backend::auth::middleware::AuthMiddleware;
use backend::db::repository::Repository;
use backend::routes::configure_routes;
use backend::storage::media_store::MediaStore;

/// Per-test database file and media directory, removed on drop.
struct TestEnv {
    repo: Repository,
    store: MediaStore,
    jwt: JwtService,
    db_path: std::path::PathBuf,
    media_dir: std::path::PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_dir_all(&self.media_dir);
    }
}

async fn test_env() -> TestEnv {
    let tag = Uuid::new_v4().simple().to_string();
    let db_path = std::env::temp_dir().join(format!("df_api_test_{}.db", tag));
    let media_dir = std::env::temp_dir().join(format!("df_api_media_{}", tag));

    TestEnv {
        repo: Repository::open(db_path.to_str().unwrap()).await.unwrap(),
        store: MediaStore::new(&media_dir).unwrap(),
        jwt: JwtService::new("integration-test-secret"),
        db_path,
        media_dir,
    }
}

macro_rules! test_app {
    ($env:expr) => {{
        let jwt = $env.jwt.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new($env.repo.clone()))
                .app_data(web::Data::new($env.store.clone()))
                .app_data(web::Data::new(jwt.clone()))
                .configure(|cfg| configure_routes(cfg, AuthMiddleware::new(jwt))),
        )
        .await
    }};
}

fn multipart_body(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "test-upload-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[actix_web::test]
async fn liveness_is_public() {
    let env = test_env().await;
    let app = test_app!(env);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Deepfake Detection API is running.");
}

#[actix_web::test]
async fn protected_endpoints_require_a_valid_token() {
    let env = test_env().await;
    let app = test_app!(env);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/upload").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/result/1")
            .insert_header(("Authorization", "Bearer not-a-real-token"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    // A well-formed token signed with the wrong secret is also rejected.
    let forged = JwtService::new("wrong-secret")
        .generate_token("user@example.com")
        .unwrap();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect/1")
            .insert_header(("Authorization", format!("Bearer {}", forged)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn register_login_upload_result_flow() {
    let env = test_env().await;
    let app = test_app!(env);

    // Register.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(json!({ "email": "user@example.com", "password": "hunter22" }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let registered: Value = test::read_body_json(resp).await;
    assert_eq!(registered["email"], "user@example.com");

    // Duplicate email is a validation error.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(json!({ "email": "user@example.com", "password": "other" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // Bad credentials.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "user@example.com", "password": "wrong" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // Login.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "user@example.com", "password": "hunter22" }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let auth: Value = test::read_body_json(resp).await;
    assert_eq!(auth["token_type"], "bearer");
    let token = auth["access_token"].as_str().unwrap().to_string();

    // Upload an image.
    let (content_type, body) = multipart_body("photo.png", b"not-really-a-png");
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/upload")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .insert_header(("Content-Type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let media: Value = test::read_body_json(resp).await;
    let media_id = media["id"].as_i64().unwrap();
    let stored_name = media["filename"].as_str().unwrap();
    assert!(stored_name.ends_with(".png"));
    assert!(!stored_name.contains("photo"));

    // No detection has run yet.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/result/{}", media_id))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);

    // Detection results append; the endpoint serves the greatest-id row.
    env.repo
        .create_detection_result(media_id, 0, 0.25)
        .await
        .unwrap();
    env.repo
        .create_detection_result(media_id, 1, 0.85)
        .await
        .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/result/{}", media_id))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let result: Value = test::read_body_json(resp).await;
    assert_eq!(result["is_deepfake"], 1);
    assert_eq!(result["media_id"], media_id);
}

#[actix_web::test]
async fn upload_rejects_disallowed_extension_without_writing() {
    let env = test_env().await;
    let app = test_app!(env);

    let user = env.repo.create_user("user@example.com", "x").await.unwrap();
    let token = env.jwt.generate_token(&user.email).unwrap();

    let (content_type, body) = multipart_body("animation.gif", b"GIF89a");
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/upload")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .insert_header(("Content-Type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));

    // Nothing was written to media storage.
    assert_eq!(std::fs::read_dir(&env.media_dir).unwrap().count(), 0);
}

#[actix_web::test]
async fn results_are_scoped_to_the_owning_account() {
    let env = test_env().await;
    let app = test_app!(env);

    let alice = env
        .repo
        .create_user("alice@example.com", "x")
        .await
        .unwrap();
    let bob = env.repo.create_user("bob@example.com", "x").await.unwrap();

    let alice_media = env.repo.create_media("a.jpg", alice.id).await.unwrap();
    env.repo
        .create_detection_result(alice_media.id, 1, 0.9)
        .await
        .unwrap();

    let alice_token = env.jwt.generate_token(&alice.email).unwrap();
    let bob_token = env.jwt.generate_token(&bob.email).unwrap();

    // The owner sees the result.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/result/{}", alice_media.id))
            .insert_header(("Authorization", format!("Bearer {}", alice_token)))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    // Anyone else gets the same answer as for a nonexistent media id.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/result/{}", alice_media.id))
            .insert_header(("Authorization", format!("Bearer {}", bob_token)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/result/424242")
            .insert_header(("Authorization", format!("Bearer {}", bob_token)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
}
