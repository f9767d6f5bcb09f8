use std::sync::Arc;

use async_trait::async_trait;
use autohub::db::memory_service::{MemoryPool, MemoryStore, user_service};
use autohub::server::config::ServerConfig;
use autohub::services::{
    auth_service,
    summary_service::{SummaryError, SummaryService, TextGenerator},
};
use autohub::web::{AppState, DraftStore, create_axum_router};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const TEST_COST: u32 = 4;

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _: &str, _: &str) -> Result<Option<String>, SummaryError> {
        Err(SummaryError::Api {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

struct TestApp {
    router: Router,
    pool: MemoryPool,
    drafts: DraftStore,
}

async fn test_app() -> TestApp {
    let config = ServerConfig::load_with_vars(
        None,
        vec![
            ("JWT_SECRET".to_string(), "test-secret".to_string()),
            ("BCRYPT_COST".to_string(), TEST_COST.to_string()),
        ],
    )
    .unwrap();
    let pool = MemoryStore::new_pool();
    let admin_hash = auth_service::hash_password("adminpass1", TEST_COST)
        .await
        .unwrap();
    user_service::ensure_admin(&pool, "admin", admin_hash)
        .await
        .unwrap();

    let summary = SummaryService::new(Arc::new(FailingGenerator));
    let state = AppState::new(Arc::new(config), pool.clone(), summary);
    let drafts = state.drafts.clone();
    TestApp {
        router: create_axum_router(state),
        pool,
        drafts,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &TestApp, username: &str, role: &str, national_id: Option<&str>) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": username, "password": "secret1", "role": role, "national_id": national_id }),
        ),
    )
    .await
}

async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": username, "password": password }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn inspector_token(app: &TestApp, username: &str) -> String {
    let (status, _) = register(app, username, "inspector", Some("29910101234567")).await;
    assert_eq!(status, StatusCode::OK);
    login(app, username, "secret1").await
}

fn valid_car() -> Value {
    json!({
        "brand": "Toyota",
        "type": "Sedan",
        "model": "2019",
        "color": "أبيض",
        "chassis_number": "jtd123abc",
        "mileage": 85000,
        "notes": "حالة ممتازة"
    })
}

fn multipart_body(boundary: &str, files: &[(&str, usize)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, size) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend(std::iter::repeat_n(0xAB_u8, *size));
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn upload_request(draft_id: &str, token: &str, files: &[(&str, usize)]) -> Request<Body> {
    let boundary = "autohub-boundary";
    Request::builder()
        .method("POST")
        .uri(format!("/api/drafts/{draft_id}/images"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(multipart_body(boundary, files)))
        .unwrap()
}

async fn open_draft(app: &TestApp, token: &str) -> String {
    let (status, draft) = send(app, empty_request("POST", "/api/drafts", token)).await;
    assert_eq!(status, StatusCode::CREATED);
    draft["id"].as_str().unwrap().to_string()
}

async fn create_record(app: &TestApp, token: &str) -> Value {
    let (status, draft) = send(app, empty_request("POST", "/api/drafts", token)).await;
    assert_eq!(status, StatusCode::CREATED);
    let draft_id = draft["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        app,
        json_request("PUT", &format!("/api/drafts/{draft_id}"), Some(token), valid_car()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, submitted) = send(
        app,
        empty_request("POST", &format!("/api/drafts/{draft_id}/submit"), token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{submitted}");
    assert_eq!(submitted["outcome"], "created");
    submitted["record"].clone()
}

#[tokio::test]
async fn test_register_then_login_and_me() {
    let app = test_app().await;
    let (status, body) = register(&app, "omar", "inspector", Some("29910101234567")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "login");
    assert_eq!(body["user"]["role"], "inspector");

    let token = login(&app, "omar", "secret1").await;
    let (status, me) = send(&app, empty_request("GET", "/api/auth/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "omar");
}

#[tokio::test]
async fn test_login_sets_http_only_cookie() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "admin", "password": "adminpass1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_registration_errors_are_localized_by_field() {
    let app = test_app().await;
    let (status, body) = register(&app, "insp", "inspector", Some("123")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["national_id"],
        "يجب أن يتكون الرقم القومي من 14 رقماً باللغة الإنجليزية"
    );

    let (status, body) = register(&app, "boss", "admin", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["role"].is_string());

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .body(Body::from(json!({ "username": "a b", "password": "x" }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["username"],
        "Use English letters and digits only (no spaces)"
    );
}

#[tokio::test]
async fn test_duplicate_username_is_a_conflict() {
    let app = test_app().await;
    assert_eq!(register(&app, "viewer", "user", None).await.0, StatusCode::OK);
    assert_eq!(register(&app, "viewer", "user", None).await.0, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/cars")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ordinary_user_can_browse_but_not_create() {
    let app = test_app().await;
    register(&app, "viewer", "user", None).await;
    let token = login(&app, "viewer", "secret1").await;

    let (status, nav) = send(&app, empty_request("GET", "/api/navigation", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(nav["show_sidebar"], false);
    assert_eq!(nav["destinations"], json!(["dashboard", "cars"]));

    let (status, _) = send(&app, empty_request("GET", "/api/navigation?active=add-car", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, empty_request("POST", "/api/drafts", &token)).await.0, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, empty_request("GET", "/api/users", &token)).await.0, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, empty_request("GET", "/api/cars", &token)).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_draft_rejects_negative_mileage_and_drops_oversized_images() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;

    let (_, draft) = send(&app, empty_request("POST", "/api/drafts", &token)).await;
    let draft_id = draft["id"].as_str().unwrap().to_string();

    let mut car = valid_car();
    car["mileage"] = json!(-5);
    send(&app, json_request("PUT", &format!("/api/drafts/{draft_id}"), Some(&token), car)).await;
    let (status, body) = send(&app, empty_request("POST", &format!("/api/drafts/{draft_id}/submit"), &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["mileage"], "المسافة المقطوعة لا يمكن أن تكون بالسالب");

    let upload = upload_request(
        &draft_id,
        &token,
        &[("front.jpg", 2048), ("huge.jpg", 1024 * 1024 + 1), ("rear.jpg", 16)],
    );
    let (status, view) = send(&app, upload).await;
    assert_eq!(status, StatusCode::OK, "{view}");
    let images = view["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(images[0].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    assert_eq!(view["warnings"][0]["kind"], "file_too_large");
    assert_eq!(view["warnings"][0]["name"], "huge.jpg");

    let (status, view) = send(&app, empty_request("DELETE", &format!("/api/drafts/{draft_id}/images/0"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["data"]["images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_phone_sized_photo_does_not_sink_the_batch() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let phone = 13 * 1024 * 1024;

    for batch in [
        [("small.jpg", 2048), ("phone.jpg", phone)],
        [("phone.jpg", phone), ("small.jpg", 2048)],
    ] {
        let draft_id = open_draft(&app, &token).await;
        let (status, view) = send(&app, upload_request(&draft_id, &token, &batch)).await;
        assert_eq!(status, StatusCode::OK, "{view}");
        assert_eq!(view["data"]["images"].as_array().unwrap().len(), 1);
        assert_eq!(view["warnings"].as_array().unwrap().len(), 1);
        assert_eq!(view["warnings"][0]["kind"], "file_too_large");
        assert_eq!(view["warnings"][0]["name"], "phone.jpg");
    }
}

#[tokio::test]
async fn test_upload_past_free_slots_warns_and_keeps_ten() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let draft_id = open_draft(&app, &token).await;

    let names: Vec<String> = (0..12).map(|i| format!("{i}.jpg")).collect();
    let files: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 64)).collect();
    let (status, view) = send(&app, upload_request(&draft_id, &token, &files)).await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["data"]["images"].as_array().unwrap().len(), 10);
    assert_eq!(view["warnings"][0]["kind"], "too_many_images");
}

#[tokio::test]
async fn test_open_drafts_are_capped_per_user() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;

    let first = open_draft(&app, &token).await;
    for _ in 0..5 {
        open_draft(&app, &token).await;
    }
    let (_, me) = send(&app, empty_request("GET", "/api/auth/me", &token)).await;
    assert_eq!(app.drafts.count_owned_by(me["id"].as_str().unwrap()), 5);

    let (status, _) = send(&app, empty_request("GET", &format!("/api/drafts/{first}"), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_a_user_drops_their_drafts() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let keeper = inspector_token(&app, "insp2").await;
    open_draft(&app, &token).await;
    open_draft(&app, &token).await;
    let kept = open_draft(&app, &keeper).await;

    let user = user_service::get_user_by_username(&app.pool, "insp1").await.unwrap().unwrap();
    assert_eq!(app.drafts.count_owned_by(&user.id), 2);

    let admin = login(&app, "admin", "adminpass1").await;
    let (status, _) = send(&app, empty_request("DELETE", &format!("/api/users/{}", user.id), &admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(app.drafts.count_owned_by(&user.id), 0);
    assert_eq!(app.drafts.len(), 1);
    let (status, _) = send(&app, empty_request("GET", &format!("/api/drafts/{kept}"), &keeper)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_drafts_are_private_to_their_owner() {
    let app = test_app().await;
    let owner = inspector_token(&app, "owner").await;
    let other = inspector_token(&app, "other").await;

    let (_, draft) = send(&app, empty_request("POST", "/api/drafts", &owner)).await;
    let draft_id = draft["id"].as_str().unwrap();
    let (status, _) = send(&app, empty_request("GET", &format!("/api/drafts/{draft_id}"), &other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_created_record_is_searchable_by_chassis() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let record = create_record(&app, &token).await;
    assert_eq!(record["inspector_name"], "insp1");

    let (status, results) = send(&app, empty_request("GET", "/api/cars?q=JTD123", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["chassis_display"], "JTD123ABC");
}

#[tokio::test]
async fn test_edit_request_is_applied_on_approval() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let record = create_record(&app, &token).await;
    let record_id = record["id"].as_str().unwrap().to_string();

    let (status, draft) = send(&app, empty_request("POST", &format!("/api/cars/{record_id}/drafts"), &token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["mode"]["kind"], "edit");
    assert_eq!(draft["data"]["brand"], "Toyota");
    let draft_id = draft["id"].as_str().unwrap().to_string();

    send(
        &app,
        json_request("PUT", &format!("/api/drafts/{draft_id}"), Some(&token), json!({ "notes": "خدش في الباب" })),
    )
    .await;
    let (status, submitted) = send(&app, empty_request("POST", &format!("/api/drafts/{draft_id}/submit"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["outcome"], "edit_requested");
    let request_id = submitted["request"]["id"].as_str().unwrap().to_string();

    let (status, own_request) =
        send(&app, empty_request("GET", &format!("/api/edit-requests/{request_id}"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own_request["status"], "pending");

    let (_, car) = send(&app, empty_request("GET", &format!("/api/cars/{record_id}"), &token)).await;
    assert_eq!(car["status"], "pending_edit");
    assert_eq!(car["notes"], "حالة ممتازة");

    assert_eq!(
        send(&app, empty_request("GET", "/api/edit-requests", &token)).await.0,
        StatusCode::FORBIDDEN
    );

    let admin = login(&app, "admin", "adminpass1").await;
    let (status, pending) = send(&app, empty_request("GET", "/api/edit-requests", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, reviewed) = send(&app, empty_request("POST", &format!("/api/edit-requests/{request_id}/approve"), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "approved");

    let (_, car) = send(&app, empty_request("GET", &format!("/api/cars/{record_id}"), &token)).await;
    assert_eq!(car["status"], "active");
    assert_eq!(car["notes"], "خدش في الباب");

    let (status, _) = send(&app, empty_request("POST", &format!("/api/edit-requests/{request_id}/reject"), &admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_summary_failure_returns_fallback_text() {
    let app = test_app().await;
    let token = inspector_token(&app, "insp1").await;
    let record = create_record(&app, &token).await;
    let record_id = record["id"].as_str().unwrap();

    let (status, body) = send(&app, empty_request("POST", &format!("/api/cars/{record_id}/summary"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], true);
    assert_eq!(body["summary"], "حدث خطأ أثناء توليد الملخص.");
}

#[tokio::test]
async fn test_user_management_guards() {
    let app = test_app().await;
    let admin = login(&app, "admin", "adminpass1").await;
    let (_, me) = send(&app, empty_request("GET", "/api/auth/me", &admin)).await;
    let admin_id = me["id"].as_str().unwrap().to_string();

    register(&app, "mod1", "user", None).await;
    let mod_user = user_service::get_user_by_username(&app.pool, "mod1").await.unwrap().unwrap();
    let (status, row) = send(
        &app,
        json_request("PUT", &format!("/api/users/{}/role", mod_user.id), Some(&admin), json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["role"], "moderator");

    // Own account is off limits.
    let (status, _) = send(&app, empty_request("DELETE", &format!("/api/users/{admin_id}"), &admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let moderator = login(&app, "mod1", "secret1").await;
    let (status, rows) = send(&app, empty_request("GET", "/api/users", &moderator)).await;
    assert_eq!(status, StatusCode::OK);
    let admin_row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["username"] == "admin")
        .unwrap();
    assert_eq!(admin_row["can_delete"], false);
    assert_eq!(admin_row["can_toggle_status"], true);

    let (status, _) = send(&app, empty_request("DELETE", &format!("/api/users/{admin_id}"), &moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/users/{admin_id}/password"), Some(&moderator), json!({ "password": "x1" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Empty password is refused, a valid one takes effect.
    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/users/{}/password", mod_user.id), Some(&admin), json!({ "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/users/{}/password", mod_user.id), Some(&admin), json!({ "password": "fresh2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "mod1", "fresh2").await;

    // Disabling an account revokes its existing token.
    let (status, row) = send(&app, empty_request("PUT", &format!("/api/users/{}/status", mod_user.id), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["is_active"], false);
    assert_eq!(
        send(&app, empty_request("GET", "/api/users", &moderator)).await.0,
        StatusCode::FORBIDDEN
    );
}
