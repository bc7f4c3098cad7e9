/// Router-level tests for the storefront, tracking and connection endpoints
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use linkshelf::{
    auth::issue_access_token,
    connections::EncryptedTokens,
    connectors::Platform,
    db::create_memory_pool,
    server::build_router,
    AppContext, ServerConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    ctx: AppContext,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let db = create_memory_pool().await.unwrap();
        let ctx = AppContext::with_pool(ServerConfig::for_tests(), db).unwrap();
        let router = build_router(ctx.clone());
        Self { ctx, router }
    }

    fn token(&self, user_id: &str) -> String {
        issue_access_token(user_id, &self.ctx.config.security.jwt_secret, 3600).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn authed(&self, method: &str, uri: &str, user_id: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn public_post(&self, uri: &str, ip: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", ip)
            .header(header::USER_AGENT, "integration-test")
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Profile "shop" owned by user-1 with one link; returns the link id
    async fn storefront(&self) -> String {
        let (status, _) = self
            .authed("PUT", "/api/profile", "user-1", Some(json!({ "username": "Shop" })))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, link) = self
            .authed(
                "POST",
                "/api/links",
                "user-1",
                Some(json!({ "title": "Store", "url": "https://shop.example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        link["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_owner_routes_require_auth() {
    let app = TestApp::new().await;

    for uri in ["/api/profile", "/api/links", "/api/banners", "/api/connections"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "AuthenticationRequired");
    }

    let request = Request::builder()
        .uri("/api/links")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_storefront_lists_active_links() {
    let app = TestApp::new().await;
    let link_id = app.storefront().await;

    let request = Request::builder().uri("/api/public/shop").body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["username"], "shop");
    assert_eq!(body["links"][0]["id"], link_id.as_str());
    assert!(body["profile"].get("user_id").is_none());

    let (status, _) = app
        .authed("DELETE", &format!("/api/links/{}", link_id), "user-1", None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let request = Request::builder().uri("/api/public/shop").body(Body::empty()).unwrap();
    let (_, body) = app.send(request).await;
    assert_eq!(body["links"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_eleventh_link_is_rejected() {
    let app = TestApp::new().await;
    for n in 0..10 {
        let (status, _) = app
            .authed(
                "POST",
                "/api/links",
                "user-1",
                Some(json!({ "title": format!("Link {}", n), "url": "https://example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .authed(
            "POST",
            "/api/links",
            "user-1",
            Some(json!({ "title": "One too many", "url": "https://example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn test_profile_views_hit_429_after_limit() {
    let app = TestApp::new().await;
    app.storefront().await;

    // Views past the recording limit are still reported as tracked
    for _ in 0..10 {
        let (status, body) = app.public_post("/api/public/shop/view", "203.0.113.9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tracked"], true);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/public/shop/view")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Another visitor is unaffected
    let (status, _) = app.public_post("/api/public/shop/view", "203.0.113.10").await;
    assert_eq!(status, StatusCode::OK);

    let profile = app.ctx.profiles.get_by_username("shop").await.unwrap();
    // Five recorded for the first visitor, one for the second
    assert_eq!(profile.view_count, 6);
}

#[tokio::test]
async fn test_link_click_counts_even_when_event_insert_fails() {
    let app = TestApp::new().await;
    let link_id = app.storefront().await;

    sqlx::query("DROP TABLE link_click")
        .execute(&app.ctx.db)
        .await
        .unwrap();

    let (status, body) = app
        .public_post(&format!("/api/public/links/{}/click", link_id), "198.51.100.4")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked"], true);
    assert_eq!(body["url"], "https://shop.example.com");

    let link = app.ctx.links.get_active(&link_id).await.unwrap();
    assert_eq!(link.click_count, 1);
}

#[tokio::test]
async fn test_click_on_unknown_link_is_404() {
    let app = TestApp::new().await;
    let (status, _) = app.public_post("/api/public/links/missing/click", "198.51.100.4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connection_views_never_expose_tokens() {
    let app = TestApp::new().await;
    let tokens = EncryptedTokens {
        access_token: app.ctx.codec.encrypt("plain-access-token"),
        refresh_token: Some(app.ctx.codec.encrypt("plain-refresh-token")),
        expires_at: None,
    };
    let connection = app
        .ctx
        .connections
        .upsert_from_handshake("user-1", Platform::LinkedIn, "", tokens)
        .await
        .unwrap();

    let (status, body) = app.authed("GET", "/api/connections", "user-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], connection.id.as_str());

    let text = body.to_string();
    assert!(!text.contains("access_token"));
    assert!(!text.contains("refresh_token"));
    assert!(!text.contains(&connection.access_token));

    // Other users cannot see or disable it
    let (status, _) = app
        .authed("DELETE", &format!("/api/connections/{}", connection.id), "user-2", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authorize_issues_state_and_rejects_unknown_platform() {
    let app = TestApp::new().await;

    let (status, body) = app
        .authed("GET", "/api/connections/linkedin/authorize", "user-1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let state = body["state"].as_str().unwrap();
    assert!(body["url"].as_str().unwrap().contains(state));

    let (status, _) = app
        .authed("GET", "/api/connections/myspace/authorize", "user-1", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = TestApp::new().await;

    let request = Request::builder().uri("/health/ready").body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
