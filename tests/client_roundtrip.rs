use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use sandgate::server::{AppState, serve};
use sandgate::{BridgeClient, BridgeToken, ClientError, TokenFileGuard};
use sandgate_commons::SandboxRoot;
use sandgate_config::GatewayConfig;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningGateway {
    dir: TempDir,
    base_url: String,
    token_file: TokenFileGuard,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl RunningGateway {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let token = BridgeToken::generate().unwrap();
        let config = GatewayConfig::default();
        let state = AppState::new(&config, SandboxRoot::new(dir.path()).unwrap(), token.clone())
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let token_file = TokenFileGuard::create(dir.path().join(".bridge-token"), &token).unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, state, async move {
            stopped.await.ok();
        }));

        Self {
            dir,
            base_url,
            token_file,
            stop: Some(stop),
            task: Some(task),
        }
    }

    fn client(&self) -> BridgeClient {
        BridgeClient::from_token_file(&self.base_url, self.token_file.path()).unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        if let Some(task) = self.task.take() {
            task.await.unwrap().unwrap();
        }
    }
}

#[tokio::test]
async fn client_drives_every_route() {
    let gateway = RunningGateway::start().await;
    let client = gateway.client();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");

    client.mkdir("src").await.unwrap();
    client.write("src/main.txt", "fn main() {}").await.unwrap();
    assert_eq!(client.read("src/main.txt").await.unwrap(), "fn main() {}");

    client.move_item("src/main.txt", "bin/main.txt").await.unwrap();
    assert!(gateway.dir.path().join("bin/main.txt").is_file());

    let tree = client.tree(None).await.unwrap();
    let bin = tree.child("bin").unwrap();
    assert!(bin.child("main.txt").is_some());
    let subtree = client.tree(Some("bin")).await.unwrap();
    assert_eq!(subtree.name, "bin");

    #[cfg(unix)]
    {
        let outcome = client.exec("echo hi").await.unwrap();
        assert_eq!(outcome.output, "hi\n");
        assert!(outcome.succeeded());
    }

    gateway.shutdown().await;
}

#[tokio::test]
async fn api_errors_surface_with_status_and_message() {
    let gateway = RunningGateway::start().await;
    let client = gateway.client();

    match client.read("../outside.txt").await {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(message, "Path outside sandbox");
        }
        other => panic!("expected a 403, got {other:?}"),
    }

    match client.exec("wget http://example.com").await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, StatusCode::FORBIDDEN),
        other => panic!("expected a 403, got {other:?}"),
    }

    gateway.shutdown().await;
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let gateway = RunningGateway::start().await;
    let client =
        BridgeClient::new(&gateway.base_url, BridgeToken::from_secret("not-the-token")).unwrap();

    match client.tree(None).await {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("expected a 401, got {other:?}"),
    }
    assert!(client.health().await.is_ok());

    gateway.shutdown().await;
}

#[test]
fn missing_token_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = BridgeClient::from_token_file("http://127.0.0.1:1", &dir.path().join(".bridge-token"))
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingToken { .. }));
}
