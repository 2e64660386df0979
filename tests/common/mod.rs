use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How the synthetic health endpoint answers
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Behaviour {
    Healthy,
    /// 503 for the first N requests, then 200
    FailFirst(usize),
    AlwaysStatus(u16),
    Slow(Duration),
    Body(&'static str),
    /// 401 unless the Authorization header matches exactly
    RequireAuth(&'static str),
}

#[derive(Clone)]
struct TargetState {
    behaviour: Behaviour,
    hits: Arc<AtomicUsize>,
}

/// Health server bound to an ephemeral loopback port; stopped on drop
#[allow(dead_code)]
pub struct TestTarget {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestTarget {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestTarget {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[allow(dead_code)]
pub async fn spawn_target(behaviour: Behaviour) -> TestTarget {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test target");
    let addr = listener.local_addr().expect("Failed to read local address");

    let hits = Arc::new(AtomicUsize::new(0));
    let state = TargetState {
        behaviour,
        hits: hits.clone(),
    };

    let app = Router::new().route("/health", get(health)).with_state(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestTarget { addr, hits, handle }
}

async fn health(State(state): State<TargetState>, headers: HeaderMap) -> (StatusCode, String) {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;

    match &state.behaviour {
        Behaviour::Healthy => (StatusCode::OK, "ok".to_string()),
        Behaviour::FailFirst(n) if hit <= *n => (StatusCode::SERVICE_UNAVAILABLE, "starting".to_string()),
        Behaviour::FailFirst(_) => (StatusCode::OK, "ok".to_string()),
        Behaviour::AlwaysStatus(code) => (
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            String::new(),
        ),
        Behaviour::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            (StatusCode::OK, "ok".to_string())
        }
        Behaviour::Body(text) => (StatusCode::OK, text.to_string()),
        Behaviour::RequireAuth(expected) => {
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == *expected)
                .unwrap_or(false);
            if authorized {
                (StatusCode::OK, "ok".to_string())
            } else {
                (StatusCode::UNAUTHORIZED, String::new())
            }
        }
    }
}

/// Loopback address with nothing listening on it
#[allow(dead_code)]
pub fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe port");
    let port = listener.local_addr().expect("Failed to read local address").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
