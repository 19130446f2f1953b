use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::{
    config::AuthConfig,
    metrics::{self, MetricsStore, EXPORTER_VERSION},
};

type HmacSha256 = Hmac<Sha256>;

const CREDENTIALS_KEY: &[u8] = b"iranleague_exporter basic auth";

/// Configured credentials, kept as HMAC tags so every comparison is over
/// fixed-length values and runs through `verify_slice`.
struct Credentials {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Credentials {
    fn new(auth: &AuthConfig) -> Self {
        Self {
            username: tag(&auth.username),
            password: tag(&auth.password),
        }
    }

    /// Both fields are always checked so timing does not reveal which one
    /// was wrong.
    fn verify(&self, username: &str, password: &str) -> bool {
        let username_ok = verify_tag(username, &self.username);
        let password_ok = verify_tag(password, &self.password);
        username_ok & password_ok
    }
}

fn mac(value: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(CREDENTIALS_KEY).ok()?;
    mac.update(value.as_bytes());
    Some(mac)
}

fn tag(value: &str) -> Vec<u8> {
    mac(value)
        .map(|mac| mac.finalize().into_bytes().to_vec())
        .unwrap_or_default()
}

/// An empty `expected` never verifies, so a missing tag fails closed.
fn verify_tag(value: &str, expected: &[u8]) -> bool {
    mac(value).is_some_and(|mac| mac.verify_slice(expected).is_ok())
}

/// Extracts `(username, password)` from an `Authorization: Basic ...` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[derive(Clone)]
pub struct AppState {
    pub metrics: MetricsStore,
    credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(metrics: MetricsStore, auth: &AuthConfig) -> Self {
        Self {
            metrics,
            credentials: Arc::new(Credentials::new(auth)),
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, "Basic")],
        Json(json!({"detail": "Incorrect username or password"})),
    )
        .into_response()
}

pub async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = basic_credentials(&headers)
        .map(|(username, password)| state.credentials.verify(&username, &password))
        .unwrap_or(false);

    if !authorized {
        warn!("Rejected metrics request with invalid credentials");
        return unauthorized();
    }

    ([(CONTENT_TYPE, metrics::CONTENT_TYPE)], state.metrics.render()).into_response()
}

/// GET /health: healthy until a scrape fails, and again once one succeeds.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let last = state.metrics.last_scrape();
    let healthy = last.success || last.time.is_none();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "last_update": last.time.map(|t| t.to_rfc3339()),
            "last_update_success": last.success,
            "last_error": last.error,
            "version": EXPORTER_VERSION,
        })),
    )
        .into_response()
}

/// GET /ready: ready only while the latest scrape is a successful one.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let last = state.metrics.last_scrape();
    let status = if last.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": last.success,
            "last_update": last.time.map(|t| t.to_rfc3339()),
        })),
    )
        .into_response()
}

/// Routes above the trace layer get request logging; `/health` is added
/// after it so health checks stay out of the INFO log.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/ready", get(ready_handler))
        .route_layer(
            TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on http://{}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::ExporterInfo,
        types::{Match, ScrapeResult},
    };
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let auth = AuthConfig {
            username: "prom".to_string(),
            password: "secret".to_string(),
        };
        AppState::new(MetricsStore::new(ExporterInfo::new("EN", 30)), &auth)
    }

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    async fn send(state: &AppState, uri: &str, authorization: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        router(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_credentials_verify() {
        let creds = Credentials::new(&AuthConfig {
            username: "prom".to_string(),
            password: "secret".to_string(),
        });
        assert!(creds.verify("prom", "secret"));
        assert!(!creds.verify("prom", "wrong"));
        assert!(!creds.verify("other", "secret"));
        assert!(!creds.verify("", ""));
        assert!(!creds.verify("prom", "secret "));
    }

    #[test]
    fn test_tags_are_fixed_length() {
        assert_eq!(tag("").len(), 32);
        assert_eq!(tag("a much longer password than the digest itself").len(), 32);
        assert!(verify_tag("secret", &tag("secret")));
        assert!(!verify_tag("secret", &tag("Secret")));
        assert!(!verify_tag("secret", &[]));
    }

    #[test]
    fn test_basic_credentials_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(basic_credentials(&headers), None);

        headers.insert(AUTHORIZATION, basic("prom:se:cret").parse().unwrap());
        assert_eq!(
            basic_credentials(&headers),
            Some(("prom".to_string(), "se:cret".to_string()))
        );

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(basic_credentials(&headers), None);

        headers.insert(AUTHORIZATION, "Basic !!!".parse().unwrap());
        assert_eq!(basic_credentials(&headers), None);

        headers.insert(AUTHORIZATION, basic("no-colon").parse().unwrap());
        assert_eq!(basic_credentials(&headers), None);
    }

    #[tokio::test]
    async fn test_metrics_with_valid_credentials() {
        let state = state();
        state.metrics.replace(
            &[Match {
                teams: "Team-A vs Team-B".to_string(),
                kickoff: 1_704_024_000,
            }],
            Duration::ZERO,
        );

        let response = send(&state, "/metrics", Some(&basic("prom:secret"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("ir_league_matches{teams=\"Team-A vs Team-B\"} 1704024000"));
    }

    #[tokio::test]
    async fn test_metrics_rejects_bad_credentials() {
        let state = state();
        for authorization in [
            None,
            Some(basic("prom:wrong")),
            Some(basic("other:secret")),
            Some("Basic not-base64".to_string()),
        ] {
            let response = send(&state, "/metrics", authorization.as_deref()).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic");
            assert_eq!(
                json_body(response).await,
                json!({"detail": "Incorrect username or password"})
            );
        }
    }

    #[tokio::test]
    async fn test_health_before_first_scrape() {
        let response = send(&state(), "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["last_update"], Value::Null);
        assert_eq!(body["last_update_success"], false);
        assert_eq!(body["version"], EXPORTER_VERSION);
    }

    #[tokio::test]
    async fn test_health_version_matches_info_metric() {
        let state = state();
        let version = json_body(send(&state, "/health", None).await).await["version"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(version.starts_with('v'));

        let response = send(&state, "/metrics", Some(&basic("prom:secret"))).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(&format!("version=\"{}\"", version)));
    }

    #[tokio::test]
    async fn test_health_after_failure() {
        let state = state();
        state
            .metrics
            .record(&ScrapeResult::failed("HTTP error: 404"), Duration::ZERO);

        let response = send(&state, "/health", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = json_body(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["last_error"], "HTTP error: 404");
        assert!(body["last_update"].is_string());
    }

    #[tokio::test]
    async fn test_ready_follows_last_scrape() {
        let state = state();
        let response = send(&state, "/ready", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["ready"], false);

        state
            .metrics
            .record(&ScrapeResult::succeeded(Vec::new()), Duration::ZERO);
        let response = send(&state, "/ready", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ready"], true);

        state
            .metrics
            .record(&ScrapeResult::failed("timeout"), Duration::ZERO);
        let response = send(&state, "/ready", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = send(&state(), "/favicon.ico", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
