//! REST API module using Axum
//!
//! Serves the console front-end's control endpoints and, for every other
//! path, the front-end bundle itself from `server.static_dir`.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use std::path::Path;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use envelope::ApiErrorResponse;

/// Unmatched path with no front-end bundle configured.
async fn not_found() -> axum::response::Response {
    ApiErrorResponse::not_found("No such endpoint")
}

/// Build the CORS layer from `server.cors_origins`.
///
/// `"*"` anywhere in the list allows every origin; otherwise only the
/// listed origins are allowed. Unparsable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.trim().parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: ApiState, server: &ServerConfig) -> Router {
    let router = routes::api_routes(state);

    let static_dir = Path::new(&server.static_dir);
    let router = if !server.static_dir.is_empty() && static_dir.is_dir() {
        info!(dir = %static_dir.display(), "Serving front-end bundle");
        let index = static_dir.join("index.html");
        router.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)))
    } else {
        if !server.static_dir.is_empty() {
            warn!(dir = %server.static_dir, "Front-end bundle not found, static serving disabled");
        }
        router.fallback(not_found)
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&server.cors_origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::background::ConnectivitySupervisor;
    use crate::device::{ConnectivityProbe, RecoveryTrigger};
    use crate::exec::{Delivery, ExecError};
    use crate::speed::{RemoteCommandSender, SpeedDispatcher};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Stub;

    #[async_trait]
    impl ConnectivityProbe for Stub {
        async fn fetch_listing(&self) -> Result<String, ExecError> {
            Ok("List of devices attached\n".to_string())
        }
    }

    #[async_trait]
    impl RecoveryTrigger for Stub {
        async fn recover(&self) -> Result<Delivery, ExecError> {
            Ok(Delivery::Confirmed)
        }
    }

    #[async_trait]
    impl RemoteCommandSender for Stub {
        async fn send_speed(&self, _kph: f64) -> Result<Delivery, ExecError> {
            Ok(Delivery::Confirmed)
        }
    }

    fn test_state() -> ApiState {
        let stub = Arc::new(Stub);
        ApiState::new(
            ConnectivitySupervisor::new(stub.clone(), stub.clone(), Duration::from_secs(60)),
            SpeedDispatcher::new(stub),
        )
    }

    fn server_config(static_dir: &str) -> ServerConfig {
        ServerConfig {
            static_dir: static_dir.to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_path_without_bundle_is_404() {
        let app = create_app(test_state(), &server_config(""));
        let resp = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bundle_served_with_index_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>remote</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let app = create_app(test_state(), &server_config(dir.path().to_str().unwrap()));

        let resp = app
            .clone()
            .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get("/some/spa/route").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>remote</html>");
    }

    #[tokio::test]
    async fn test_wildcard_cors_allows_any_origin() {
        let app = create_app(test_state(), &server_config(""));
        let resp = app
            .oneshot(
                Request::get("/status")
                    .header("origin", "http://tablet.local:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
