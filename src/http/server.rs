//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Serve static assets from the public directory
//! - Wire up middleware (security headers, limits, timeouts, request ID, tracing)
//! - Bind to a plain or TLS listener and stop gracefully on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::SiteConfig;
use crate::http::{consent, pages, reports, request};
use crate::lifecycle::Shutdown;
use crate::security::{security_headers_middleware, SecurityPolicy};

const TLS_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub policy: Arc<SecurityPolicy>,
    pub tls_enabled: bool,
}

/// HTTP server for the marketing site.
pub struct SiteServer {
    router: Router,
    config: Arc<SiteConfig>,
}

impl SiteServer {
    /// Create a new server with the given configuration.
    pub fn new(config: SiteConfig) -> Self {
        let config = Arc::new(config);
        let policy = Arc::new(SecurityPolicy::from_config(&config.security, &config.site));

        let state = AppState {
            config: config.clone(),
            policy,
            tls_enabled: config.listener.tls.is_some(),
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outside-in: request id, trace, id propagation, security
    /// headers, timeout, body limit. Static files get the same headers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let policy = state.policy.clone();

        Router::new()
            .route("/", get(pages::home_page))
            .route("/health", get(pages::health))
            .route("/consent", post(consent::submit_consent))
            .route("/csp-report", post(reports::receive_csp_report))
            .fallback_service(ServeDir::new(&config.site.public_dir))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(middleware::from_fn_with_state(
                policy,
                security_headers_middleware,
            ))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request::make_request_span))
            .layer(request::set_request_id_layer())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            site = %self.config.site.name,
            csp_enforced = self.config.security.production,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::notified(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            site = %self.config.site.name,
            csp_enforced = self.config.security.production,
            "HTTPS server starting"
        );

        let handle = Handle::new();
        let watcher = handle.clone();
        tokio::spawn(async move {
            Shutdown::notified(shutdown).await;
            watcher.graceful_shutdown(Some(TLS_DRAIN_GRACE));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn server(configure: impl FnOnce(&mut SiteConfig)) -> SiteServer {
        let mut config = SiteConfig::default();
        configure(&mut config);
        SiteServer::new(config)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_home_nonce_matches_header() {
        let response = server(|_| {}).router().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let csp = response.headers()[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert!(response.headers().contains_key("x-request-id"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        let start = html.find("nonce=\"").unwrap() + 7;
        let nonce = &html[start..start + html[start..].find('"').unwrap()];
        assert!(csp.contains(&format!("'nonce-{nonce}'")));
    }

    #[tokio::test]
    async fn test_report_only_outside_production() {
        let response = server(|c| c.security.production = false)
            .router()
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert!(response
            .headers()
            .contains_key(header::CONTENT_SECURITY_POLICY_REPORT_ONLY));
        assert!(!response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[tokio::test]
    async fn test_static_miss_still_carries_headers() {
        let response = server(|c| c.site.public_dir = "does-not-exist".into())
            .router()
            .oneshot(get_request("/missing.css"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn test_consent_form_sets_cookie_and_redirects() {
        let request = Request::builder()
            .method("POST")
            .uri("/consent")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("action=deny_all"))
            .unwrap();
        let response = server(|_| {}).router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("cookie_consent=%7B%22analytics%22%3Afalse"));
        assert!(cookie.contains("Max-Age=15552000"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn test_csp_report_accepted_and_malformed_rejected() {
        let post = |body: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/csp-report")
                .header(header::CONTENT_TYPE, "application/csp-report")
                .body(Body::from(body))
                .unwrap()
        };
        let router = server(|_| {}).router();

        let ok = router
            .clone()
            .oneshot(post(r#"{"csp-report":{"violated-directive":"img-src"}}"#))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);

        let bad = router.oneshot(post("{")).await.unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
