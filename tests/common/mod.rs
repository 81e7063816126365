//! Shared utilities for integration tests.

use std::net::SocketAddr;

use apostille_site::config::SiteConfig;
use apostille_site::lifecycle::Shutdown;
use apostille_site::SiteServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A site server on an ephemeral port.
pub struct TestSite {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestSite {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

pub async fn start_site(config: SiteConfig) -> TestSite {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(SiteServer::new(config).run(listener, rx));
    TestSite {
        addr,
        shutdown,
        handle,
    }
}

/// Client that does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Pull the `'nonce-…'` token out of a CSP header value.
#[allow(dead_code)]
pub fn csp_nonce(csp: &str) -> &str {
    let start = csp.find("'nonce-").expect("CSP has no nonce") + "'nonce-".len();
    let end = start + csp[start..].find('\'').unwrap();
    &csp[start..end]
}
