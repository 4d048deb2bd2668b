//! reqwest-backed fetcher

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{FetchError, FetchResponse, Fetcher};

/// Default per-request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings applied to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Total time allowed for connecting, sending and reading the body
    pub timeout: Duration,
    /// Value of the User-Agent header
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("jsonstash/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetcher that issues GET requests with reqwest
///
/// The timeout and user agent are set on each request rather than baked into
/// the client, so a shared client can be reused with different settings.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Creates a fetcher with default configuration
    pub fn new() -> Self {
        Self::with_config(&FetchConfig::default())
    }

    /// Creates a fetcher from explicit settings
    pub fn with_config(config: &FetchConfig) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    /// Creates a fetcher around an existing client, with default settings
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            config: FetchConfig::default(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        debug!(url, "sending request");
        let response = self
            .client
            .get(url)
            .timeout(self.config.timeout)
            .header(USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        // Raw bytes, so the cache holds exactly what the server sent
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        debug!(url, status, bytes = body.len(), "response received");

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP/1.1 response on a local port
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/data.json", addr)
    }

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("jsonstash/"));
    }

    #[tokio::test]
    async fn test_fetch_returns_status_and_body() {
        let url = serve_once("200 OK", "{\"a\":1}").await;

        let response = HttpFetcher::new().fetch(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"{\"a\":1}");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_fetch_keeps_body_bytes_as_sent() {
        let url = serve_once("200 OK", "\u{feff}{\"bom\":true}").await;

        let response = HttpFetcher::new().fetch(&url).await.unwrap();

        assert_eq!(&response.body[..3], &[0xef, 0xbb, 0xbf]);
        assert_eq!(response.body, "\u{feff}{\"bom\":true}".as_bytes());
    }

    #[tokio::test]
    async fn test_configured_user_agent_is_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();
            let agent = request
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("user-agent")
                        .then(|| value.trim().to_string())
                })
                .unwrap_or_default();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                agent.len(),
                agent
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        let fetcher = HttpFetcher::with_config(&FetchConfig {
            user_agent: "build-pipeline/2.0".to_string(),
            ..FetchConfig::default()
        });

        let response = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap();

        assert_eq!(response.body, b"build-pipeline/2.0");
    }

    #[tokio::test]
    async fn test_with_client_uses_default_settings() {
        let url = serve_once("200 OK", "[]").await;
        let fetcher = HttpFetcher::with_client(Client::new());

        assert_eq!(fetcher.config(), &FetchConfig::default());
        let response = fetcher.fetch(&url).await.unwrap();
        assert_eq!(response.body, b"[]");
    }

    #[tokio::test]
    async fn test_fetch_reports_non_success_status_as_ok() {
        let url = serve_once("404 Not Found", "missing").await;

        let response = HttpFetcher::new().fetch(&url).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpFetcher::new()
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_slow_server_is_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let fetcher = HttpFetcher::with_config(&FetchConfig {
            timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        });

        let err = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap_err();

        assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
    }
}
