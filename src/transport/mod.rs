//! Proxied HTTP transport
//!
//! This module holds the connection settings shared by every document fetch
//! in a run. The connection behavior is fixed:
//! - Every request goes through the SOCKS endpoint with remote DNS (`socks5h`)
//! - No idle connections are kept, so two requests never share a circuit-bound socket
//! - Connecting, proxy handshake included, is bounded only by the 45s request deadline
//! - Once connected, response headers must arrive within 25s
//! - The whole request, body included, must finish within 45s of its start

mod connected;

use crate::ScanError;
use connected::ConnectedLayer;
use reqwest::{Client, ClientBuilder, Proxy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Notify;

/// Identifying client marker sent with every document request
pub const CLIENT_MARKER: &str = "Tor-Scraper/1.0 (Educational)";

/// Deadline for the response status line and headers, counted from connection
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(25);

/// Deadline for a whole request, connect and body included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Lifetime of an idle pooled connection
pub const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the reachability probe against the proxy itself
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A SOCKS proxy address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
}

impl ProxyEndpoint {
    /// Parses `host:port`; IPv6 hosts must be bracketed (`[::1]:9050`)
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{}'", raw))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(format!("missing host in '{}'", raw));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port '{}' in '{}'", port, raw))?;
        if port == 0 {
            return Err(format!("port must be non-zero in '{}'", raw));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Proxy URL for the HTTP client; hostnames resolve on the proxy side
    pub fn http_proxy_url(&self) -> String {
        format!("socks5h://{}", self)
    }

    /// Proxy URL in the form browsers accept on `--proxy-server`
    pub fn browser_proxy_url(&self) -> String {
        format!("socks5://{}", self)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Connection settings shared read-only across all fetches
///
/// Connections are never reused, so each fetch gets its own client wired
/// to a connection signal (see `client_for_request`). Cloning is cheap and
/// the handle can be used from concurrent workers.
#[derive(Debug, Clone)]
pub struct Transport {
    proxy: Option<Proxy>,
    header_timeout: Duration,
}

impl Transport {
    /// Transport without a proxy, for talking to a local server
    ///
    /// `provision` is the normal entry point.
    pub fn direct() -> Self {
        Self {
            proxy: None,
            header_timeout: RESPONSE_HEADER_TIMEOUT,
        }
    }

    fn proxied(proxy: Proxy) -> Self {
        Self {
            proxy: Some(proxy),
            header_timeout: RESPONSE_HEADER_TIMEOUT,
        }
    }

    /// Overrides the response-header deadline
    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    pub fn header_timeout(&self) -> Duration {
        self.header_timeout
    }

    /// Builds the client for one request
    ///
    /// `connected` is notified once the connection is established, proxy
    /// handshake included. The response-header deadline starts there.
    pub(crate) fn client_for_request(&self, connected: Arc<Notify>) -> reqwest::Result<Client> {
        let mut builder = client_builder().connector_layer(ConnectedLayer::new(connected));
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        builder.build()
    }
}

/// Client builder carrying the fixed connection behavior, without a proxy
fn client_builder() -> ClientBuilder {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(0)
        .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
        .gzip(true)
        .brotli(true)
}

/// Builds the run's transport bound to a SOCKS endpoint
///
/// # Arguments
///
/// * `endpoint` - Proxy address as `host:port`
///
/// # Returns
///
/// * `Ok(Transport)` - The proxy answered and the client is ready
/// * `Err(ScanError::ProxyConfigInvalid)` - Malformed address or client setup failure
/// * `Err(ScanError::ProxyUnreachable)` - Nothing accepted a TCP connection at the address
///
/// # Example
///
/// ```no_run
/// use onionshot::transport::provision;
///
/// # async fn example() -> Result<(), onionshot::ScanError> {
/// let transport = provision("127.0.0.1:9150").await?;
/// # Ok(())
/// # }
/// ```
pub async fn provision(endpoint: &str) -> Result<Transport, ScanError> {
    let invalid = |reason: String| ScanError::ProxyConfigInvalid {
        endpoint: endpoint.to_string(),
        reason,
    };

    let parsed = ProxyEndpoint::parse(endpoint).map_err(invalid)?;
    probe(&parsed).await?;

    let proxy = Proxy::all(parsed.http_proxy_url()).map_err(|e| invalid(e.to_string()))?;
    let transport = Transport::proxied(proxy);

    // Surface client setup problems now rather than on every target
    transport
        .client_for_request(Arc::new(Notify::new()))
        .map_err(|e| invalid(e.to_string()))?;

    tracing::debug!("Transport bound to socks proxy {}", parsed);
    Ok(transport)
}

/// Checks that something accepts TCP connections at the proxy address
async fn probe(endpoint: &ProxyEndpoint) -> Result<(), ScanError> {
    let unreachable = |source: std::io::Error| ScanError::ProxyUnreachable {
        endpoint: endpoint.to_string(),
        source,
    };

    match tokio::time::timeout(
        PROBE_TIMEOUT,
        TcpStream::connect((endpoint.host(), endpoint.port())),
    )
    .await
    {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(unreachable(e)),
        Err(_) => Err(unreachable(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connect probe timed out",
        ))),
    }
}
