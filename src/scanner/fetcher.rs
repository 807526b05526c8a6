//! Document fetcher
//!
//! One proxied GET per target, no retries. The outcome is classified as:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Status in [200, 400) | `Ok(Fetched)`, empty body included |
//! | Any other status | `FetchError::BadStatus`, body kept in the error |
//! | DNS, connect, proxy, timeout, body read | `FetchError::Transport` |

use crate::targets::Target;
use crate::transport::{Transport, CLIENT_MARKER};
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

/// A document received with an accepted status
#[derive(Debug, Clone)]
pub struct Fetched {
    /// HTTP status code
    pub status: u16,
    /// Raw body bytes, verbatim
    pub body: Vec<u8>,
}

/// Per-target fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    /// No usable response: DNS, connect, proxy, timeout or body read failure
    #[error("{reason}")]
    Transport { reason: String },

    /// A response arrived but its status is outside [200, 400)
    #[error("bad status: {status}")]
    BadStatus { status: StatusCode, body: Vec<u8> },
}

impl FetchError {
    fn transport(e: &reqwest::Error) -> Self {
        let reason = if e.is_timeout() {
            format!("request timeout: {}", e)
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        Self::Transport { reason }
    }

    /// Status code of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::BadStatus { status, .. } => Some(status.as_u16()),
        }
    }
}

/// Returns true for statuses in the inclusive-exclusive band [200, 400)
pub fn is_accepted(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Fetches one target's raw content through the run's transport
///
/// # Arguments
///
/// * `transport` - The shared proxied transport
/// * `target` - The target to request
///
/// # Returns
///
/// * `Ok(Fetched)` - Accepted status; the body may be empty
/// * `Err(FetchError)` - Transport failure or rejected status
pub async fn fetch_document(transport: &Transport, target: &Target) -> Result<Fetched, FetchError> {
    let connected = Arc::new(Notify::new());
    let client = transport
        .client_for_request(Arc::clone(&connected))
        .map_err(|e| FetchError::transport(&e))?;

    let send = client
        .get(target.as_str())
        .header(USER_AGENT, CLIENT_MARKER)
        .send();
    tokio::pin!(send);

    // Connecting draws only on the client's request timeout; the header
    // deadline starts once the proxy handshake is done
    let result = tokio::select! {
        result = &mut send => result,
        () = connected.notified() => {
            match tokio::time::timeout(transport.header_timeout(), &mut send).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(FetchError::Transport {
                        reason: format!(
                            "response header timeout after {}s",
                            transport.header_timeout().as_secs_f64()
                        ),
                    })
                }
            }
        }
    };
    let response = result.map_err(|e| FetchError::transport(&e))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::transport(&e))?
        .to_vec();

    if !is_accepted(status) {
        return Err(FetchError::BadStatus { status, body });
    }

    Ok(Fetched {
        status: status.as_u16(),
        body,
    })
}
