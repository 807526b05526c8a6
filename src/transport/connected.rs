//! Connection-established signal for the response-header deadline
//!
//! reqwest resolves `send()` only once response headers arrive, and its own
//! timers start when the request starts connecting. The header deadline must
//! only start once the proxy handshake has finished, so the connector is
//! wrapped in a layer that fires a `Notify` when a connection is handed back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tower::{Layer, Service};

/// Connector layer that signals every established connection
#[derive(Debug, Clone)]
pub(crate) struct ConnectedLayer {
    connected: Arc<Notify>,
}

impl ConnectedLayer {
    pub(crate) fn new(connected: Arc<Notify>) -> Self {
        Self { connected }
    }
}

impl<S> Layer<S> for ConnectedLayer {
    type Service = NotifyOnConnect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NotifyOnConnect {
            inner,
            connected: Arc::clone(&self.connected),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NotifyOnConnect<S> {
    inner: S,
    connected: Arc<Notify>,
}

impl<S, R> Service<R> for NotifyOnConnect<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        let connecting = self.inner.call(request);
        let connected = Arc::clone(&self.connected);

        Box::pin(async move {
            let conn = connecting.await?;
            // Stores a permit, so a waiter registered later still wakes
            connected.notify_one();
            Ok(conn)
        })
    }
}
