//! Client-side route multiplexer for the Hermod session protocol.
//!
//! - [`router`]: the route table and dispatch loop over one [`Transport`].
//! - [`route`]: the per-route state machine the router drives.
//! - [`readwriter`]: [`ServiceReadWriter`], the application-facing handle.
//! - [`error`]: the client error taxonomy (spec §7).
//!
//! [`Transport`]: hermod_core::Transport

pub mod error;
pub mod readwriter;
pub mod route;
pub mod router;
#[cfg(feature = "transport")]
pub mod transport_ws;

use std::sync::Arc;

use hermod_core::Transport;

pub use error::ClientError;
pub use readwriter::ServiceReadWriter;
pub use router::{Router, RouterConfig};

/// A connection to one Hermod server: owns the route table and the
/// background dispatch loop (spec §1, §4.5).
///
/// Mirrors `hermod_server::Server` on the client side: a thin facade over
/// the router that hides route-table bookkeeping from callers opening
/// sessions.
pub struct Client {
    router: Arc<Router>,
    config: RouterConfig,
}

impl Client {
    /// Builds a client over `transport` using default timeouts. Call
    /// [`Client::run`] to start the dispatch loop before opening routes.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, RouterConfig::default())
    }

    /// Builds a client with an explicit [`RouterConfig`].
    #[must_use]
    pub fn with_config(transport: Arc<dyn Transport>, config: RouterConfig) -> Self {
        let router = Router::new(transport, config.clone());
        Self { router, config }
    }

    /// Runs the dispatch loop until the transport closes or fails. Must be
    /// spawned (typically via `tokio::spawn(Arc::clone(&client).run())`)
    /// alongside any open routes.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the transport read fails.
    pub async fn run(self: Arc<Self>) -> Result<(), ClientError> {
        Arc::clone(&self.router).run().await
    }

    /// Opens a new session against `endpoint_id`. The session-open request
    /// is sent lazily on first use of the returned handle (spec §4.5).
    ///
    /// `token` is a per-session bearer token, verified independently of any
    /// connection-level authentication (spec §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::IdsExhausted`] if the client-ID space is full.
    pub async fn open_route(
        &self,
        endpoint_id: u16,
        token: Option<String>,
    ) -> Result<ServiceReadWriter, ClientError> {
        let opened = self.router.open_route(endpoint_id, token).await?;
        Ok(ServiceReadWriter::new(
            Arc::clone(&self.router),
            opened.handle,
            opened.ready,
            opened.data,
            opened.errors,
            self.config.open_timeout,
        ))
    }

    /// Verifies `token` against the connection itself, independent of any
    /// session (spec §4.4, scenario 5).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if the server rejects the token.
    pub async fn authenticate(&self, token: String) -> Result<(), ClientError> {
        self.router.authenticate(token).await
    }
}
