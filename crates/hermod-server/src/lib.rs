//! Session-multiplexing RPC server for Hermod (spec §2, §4.5).
//!
//! [`Server`] owns the endpoint table and, optionally, an
//! [`hermod_core::AuthConfig`] shared by every connection it accepts. Call
//! [`Server::register_endpoint`] once per endpoint at startup, then hand
//! each accepted [`hermod_core::Transport`] to [`Server::accept`] to spawn
//! a [`Connection`] for it.
//!
//! The transport itself is out of scope for the core (spec §1); the
//! `transport` feature ships a WebSocket [`hermod_core::Transport`]
//! implementation as the one instance spec.md names, the way the teacher
//! keeps its QUIC transport behind the crate boundary rather than in core.

pub mod connection;
pub mod error;
pub mod handler;
pub mod registry;
pub mod session;

#[cfg(feature = "transport")]
pub mod transport_ws;

use std::sync::Arc;

use hermod_core::{AuthConfig, Transport};

pub use connection::{Connection, ConnectionConfig};
pub use error::{ConnectionError, HandlerError, RegistryError};
pub use handler::{Endpoint, HandlerContext, Inbound, ResponseSink};
pub use registry::EndpointRegistry;
pub use session::SessionTable;

/// The shared endpoint table and auth configuration for every connection a
/// process accepts.
///
/// `H` is the application's hydrated identity type — the value
/// [`hermod_core::auth::Hydrator`] derives from verified token claims. Use
/// `()` for servers that never configure auth.
pub struct Server<H> {
    endpoints: Arc<EndpointRegistry<H>>,
    auth_config: Option<Arc<AuthConfig<H>>>,
}

impl<H> Server<H>
where
    H: Clone + Send + Sync + 'static,
{
    /// Builds a server with no registered endpoints and no auth configured.
    #[must_use]
    pub fn new() -> Self {
        Self { endpoints: Arc::new(EndpointRegistry::new()), auth_config: None }
    }

    /// Builds a server that verifies tokens against `auth_config` for both
    /// query-string connection auth and `ClientSessionRequestWithAuth`.
    #[must_use]
    pub fn with_auth(auth_config: AuthConfig<H>) -> Self {
        Self { endpoints: Arc::new(EndpointRegistry::new()), auth_config: Some(Arc::new(auth_config)) }
    }

    /// Registers `handler` for `endpoint_id` (spec §6).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ReservedEndpoint`] for
    /// [`hermod_proto::AUTH_ENDPOINT`], or [`RegistryError::AlreadyRegistered`]
    /// if the endpoint already has a handler.
    pub fn register_endpoint(&self, endpoint_id: u16, handler: impl Endpoint<H> + 'static) -> Result<(), RegistryError> {
        self.endpoints.register(endpoint_id, handler)
    }

    /// Builds a [`Connection`] bound to an accepted `transport`, ready for
    /// [`Connection::run`]. Each accepted socket gets its own connection
    /// sharing this server's endpoint table and auth configuration.
    #[must_use]
    pub fn accept(&self, transport: Arc<dyn Transport>, config: ConnectionConfig) -> Arc<Connection<H>> {
        Arc::new(Connection::new(transport, Arc::clone(&self.endpoints), self.auth_config.clone(), config))
    }
}

impl<H> Default for Server<H>
where
    H: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
