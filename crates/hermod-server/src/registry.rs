//! Server-wide endpoint table (spec §4.5, §6).
//!
//! Lookups never cross an `.await`, so this uses a plain
//! [`std::sync::RwLock`] rather than `tokio::sync::RwLock` — holding a
//! tokio lock guard across nothing but synchronous map access buys nothing
//! and the workspace denies `await_holding_lock` anyway.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hermod_proto::flags::AUTH_ENDPOINT;

use crate::error::RegistryError;
use crate::handler::Endpoint;

/// Maps endpoint IDs to their registered handlers.
///
/// Shared by every [`crate::connection::Connection`] the server accepts, so
/// `register_endpoint` calls become visible to subsequent dispatch as soon
/// as the write lock releases (spec §8's atomic-visibility property).
pub struct EndpointRegistry<H> {
    handlers: RwLock<HashMap<u16, Arc<dyn Endpoint<H>>>>,
}

impl<H> Default for EndpointRegistry<H> {
    fn default() -> Self {
        Self { handlers: RwLock::new(HashMap::new()) }
    }
}

impl<H> EndpointRegistry<H> {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `endpoint_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ReservedEndpoint`] for [`AUTH_ENDPOINT`], or
    /// [`RegistryError::AlreadyRegistered`] if the endpoint already has a
    /// handler.
    pub fn register(&self, endpoint_id: u16, handler: impl Endpoint<H> + 'static) -> Result<(), RegistryError> {
        if endpoint_id == AUTH_ENDPOINT {
            return Err(RegistryError::ReservedEndpoint(endpoint_id));
        }
        let mut handlers = self.handlers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if handlers.contains_key(&endpoint_id) {
            return Err(RegistryError::AlreadyRegistered(endpoint_id));
        }
        handlers.insert(endpoint_id, Arc::new(handler));
        Ok(())
    }

    /// Looks up the handler for `endpoint_id`, if registered.
    #[must_use]
    pub fn get(&self, endpoint_id: u16) -> Option<Arc<dyn Endpoint<H>>> {
        let handlers = self.handlers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.get(&endpoint_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::{HandlerContext, ResponseSink};

    async fn noop(_ctx: HandlerContext<()>, _sink: ResponseSink) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn registering_the_auth_endpoint_is_rejected() {
        let registry: EndpointRegistry<()> = EndpointRegistry::new();
        let err = registry.register(AUTH_ENDPOINT, noop).unwrap_err();
        assert_eq!(err, RegistryError::ReservedEndpoint(AUTH_ENDPOINT));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry: EndpointRegistry<()> = EndpointRegistry::new();
        registry.register(10, noop).unwrap();
        let err = registry.register(10, noop).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(10));
    }

    #[test]
    fn registered_handler_is_retrievable() {
        let registry: EndpointRegistry<()> = EndpointRegistry::new();
        assert!(registry.get(10).is_none());
        registry.register(10, noop).unwrap();
        assert!(registry.get(10).is_some());
    }
}
