//! Auth binding and the transport boundary shared by `hermod-server` and
//! `hermod-client`.
//!
//! - [`auth`]: JWT verification and hydrated-identity caching.
//! - [`transport`]: the [`transport::Transport`] trait neither the server
//!   nor the client couple their dispatch logic to a concrete transport
//!   through.
//! - [`error`]: the shared error taxonomy (spec §7).
//! - [`idalloc`]: the `u32` ID allocator behind session IDs and client IDs.
//! - [`cancel`]: cooperative cancellation for session handlers.

pub mod auth;
pub mod cancel;
pub mod error;
pub mod idalloc;
pub mod transport;

pub use auth::{AuthConfig, AuthProvider, Hydrator, SecretSource};
pub use cancel::{cancel_pair, CancelSource, CancelToken};
pub use error::{AuthError, CoreError};
pub use idalloc::IdAllocator;
pub use transport::Transport;
