//! Signet Core Library
//!
//! This crate provides client-side identity/session management:
//! - Delegated browser-based login (presenter collaborators with a
//!   single-fire completion contract)
//! - Secure session token persistence (platform keyring, access-group
//!   scoped)
//! - Account synchronization with server-side invalidation detection
//! - Typed lifecycle events (login / logout / account updates)
//!
//! # Features
//!
//! - `keyring-store` (default): platform keyring storage backend
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use signet_core::{HttpAccountFetcher, IdentityService, KeyringStore, ServiceConfig};
//!
//! # async fn run(presenter: &dyn signet_core::LoginPresenter) -> Result<(), signet_core::IdentityError> {
//! let config = ServiceConfig::new(
//!     "https://id.example.com/api".parse().unwrap(),
//!     "https://www.example.com".parse().unwrap(),
//! );
//! let service = IdentityService::new(
//!     config,
//!     Arc::new(KeyringStore::new()),
//!     Arc::new(HttpAccountFetcher::new()),
//! );
//!
//! let mut events = service.subscribe();
//! service.login(presenter).await?;
//! println!("logged in: {}", service.is_logged_in());
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.event_type());
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use account::{AccountFetcher, HttpAccountFetcher};
pub use auth::{AuthFlow, FlowOutcome, LoginPresenter, LoginRequest, TokenSink};
pub use config::{ConfigSource, DiscoveredConfig, ServiceConfig};
pub use error::{FetchError, IdentityError, StorageError};
pub use events::{EventBus, IdentityEvent};
pub use service::{
    DEFAULT_ACCESS_GROUP, IdentityService, RetryPolicy, current, reset_current, set_current,
};
pub use session::{Account, Session, SessionToken};
#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;
pub use store::{MemoryStore, SessionStore, storage_backend_info};
