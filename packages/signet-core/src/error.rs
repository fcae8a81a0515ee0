//! Error domain for the identity service.

use thiserror::Error;

/// Errors surfaced by a [`SessionStore`](crate::store::SessionStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The secure storage backend could not be reached on this
    /// platform/build.
    #[error("secure credential store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation.
    #[error("credential store error: {0}")]
    Backend(String),
}

/// Errors surfaced by an [`AccountFetcher`](crate::account::AccountFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The response body could not be understood.
    #[error("invalid account data: {0}")]
    InvalidData(String),

    /// The server rejected the session token. Distinct from transport
    /// failures: the credential itself is no longer valid.
    #[error("session token rejected by the identity service")]
    InvalidToken,

    /// Network-level failure; the token may still be valid.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Top-level error domain of the identity service.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Data received from the identity service was malformed.
    #[error("received invalid data from the identity service")]
    InvalidData,

    /// The user dismissed the login surface before a token arrived.
    #[error("authentication was canceled")]
    AuthenticationCanceled,

    /// The login surface could not be presented.
    #[error("authentication could not be started")]
    AuthenticationStartFailed,

    /// A login flow is already running on this service instance.
    #[error("a login is already in progress")]
    AlreadyInProgress,

    /// The operation requires an active session.
    #[error("no user is logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
