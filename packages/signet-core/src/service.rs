//! Session lifecycle coordination.
//!
//! [`IdentityService`] owns the login state machine and composes the three
//! collaborators: the session store, the login flow, and the account
//! fetcher. Every state transition runs under a single lock; asynchronous
//! completions (login flow, account fetch) re-enter through that lock and
//! are discarded when the state moved on underneath them.

use crate::account::AccountFetcher;
use crate::auth::{AuthFlow, FlowOutcome, LoginPresenter, LoginRequest};
use crate::config::ServiceConfig;
use crate::error::{FetchError, IdentityError};
use crate::events::{EventBus, IdentityEvent};
use crate::session::{Account, Session, SessionToken};
use crate::store::SessionStore;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};
use tokio::sync::broadcast;
use url::Url;

/// Access group used when the configuration does not name one.
pub const DEFAULT_ACCESS_GROUP: &str = "signet";

/// Behavior when an account fetch reports an invalid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Log out on the first `InvalidToken` result.
    InvalidateImmediately,
    /// Re-run the fetch up to `attempts` more times and only log out if
    /// every attempt still reports `InvalidToken`. Any other result ends
    /// the retry run without invalidating.
    RetryThenInvalidate { attempts: u32 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::InvalidateImmediately
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

struct State {
    phase: Phase,
    session: Option<Session>,
    account: Option<Account>,
    /// Bumped on every logout. Account fetches carry the generation they
    /// started under and are discarded on mismatch.
    generation: u64,
    /// Last email address seen on an account, kept across logout to
    /// pre-fill the next login.
    last_email: Option<String>,
}

struct Inner {
    service_url: Url,
    website_url: Url,
    access_group: Option<String>,
    retry: RetryPolicy,
    store: Arc<dyn SessionStore>,
    fetcher: Arc<dyn AccountFetcher>,
    events: EventBus,
    state: Mutex<State>,
}

/// The public-facing session owner.
///
/// Cheap to clone; clones share the same state and event bus.
#[derive(Clone)]
pub struct IdentityService {
    inner: Arc<Inner>,
}

impl IdentityService {
    /// Create a service against `config`, hydrating the session from
    /// `store`.
    ///
    /// If a persisted token is found the service starts logged in and
    /// schedules a background account refresh (when called inside a tokio
    /// runtime); construction never blocks on the network.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn SessionStore>,
        fetcher: Arc<dyn AccountFetcher>,
    ) -> Self {
        let ServiceConfig {
            service_url,
            website_url,
            access_group,
            retry,
        } = config;

        let group = access_group.as_deref().unwrap_or(DEFAULT_ACCESS_GROUP);
        let session = match store.get(group) {
            Ok(Some(token)) => {
                tracing::info!("restored session from credential store");
                Some(Session::new(token))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("could not read credential store: {}", e);
                None
            }
        };

        let phase = if session.is_some() {
            Phase::LoggedIn
        } else {
            Phase::LoggedOut
        };

        let service = Self {
            inner: Arc::new(Inner {
                service_url,
                website_url,
                access_group,
                retry,
                store,
                fetcher,
                events: EventBus::default(),
                state: Mutex::new(State {
                    phase,
                    session,
                    account: None,
                    generation: 0,
                    last_email: None,
                }),
            }),
        };

        if phase == Phase::LoggedIn {
            if tokio::runtime::Handle::try_current().is_ok() {
                service.spawn_account_refresh();
            } else {
                tracing::debug!(
                    "no async runtime at construction; account refresh deferred to the first refresh_account call"
                );
            }
        }

        service
    }

    /// Run the delegated login flow through `presenter`.
    ///
    /// Fails with [`IdentityError::AlreadyInProgress`] while another login
    /// runs. Returns `Ok` immediately when already logged in; a fresh
    /// login requires an explicit [`logout`](Self::logout) first.
    pub async fn login(&self, presenter: &dyn LoginPresenter) -> Result<(), IdentityError> {
        self.login_with_email(presenter, None).await
    }

    /// [`login`](Self::login) with an explicit email address pre-filled on
    /// the login page. Without one, the last known account email is used.
    pub async fn login_with_email(
        &self,
        presenter: &dyn LoginPresenter,
        email_address: Option<String>,
    ) -> Result<(), IdentityError> {
        let request = {
            let mut state = self.lock_state();
            match state.phase {
                Phase::LoggingIn => return Err(IdentityError::AlreadyInProgress),
                Phase::LoggedIn => {
                    tracing::debug!("login requested while already logged in");
                    return Ok(());
                }
                Phase::LoggedOut => {}
            }
            state.phase = Phase::LoggingIn;
            LoginRequest {
                service_url: self.inner.service_url.clone(),
                website_url: self.inner.website_url.clone(),
                email_address: email_address.or_else(|| state.last_email.clone()),
            }
        };

        let outcome = AuthFlow::run(presenter, request).await;

        let mut state = self.lock_state();
        match outcome {
            Ok(FlowOutcome::Token(token)) => {
                if let Err(e) = self.inner.store.put(self.access_group(), &token) {
                    // Never enter the logged-in state with a token that is
                    // not durably persisted.
                    state.phase = Phase::LoggedOut;
                    tracing::error!("failed to persist session token: {}", e);
                    return Err(e.into());
                }
                state.phase = Phase::LoggedIn;
                state.session = Some(Session::new(token));
                state.account = None;
                drop(state);

                self.inner.events.publish(IdentityEvent::UserDidLogin);
                tracing::info!("user logged in");
                self.spawn_account_refresh();
                Ok(())
            }
            Ok(FlowOutcome::Dismissed) => {
                state.phase = Phase::LoggedOut;
                tracing::info!("login canceled");
                Err(IdentityError::AuthenticationCanceled)
            }
            Err(e) => {
                state.phase = Phase::LoggedOut;
                Err(e)
            }
        }
    }

    /// End the current session.
    ///
    /// Clears the persisted token and cached account, then emits
    /// [`IdentityEvent::UserDidLogout`]. Idempotent. During a running
    /// login flow this is a no-op: nothing is persisted yet, and dismissal
    /// authority stays with the login surface.
    pub fn logout(&self) {
        let mut state = self.lock_state();
        match state.phase {
            Phase::LoggedOut | Phase::LoggingIn => return,
            Phase::LoggedIn => {}
        }

        if let Err(e) = self.inner.store.clear(self.access_group()) {
            tracing::warn!("failed to clear credential store: {}", e);
        }
        state.phase = Phase::LoggedOut;
        state.session = None;
        state.account = None;
        state.generation += 1;
        drop(state);

        self.inner.events.publish(IdentityEvent::UserDidLogout);
        tracing::info!("user logged out");
    }

    /// Fetch the account for the active session and cache it.
    ///
    /// Transient failures (`Transport`, `InvalidData`) are returned
    /// without touching session state. An `InvalidToken` result logs the
    /// user out per the configured [`RetryPolicy`] and is then surfaced.
    /// Returns [`IdentityError::NotLoggedIn`] when there is no active
    /// session, or when the session ended while the fetch was in flight.
    pub async fn refresh_account(&self) -> Result<Account, IdentityError> {
        let (token, generation) = {
            let state = self.lock_state();
            match (&state.session, state.phase) {
                (Some(session), Phase::LoggedIn) => (session.token.clone(), state.generation),
                _ => return Err(IdentityError::NotLoggedIn),
            }
        };

        match self.fetch_with_retry(&token).await {
            Ok(account) => {
                if self.apply_account(generation, account.clone()) {
                    Ok(account)
                } else {
                    Err(IdentityError::NotLoggedIn)
                }
            }
            Err(FetchError::InvalidToken) => {
                self.invalidate(generation);
                Err(FetchError::InvalidToken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_with_retry(&self, token: &SessionToken) -> Result<Account, FetchError> {
        let mut result = self
            .inner
            .fetcher
            .fetch(&self.inner.service_url, token)
            .await;

        if let RetryPolicy::RetryThenInvalidate { attempts } = self.inner.retry {
            let mut remaining = attempts;
            while remaining > 0 && matches!(result, Err(FetchError::InvalidToken)) {
                tracing::debug!("re-checking rejected token ({} attempts left)", remaining);
                result = self
                    .inner
                    .fetcher
                    .fetch(&self.inner.service_url, token)
                    .await;
                remaining -= 1;
            }
        }

        result
    }

    /// Apply a fetched account if the session it was fetched for is still
    /// active. Returns whether it was applied.
    fn apply_account(&self, generation: u64, account: Account) -> bool {
        let mut state = self.lock_state();
        if state.generation != generation || state.phase != Phase::LoggedIn {
            tracing::debug!("discarding stale account fetch result");
            return false;
        }

        if let Some(session) = state.session.as_mut() {
            if account.user_id.is_some() {
                session.user_id = account.user_id.clone();
            }
            if account.email_address.is_some() {
                session.email_address = account.email_address.clone();
            }
        }
        if account.email_address.is_some() {
            state.last_email = account.email_address.clone();
        }
        state.account = Some(account.clone());
        drop(state);

        self.inner
            .events
            .publish(IdentityEvent::DidUpdateAccount(account));
        true
    }

    /// Server-side token rejection: force a logout exactly as if the user
    /// had asked for one, unless the session already moved on.
    fn invalidate(&self, generation: u64) {
        {
            let state = self.lock_state();
            if state.generation != generation || state.phase != Phase::LoggedIn {
                return;
            }
        }
        tracing::warn!("session token rejected by the identity service, logging out");
        self.logout();
    }

    fn spawn_account_refresh(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.refresh_account().await {
                // Transient failures keep the session; the account stays
                // stale until the next refresh.
                tracing::warn!("background account refresh failed: {}", e);
            }
        });
    }

    fn access_group(&self) -> &str {
        self.inner
            .access_group
            .as_deref()
            .unwrap_or(DEFAULT_ACCESS_GROUP)
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Read accessors

    pub fn service_url(&self) -> &Url {
        &self.inner.service_url
    }

    pub fn website_url(&self) -> &Url {
        &self.inner.website_url
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock_state().phase == Phase::LoggedIn
    }

    pub fn session_token(&self) -> Option<SessionToken> {
        self.lock_state().session.as_ref().map(|s| s.token.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock_state()
            .session
            .as_ref()
            .and_then(|s| s.user_id.clone())
    }

    pub fn email_address(&self) -> Option<String> {
        self.lock_state()
            .session
            .as_ref()
            .and_then(|s| s.email_address.clone())
    }

    pub fn display_name(&self) -> Option<String> {
        self.lock_state()
            .account
            .as_ref()
            .and_then(|a| a.display_name.clone())
    }

    pub fn account(&self) -> Option<Account> {
        self.lock_state().account.clone()
    }

    /// Subscribe to lifecycle events of this service instance.
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.inner.events.subscribe()
    }
}

// Process-wide current service slot. Bookkeeping only; nothing in the
// crate consults it.
static CURRENT: OnceLock<RwLock<Option<IdentityService>>> = OnceLock::new();

fn current_slot() -> &'static RwLock<Option<IdentityService>> {
    CURRENT.get_or_init(|| RwLock::new(None))
}

/// Designate `service` as the ambient shared instance.
pub fn set_current(service: IdentityService) {
    *current_slot().write().unwrap_or_else(|e| e.into_inner()) = Some(service);
}

/// The ambient shared instance, if one was designated.
pub fn current() -> Option<IdentityService> {
    current_slot()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Clear the ambient shared instance. Intended for tests.
pub fn reset_current() {
    *current_slot().write().unwrap_or_else(|e| e.into_inner()) = None;
}
