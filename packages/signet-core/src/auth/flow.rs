//! Login flow orchestration.

use crate::error::IdentityError;
use crate::session::SessionToken;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use url::Url;

/// Path on the service URL the provider redirects back to once the user
/// has logged in.
const CALLBACK_PATH: &str = "v2/session/callback";

/// Query parameter carrying the session token on the provider redirect.
const TOKEN_PARAM: &str = "token";

/// Query parameter naming the redirect target on the login page URL.
const REDIRECT_PARAM: &str = "redirect";

/// Query parameter pre-filling the email field on the login page.
const EMAIL_PARAM: &str = "email";

/// Inputs to one login flow instance.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Identity webservice base URL.
    pub service_url: Url,
    /// Hosted login pages the browser navigates.
    pub website_url: Url,
    /// Pre-filled email address, if known.
    pub email_address: Option<String>,
}

/// Build the hosted login page URL for a request.
pub fn login_url(request: &LoginRequest) -> Result<Url, IdentityError> {
    let callback = callback_url(&request.service_url)?;
    let mut url = join(&request.website_url, "login")?;
    url.query_pairs_mut()
        .append_pair(REDIRECT_PARAM, callback.as_str());
    if let Some(email) = &request.email_address {
        url.query_pairs_mut().append_pair(EMAIL_PARAM, email);
    }
    Ok(url)
}

/// The redirect target the provider sends the browser back to.
pub fn callback_url(service_url: &Url) -> Result<Url, IdentityError> {
    join(service_url, CALLBACK_PATH)
}

/// Extract the session token if `navigation` is the provider redirect for
/// `callback`.
///
/// Presenters call this on every navigation they observe; `None` means the
/// page is not the redirect (or carries no token) and the flow continues.
pub fn redirect_token(callback: &Url, navigation: &Url) -> Option<SessionToken> {
    if navigation.host_str() != callback.host_str() || navigation.path() != callback.path() {
        return None;
    }
    navigation
        .query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| SessionToken::new(value.into_owned()))
}

fn join(base: &Url, path: &str) -> Result<Url, IdentityError> {
    Url::parse(&format!("{}/{}", base.as_str().trim_end_matches('/'), path)).map_err(|e| {
        tracing::warn!("could not build login URL from {}: {}", base, e);
        IdentityError::AuthenticationStartFailed
    })
}

/// Completion handle for one flow instance.
///
/// Exactly one of [`token`](Self::token) or [`dismissed`](Self::dismissed)
/// is delivered per flow; later calls are no-ops that report `false`.
/// Clones share the same single-fire slot, so a presenter can hand one
/// clone to its token path and another to its dismissal path.
#[derive(Clone)]
pub struct TokenSink {
    slot: Arc<Mutex<Option<oneshot::Sender<Option<SessionToken>>>>>,
}

impl TokenSink {
    fn new() -> (Self, oneshot::Receiver<Option<SessionToken>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Deliver the intercepted session token.
    pub fn token(&self, token: SessionToken) -> bool {
        self.fire(Some(token))
    }

    /// Report that the surface was dismissed without a token.
    pub fn dismissed(&self) -> bool {
        self.fire(None)
    }

    fn fire(&self, outcome: Option<SessionToken>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Browser-hosted login surface collaborator.
///
/// `present` opens the surface for `request` and returns once presentation
/// is underway; the eventual outcome is delivered through `sink`, possibly
/// long after `present` returned. Returning an error means the surface
/// could not be shown at all; in that case any sink activity is ignored.
#[async_trait]
pub trait LoginPresenter: Send + Sync {
    async fn present(&self, request: LoginRequest, sink: TokenSink) -> Result<(), IdentityError>;
}

/// Terminal outcome of one flow instance.
#[derive(Debug)]
pub enum FlowOutcome {
    /// The provider redirect delivered a session token.
    Token(SessionToken),
    /// The surface was dismissed before a token arrived.
    Dismissed,
}

/// One delegated login exchange.
///
/// Owns no persistent state; the caller decides what to do with the
/// outcome.
pub struct AuthFlow;

impl AuthFlow {
    /// Run a single flow instance to completion.
    ///
    /// At most one outcome is produced: the sink is single-fire, and a
    /// presenter that drops its sink without firing counts as a dismissal.
    pub async fn run(
        presenter: &dyn LoginPresenter,
        request: LoginRequest,
    ) -> Result<FlowOutcome, IdentityError> {
        let (sink, receiver) = TokenSink::new();

        if let Err(e) = presenter.present(request, sink).await {
            tracing::warn!("login surface failed to start: {}", e);
            return Err(IdentityError::AuthenticationStartFailed);
        }

        match receiver.await {
            Ok(Some(token)) => Ok(FlowOutcome::Token(token)),
            Ok(None) => Ok(FlowOutcome::Dismissed),
            // Presenter went away without completing the flow.
            Err(_) => Ok(FlowOutcome::Dismissed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LoginRequest {
        LoginRequest {
            service_url: Url::parse("https://id.example.com/api").unwrap(),
            website_url: Url::parse("https://www.example.com").unwrap(),
            email_address: None,
        }
    }

    struct ImmediateToken(&'static str);

    #[async_trait]
    impl LoginPresenter for ImmediateToken {
        async fn present(
            &self,
            _request: LoginRequest,
            sink: TokenSink,
        ) -> Result<(), IdentityError> {
            assert!(sink.token(SessionToken::new(self.0)));
            Ok(())
        }
    }

    struct DropsSink;

    #[async_trait]
    impl LoginPresenter for DropsSink {
        async fn present(
            &self,
            _request: LoginRequest,
            _sink: TokenSink,
        ) -> Result<(), IdentityError> {
            Ok(())
        }
    }

    struct FailsToStart;

    #[async_trait]
    impl LoginPresenter for FailsToStart {
        async fn present(
            &self,
            _request: LoginRequest,
            _sink: TokenSink,
        ) -> Result<(), IdentityError> {
            Err(IdentityError::AuthenticationStartFailed)
        }
    }

    #[test]
    fn login_url_carries_redirect_and_email() {
        let mut request = request();
        request.email_address = Some("jane@example.com".into());

        let url = login_url(&request).unwrap();
        assert!(url.as_str().starts_with("https://www.example.com/login?"));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&(
            "redirect".to_string(),
            "https://id.example.com/api/v2/session/callback".to_string()
        )));
        assert!(pairs.contains(&("email".to_string(), "jane@example.com".to_string())));
    }

    #[test]
    fn redirect_token_extracts_from_callback() {
        let callback = callback_url(&request().service_url).unwrap();
        let navigation =
            Url::parse("https://id.example.com/api/v2/session/callback?token=T1").unwrap();

        assert_eq!(
            redirect_token(&callback, &navigation),
            Some(SessionToken::new("T1"))
        );
    }

    #[test]
    fn redirect_token_ignores_other_pages() {
        let callback = callback_url(&request().service_url).unwrap();

        let other_path = Url::parse("https://id.example.com/api/v2/profile?token=T1").unwrap();
        assert_eq!(redirect_token(&callback, &other_path), None);

        let other_host =
            Url::parse("https://evil.example.net/api/v2/session/callback?token=T1").unwrap();
        assert_eq!(redirect_token(&callback, &other_host), None);

        let no_token = Url::parse("https://id.example.com/api/v2/session/callback").unwrap();
        assert_eq!(redirect_token(&callback, &no_token), None);
    }

    #[test]
    fn sink_fires_at_most_once() {
        let (sink, mut receiver) = TokenSink::new();
        let second = sink.clone();

        assert!(sink.token(SessionToken::new("T1")));
        assert!(!second.dismissed());
        assert!(!sink.token(SessionToken::new("T2")));

        assert_eq!(
            receiver.try_recv().unwrap(),
            Some(SessionToken::new("T1"))
        );
    }

    #[tokio::test]
    async fn flow_yields_the_token() {
        let outcome = AuthFlow::run(&ImmediateToken("T1"), request()).await.unwrap();
        match outcome {
            FlowOutcome::Token(token) => assert_eq!(token, SessionToken::new("T1")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropped_sink_counts_as_dismissal() {
        let outcome = AuthFlow::run(&DropsSink, request()).await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Dismissed));
    }

    #[tokio::test]
    async fn presenter_failure_maps_to_start_failed() {
        let error = AuthFlow::run(&FailsToStart, request()).await.unwrap_err();
        assert!(matches!(error, IdentityError::AuthenticationStartFailed));
    }
}
