//! Account retrieval from the identity service.

use crate::error::FetchError;
use crate::session::{Account, SessionToken};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Path of the account endpoint relative to the service URL.
const ACCOUNT_PATH: &str = "v2/session/account";

/// Request timeout applied when the caller did not supply its own client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves the profile associated with a session token.
///
/// `InvalidToken` is the only result that may end the session; `Transport`
/// and `InvalidData` leave it untouched since the token itself may still be
/// valid.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    async fn fetch(
        &self,
        service_url: &Url,
        token: &SessionToken,
    ) -> Result<Account, FetchError>;
}

/// HTTP fetcher against the identity service's account endpoint.
#[derive(Debug, Clone)]
pub struct HttpAccountFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpAccountFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Some(REQUEST_TIMEOUT),
        }
    }

    /// Use a caller-configured client; its timeout policy applies as-is.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }
}

impl Default for HttpAccountFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountFetcher for HttpAccountFetcher {
    async fn fetch(
        &self,
        service_url: &Url,
        token: &SessionToken,
    ) -> Result<Account, FetchError> {
        let url = format!(
            "{}/{}",
            service_url.as_str().trim_end_matches('/'),
            ACCOUNT_PATH
        );

        let mut request = self.client.get(&url).bearer_auth(token.as_str());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!("account fetch transport error: {}", e);
                return Err(FetchError::Transport(e.to_string()));
            }
        };

        match resp.status().as_u16() {
            200 => {
                let body = resp
                    .text()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                serde_json::from_str::<Account>(&body)
                    .map_err(|e| FetchError::InvalidData(e.to_string()))
            }
            401 | 403 => Err(FetchError::InvalidToken),
            status => {
                // Treat other statuses (500, etc.) as transient transport
                // issues rather than a verdict on the token.
                tracing::debug!("account fetch returned status {}", status);
                Err(FetchError::Transport(format!("server returned {}", status)))
            }
        }
    }
}
