//! Terminal login presenter: browser hand-off plus pasted redirect URL.

use async_trait::async_trait;
use signet_core::auth::{callback_url, login_url, redirect_token};
use signet_core::{IdentityError, LoginPresenter, LoginRequest, TokenSink};
use std::io::{self, BufRead};
use url::Url;

/// Presents the hosted login page by opening the system browser and reads
/// the resulting redirect URL from stdin. An empty line dismisses the
/// flow.
pub struct TerminalLoginPresenter;

#[async_trait]
impl LoginPresenter for TerminalLoginPresenter {
    async fn present(&self, request: LoginRequest, sink: TokenSink) -> Result<(), IdentityError> {
        let page = login_url(&request)?;
        let callback = callback_url(&request.service_url)?;

        println!();
        println!("Please log in at:\n\n{}\n", page);
        if let Err(e) = webbrowser::open(page.as_str()) {
            tracing::warn!(
                "Failed to open browser automatically: {}. Use the link above.",
                e
            );
        }
        println!("After logging in, paste the redirect URL below.");
        println!("(press Enter on an empty line to cancel)");

        // Reading stdin blocks; hand it to the blocking pool so the
        // coordinator stays responsive.
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|_| IdentityError::AuthenticationStartFailed)?
        .map_err(|_| IdentityError::AuthenticationStartFailed)?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            sink.dismissed();
            return Ok(());
        }

        match Url::parse(trimmed)
            .ok()
            .and_then(|url| redirect_token(&callback, &url))
        {
            Some(token) => {
                sink.token(token);
            }
            None => {
                eprintln!("No session token found in that URL.");
                sink.dismissed();
            }
        }
        Ok(())
    }
}
