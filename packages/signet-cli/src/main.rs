//! Signet CLI - terminal client for a Signet identity service
//!
//! This binary exercises the signet-core session lifecycle:
//! - Log in through the hosted login page (browser hand-off)
//! - Inspect session status and the cached account
//! - Follow lifecycle events and detect server-side invalidation
//!
//! Every command supports --format json for scripting.

mod presenter;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use presenter::TerminalLoginPresenter;
use signet_core::{
    FetchError, HttpAccountFetcher, IdentityError, IdentityEvent, IdentityService, KeyringStore,
    ServiceConfig, config, storage_backend_info,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser)]
#[command(name = "signet")]
#[command(author = "Signet Team")]
#[command(version)]
#[command(about = "Terminal client for a Signet identity service")]
#[command(long_about = "
Signet CLI manages a login session against a Signet identity service:
it runs the hosted login flow, keeps the session token in the platform
keyring, and keeps the cached account in sync with the server.

Quick start:
  1. Configure the service:  export SIGNET_SERVICE_URL=https://id.example.com/api
  2. Log in:                 signet login
  3. Check the session:      signet status
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in through the hosted login page
    Login {
        /// Pre-fill the email field on the login page
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Show session status
    Status,

    /// Fetch the account profile from the service
    Account,

    /// Log out and clear the stored session
    Logout,

    /// Follow lifecycle events, revalidating the session periodically
    Watch {
        /// Revalidation interval in minutes
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("signet={},signet_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Login { ref email } => cmd_login(&cli, email.clone()).await,
        Commands::Status => cmd_status(&cli).await,
        Commands::Account => cmd_account(&cli).await,
        Commands::Logout => cmd_logout(&cli).await,
        Commands::Watch { interval } => cmd_watch(&cli, interval).await,
        Commands::Config => cmd_config(&cli),
    }
}

/// Build the identity service from discovered configuration.
fn build_service() -> Result<IdentityService> {
    let discovered = config::discover().ok_or_else(|| {
        anyhow!(
            "no service URL configured; set SIGNET_SERVICE_URL or add one to {}",
            config::config_file_path_string()
        )
    })?;
    tracing::debug!("using service URL from {}", discovered.source);

    let mut service_config = ServiceConfig::new(discovered.service_url, discovered.website_url);
    if let Some(group) = discovered.access_group {
        service_config = service_config.with_access_group(group);
    }

    Ok(IdentityService::new(
        service_config,
        Arc::new(KeyringStore::new()),
        Arc::new(HttpAccountFetcher::new()),
    ))
}

async fn cmd_login(cli: &Cli, email: Option<String>) -> Result<()> {
    let service = build_service()?;

    if service.is_logged_in() {
        match cli.format {
            OutputFormat::Text => {
                println!(
                    "Already logged in{}",
                    service
                        .email_address()
                        .map(|e| format!(" as {}", e))
                        .unwrap_or_default()
                );
                println!("Use 'signet logout' to sign out first.");
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "already_logged_in",
                        "email_address": service.email_address(),
                    })
                );
            }
        }
        return Ok(());
    }

    match service
        .login_with_email(&TerminalLoginPresenter, email)
        .await
    {
        Ok(()) => {}
        Err(IdentityError::AuthenticationCanceled) => {
            match cli.format {
                OutputFormat::Text => println!("Login canceled."),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "status": "canceled" }));
                }
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    // Pull the profile so the confirmation can name the user; a transient
    // failure here is not a failed login.
    let display = match service.refresh_account().await {
        Ok(account) => account.display_name.or(account.email_address),
        Err(e) => {
            tracing::debug!("profile not available yet: {}", e);
            None
        }
    };

    match cli.format {
        OutputFormat::Text => {
            println!();
            match display {
                Some(name) => println!("Logged in as {}", name),
                None => println!("Logged in."),
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "logged_in",
                    "user_id": service.user_id(),
                    "email_address": service.email_address(),
                    "display_name": service.display_name(),
                })
            );
        }
    }

    Ok(())
}

async fn cmd_status(cli: &Cli) -> Result<()> {
    let service = build_service()?;

    if service.is_logged_in() {
        // Revalidate with the server so the identity fields are current; a
        // rejected token logs the session out before we print.
        if let Err(e) = service.refresh_account().await {
            tracing::debug!("could not refresh account for status: {}", e);
        }
    }

    match cli.format {
        OutputFormat::Text => {
            if service.is_logged_in() {
                println!("Status:  Logged in");
                println!(
                    "Email:   {}",
                    service.email_address().unwrap_or_else(|| "-".to_string())
                );
                println!(
                    "User id: {}",
                    service.user_id().unwrap_or_else(|| "-".to_string())
                );
                println!();
                println!("Storage: {}", storage_backend_info());
            } else {
                println!("Status: Not logged in");
                println!();
                println!("Run 'signet login' to authenticate.");
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "logged_in": service.is_logged_in(),
                    "user_id": service.user_id(),
                    "email_address": service.email_address(),
                    "display_name": service.display_name(),
                    "storage_info": storage_backend_info(),
                })
            );
        }
    }

    Ok(())
}

async fn cmd_account(cli: &Cli) -> Result<()> {
    let service = build_service()?;

    if !service.is_logged_in() {
        match cli.format {
            OutputFormat::Text => println!("Not logged in."),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "status": "not_logged_in" }));
            }
        }
        return Ok(());
    }

    match service.refresh_account().await {
        Ok(account) => match cli.format {
            OutputFormat::Text => {
                println!(
                    "Display name: {}",
                    account.display_name.as_deref().unwrap_or("-")
                );
                println!(
                    "Email:        {}",
                    account.email_address.as_deref().unwrap_or("-")
                );
                println!(
                    "User id:      {}",
                    account.user_id.as_deref().unwrap_or("-")
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(&account)?);
            }
        },
        Err(IdentityError::Fetch(FetchError::InvalidToken)) => {
            match cli.format {
                OutputFormat::Text => {
                    println!("Session was invalidated by the service; you have been logged out.");
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "status": "invalidated" }));
                }
            }
        }
        Err(e) => {
            // Transient failure: the session survives, the cache may be
            // stale.
            match cli.format {
                OutputFormat::Text => {
                    eprintln!("Could not refresh the account: {}", e);
                    if let Some(account) = service.account() {
                        println!(
                            "Cached display name: {}",
                            account.display_name.as_deref().unwrap_or("-")
                        );
                    }
                }
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "status": "refresh_failed",
                            "error": e.to_string(),
                        })
                    );
                }
            }
        }
    }

    Ok(())
}

async fn cmd_logout(cli: &Cli) -> Result<()> {
    let service = build_service()?;

    if !service.is_logged_in() {
        match cli.format {
            OutputFormat::Text => println!("Not logged in."),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "status": "not_logged_in" }));
            }
        }
        return Ok(());
    }

    let email = service.email_address();
    service.logout();

    match cli.format {
        OutputFormat::Text => match email {
            Some(email) => println!("Logged out {}", email),
            None => println!("Logged out."),
        },
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "logged_out",
                    "email_address": email,
                })
            );
        }
    }

    Ok(())
}

async fn cmd_watch(cli: &Cli, interval_minutes: u64) -> Result<()> {
    let service = build_service()?;

    if !service.is_logged_in() {
        eprintln!("Error: not logged in.");
        eprintln!("Run 'signet login' first to authenticate.");
        std::process::exit(1);
    }

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Watching identity events, revalidating every {} minutes (Ctrl-C to stop)",
                interval_minutes
            );
        }
        OutputFormat::Json => {}
    }

    let mut events = service.subscribe();
    let mut revalidate = interval(Duration::from_secs(interval_minutes * 60));
    // Skip the immediate first tick; construction already scheduled a
    // refresh.
    revalidate.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        print_event(cli, &event);
                        if matches!(event, IdentityEvent::UserDidLogout) {
                            tracing::info!("session ended, stopping watch");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("event stream lagged, {} events dropped", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = revalidate.tick() => {
                match service.refresh_account().await {
                    // State changes arrive through the event stream.
                    Ok(_) | Err(IdentityError::Fetch(FetchError::InvalidToken)) => {}
                    Err(e) => tracing::warn!("revalidation failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, stopping watch");
                break;
            }
        }
    }

    Ok(())
}

fn print_event(cli: &Cli, event: &IdentityEvent) {
    match cli.format {
        OutputFormat::Text => match event {
            IdentityEvent::UserDidLogin => println!("event: logged in"),
            IdentityEvent::UserDidLogout => println!("event: logged out"),
            IdentityEvent::DidUpdateAccount(account) => {
                println!(
                    "event: account updated ({})",
                    account
                        .display_name
                        .as_deref()
                        .or(account.email_address.as_deref())
                        .unwrap_or("-")
                );
            }
        },
        OutputFormat::Json => {
            let payload = match event {
                IdentityEvent::DidUpdateAccount(account) => serde_json::json!({
                    "event": event.event_type(),
                    "account": account,
                }),
                _ => serde_json::json!({ "event": event.event_type() }),
            };
            println!("{}", payload);
        }
    }
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let discovered = config::discover();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config::config_file_path_string());
            match &discovered {
                Some(found) => {
                    println!("Service URL:      {} (from {})", found.service_url, found.source);
                    println!("Website URL:      {}", found.website_url);
                    println!(
                        "Access group:     {}",
                        found.access_group.as_deref().unwrap_or("signet (default)")
                    );
                }
                None => println!("Service URL:      not configured"),
            }
            println!("Credential store: {}", storage_backend_info());
            println!();
            println!("Environment variables:");
            println!("  SIGNET_SERVICE_URL - Webservice base URL");
            println!("  SIGNET_WEBSITE_URL - Hosted login pages URL");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config::config_file_path_string(),
                    "service_url": discovered.as_ref().map(|d| d.service_url.to_string()),
                    "website_url": discovered.as_ref().map(|d| d.website_url.to_string()),
                    "access_group": discovered.as_ref().and_then(|d| d.access_group.clone()),
                    "source": discovered.as_ref().map(|d| d.source.to_string()),
                    "credential_storage": storage_backend_info(),
                })
            );
        }
    }

    Ok(())
}
