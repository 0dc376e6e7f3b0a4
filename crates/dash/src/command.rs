// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetdash` command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::account::{self, RegisterRequest};
use crate::api::applications::{Application, ApplicationService, DeployRequest, ALL_TYPES};
use crate::api::ApiClient;
use crate::backend::HttpAuthBackend;
use crate::callback;
use crate::config::DashConfig;
use crate::navigate::TerminalNavigator;
use crate::session::persist::{self, SESSION_FILE};
use crate::session::{LoginOutcome, SessionCoordinator, SessionEvent, SessionSettings};

/// How long `login --sso` waits for the browser to come back.
const SSO_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "fleetdash", version, about = "Fleet dashboard client")]
pub struct Cli {
    #[command(flatten)]
    pub config: DashConfig,

    /// Emit logs as JSON.
    #[arg(long, env = "FLEETDASH_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with a username and password, or through the Identity Provider
    Login {
        #[arg(long, conflicts_with = "sso", requires = "password")]
        username: Option<String>,
        #[arg(long, env = "FLEETDASH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Sign in through the Identity Provider in a browser
        #[arg(long)]
        sso: bool,
    },
    /// End the session
    Logout,
    /// Show who the session belongs to
    Whoami,
    /// Manage deployed applications
    Apps {
        #[command(subcommand)]
        command: AppsCommand,
    },
    /// Create an account
    Register(RegisterArgs),
}

#[derive(Debug, Subcommand)]
pub enum AppsCommand {
    List,
    Get {
        id: String,
    },
    Search {
        #[arg(default_value = "")]
        term: String,
        #[arg(long = "type", default_value = ALL_TYPES)]
        kind: String,
    },
    Deploy(DeployArgs),
    Restart {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub version: String,
    #[arg(long = "type")]
    pub kind: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub image_url: Option<String>,
    #[arg(long)]
    pub cpu: Option<String>,
    #[arg(long)]
    pub memory: Option<String>,
    #[arg(long)]
    pub storage: Option<String>,
    #[arg(long)]
    pub pods: Option<u32>,
}

impl From<DeployArgs> for DeployRequest {
    fn from(args: DeployArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            version: args.version,
            kind: args.kind,
            image_url: args.image_url,
            cpu: args.cpu,
            memory: args.memory,
            storage: args.storage,
            pod_count: args.pods,
        }
    }
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "FLEETDASH_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub organization: String,
    #[arg(long)]
    pub role: String,
}

impl From<RegisterArgs> for RegisterRequest {
    fn from(args: RegisterArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            password: args.password,
            organization: args.organization,
            role: args.role,
        }
    }
}

/// Run one command against the configured backend.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    let session_path = session_file(&config);
    let session = SessionCoordinator::new(
        SessionSettings::from(&config),
        Arc::new(HttpAuthBackend::new(&config)),
        Arc::new(TerminalNavigator),
    );

    let saved = match cli.command {
        Command::Login { .. } | Command::Register(_) => None,
        _ => persist::load(&session_path)?,
    };
    if let Some(saved) = saved {
        if matches!(cli.command, Command::Logout) {
            // Revoke whatever was saved, even if it would no longer validate.
            session.adopt(&saved);
        } else if !session.resume(&saved).await {
            tracing::info!("saved session is no longer valid");
        }
    }

    let writer = spawn_session_writer(&session, session_path.clone());
    let client = ApiClient::new(&config, Arc::clone(&session));
    let result = dispatch(cli.command, &config, &session, &client).await;
    writer.abort();
    sync_saved_session(&session, &session_path)?;
    result
}

/// Save or remove the session file as session events arrive, so a refresh
/// during a long command survives an abrupt exit.
pub fn spawn_session_writer(session: &Arc<SessionCoordinator>, path: PathBuf) -> JoinHandle<()> {
    let mut events = session.subscribe();
    let session = Arc::downgrade(session);
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "session writer lagged");
                    None
                }
                Err(RecvError::Closed) => return,
            };
            let Some(session) = session.upgrade() else {
                return;
            };
            let result = match event {
                Some(SessionEvent::LoggedIn { .. } | SessionEvent::Refreshed) | None => {
                    sync_saved_session(&session, &path)
                }
                Some(
                    SessionEvent::RefreshFailed { .. }
                    | SessionEvent::Expired
                    | SessionEvent::LoggedOut,
                ) => persist::remove(&path),
            };
            if let Err(e) = result {
                tracing::warn!(path = %path.display(), err = %e, "failed to update saved session");
            }
        }
    })
}

async fn dispatch(
    command: Command,
    config: &DashConfig,
    session: &Arc<SessionCoordinator>,
    client: &ApiClient,
) -> anyhow::Result<()> {
    match command {
        Command::Login { sso: true, .. } => {
            if session.login_redirect().is_none() {
                anyhow::bail!("SSO is not configured (set --idp-url or FLEETDASH_IDP_URL)");
            }
            let outcome =
                callback::await_callback(Arc::clone(session), config.callback_port, SSO_TIMEOUT)
                    .await?;
            report_login(session, outcome)
        }
        Command::Login { username, password, .. } => {
            let username =
                username.ok_or_else(|| anyhow::anyhow!("--username is required without --sso"))?;
            let password = password.unwrap_or_default();
            let outcome = session.login(&username, &password).await;
            report_login(session, outcome)
        }
        Command::Logout => {
            if session.persisted().is_none() {
                println!("Not logged in.");
                return Ok(());
            }
            session.logout().await;
            Ok(())
        }
        Command::Whoami => {
            let identity = session
                .identity()
                .ok_or_else(|| anyhow::anyhow!("not logged in"))?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Command::Apps { command } => run_apps(command, ApplicationService::new(client.clone())).await,
        Command::Register(args) => {
            account::register(client, &args.into()).await?;
            println!("Registration submitted.");
            Ok(())
        }
    }
}

async fn run_apps(command: AppsCommand, apps: ApplicationService) -> anyhow::Result<()> {
    match command {
        AppsCommand::List => print_table(&apps.list().await?),
        AppsCommand::Search { term, kind } => print_table(&apps.search(&term, &kind).await?),
        AppsCommand::Get { id } => {
            let app = apps.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&app)?);
        }
        AppsCommand::Deploy(args) => {
            let app = apps.deploy(&args.into()).await?;
            println!("Deployed {} ({})", app.name, app.id);
        }
        AppsCommand::Restart { id } => {
            apps.restart(&id).await?;
            println!("Restart requested for {id}");
        }
        AppsCommand::Delete { id } => {
            apps.delete(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

fn report_login(session: &SessionCoordinator, outcome: LoginOutcome) -> anyhow::Result<()> {
    match outcome {
        LoginOutcome::Success => {
            let who = session.identity().map(|id| id.label().to_owned()).unwrap_or_default();
            println!("Logged in as {who}");
            Ok(())
        }
        LoginOutcome::Failed { reason } => anyhow::bail!("login failed: {reason}"),
    }
}

/// Mirror the coordinator's credential to disk, or remove the file once the
/// session is gone.
fn sync_saved_session(session: &SessionCoordinator, path: &Path) -> anyhow::Result<()> {
    match session.persisted() {
        Some(saved) => persist::save(path, &saved),
        None => persist::remove(path),
    }
}

fn print_table(apps: &[Application]) {
    let name_w = apps.iter().map(|a| a.name.len()).max().unwrap_or(0).max(4);
    let id_w = apps.iter().map(|a| a.id.len()).max().unwrap_or(0).max(2);
    println!("{:<id_w$}  {:<name_w$}  {:<10}  {:<14}  {}", "ID", "NAME", "STATUS", "TYPE", "VERSION");
    for a in apps {
        println!(
            "{:<id_w$}  {:<name_w$}  {:<10}  {:<14}  {}",
            a.id, a.name, a.status, a.kind, a.version
        );
    }
}

/// Location of the saved session for `config`.
pub fn session_file(config: &DashConfig) -> PathBuf {
    config.state_dir().join(SESSION_FILE)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
