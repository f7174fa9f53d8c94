mod subcommands;


use crate::api::HttpApiClient;
use crate::config::{Config, load_config};
use crate::errors::PairingError;
use crate::session::{SessionContext, SessionStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "sdrlink")]
#[command(about = "Link a WhatsApp number to the SDR backend")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of ~/.sdrlink/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create the sdrlink configuration
    Onboard,
    /// Log in to the backend and store the session
    Login {
        #[arg(long, short = 'e')]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "SDRLINK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user and selected agency
    Whoami,
    /// Show or switch the agency you act on
    Agency {
        /// Agency id, or "geral" for the general view (super admins only)
        id: Option<String>,
    },
    /// Show the WhatsApp connection status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Pair a WhatsApp number by scanning a QR code
    Connect {
        /// Name for the backend instance
        #[arg(long)]
        instance_name: Option<String>,
        /// Also write the QR image to this PNG file
        #[arg(long)]
        qr_out: Option<PathBuf>,
    },
    /// Unlink the WhatsApp number
    Disconnect {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show the instance API token
    Token,
    /// Check the instance health
    Health,
}

/// Loaded config plus the session every API call is made with.
pub(crate) struct AppContext {
    pub config: Config,
    pub store: SessionStore,
    pub session: SessionContext,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::new(load_config(config_path)?, SessionStore::new()?)
    }

    pub fn new(config: Config, store: SessionStore) -> Result<Self> {
        let session = resolve_session(&config, store.load()?);
        Ok(Self {
            config,
            store,
            session,
        })
    }

    pub fn client(&self) -> Result<HttpApiClient> {
        Ok(HttpApiClient::new(&self.config.api, self.session.clone())?)
    }

    pub fn require_login(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            anyhow::bail!("not logged in; run `sdrlink login` or set SDRLINK_TOKEN");
        }
        Ok(())
    }
}

/// Stored session with config/env overrides applied on top.
pub(crate) fn resolve_session(config: &Config, stored: Option<SessionContext>) -> SessionContext {
    let mut session = stored.unwrap_or_default();
    if !config.api.token.is_empty() {
        debug!("using API token from config/env");
        session.set_token(config.api.token.clone());
    }
    if let Some(agency) = &config.api.agency_id {
        session.pin_agency(agency.clone());
    }
    session
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Neither needs a valid config.
    match cli.command {
        Commands::Onboard => return onboard(config_path),
        Commands::Logout => return subcommands::logout(&SessionStore::new()?),
        _ => {}
    }

    let mut ctx = AppContext::load(config_path)?;
    dispatch(&mut ctx, cli.command).await
}

pub(crate) async fn dispatch(ctx: &mut AppContext, command: Commands) -> Result<()> {
    // A 401 on login means bad credentials, not a revoked session.
    let clear_on_unauthorized = !matches!(command, Commands::Login { .. });

    let result = match command {
        Commands::Onboard => anyhow::bail!("onboard runs before any config is loaded"),
        Commands::Login { email, password } => subcommands::login(ctx, &email, password).await,
        Commands::Logout => subcommands::logout(&ctx.store),
        Commands::Whoami => subcommands::whoami(ctx).await,
        Commands::Agency { id } => subcommands::agency(ctx, id),
        Commands::Status { json } => subcommands::status(ctx, json).await,
        Commands::Connect {
            instance_name,
            qr_out,
        } => {
            let input = BufReader::new(tokio::io::stdin());
            subcommands::connect(ctx, instance_name, qr_out, input).await
        }
        Commands::Disconnect { yes } => subcommands::disconnect(ctx, yes).await,
        Commands::Token => subcommands::token(ctx).await,
        Commands::Health => subcommands::health(ctx).await,
    };

    if clear_on_unauthorized
        && let Err(e) = &result
        && is_unauthorized(e)
    {
        forget_session(&ctx.store);
    }
    result
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PairingError>()
        .is_some_and(PairingError::is_unauthorized)
}

fn forget_session(store: &SessionStore) {
    match store.clear() {
        Ok(true) => warn!("server rejected the session; stored login cleared"),
        Ok(false) => {}
        Err(e) => warn!("failed to clear stored session: {:#}", e),
    }
}

fn onboard(config_path: Option<&Path>) -> Result<()> {
    println!("Initializing sdrlink...");

    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => crate::config::get_config_path()?,
    };
    if config_path.exists() {
        println!(
            "\u{26a0}\u{fe0f}  Config already exists at {}",
            config_path.display()
        );
        if !subcommands::confirm("Overwrite?")? {
            return Ok(());
        }
    }

    let config = Config::default();
    crate::config::save_config(&config, Some(config_path.as_path()))
        .context("failed to write config")?;
    println!("\u{2713} Created config at {}", config_path.display());

    println!("\nNext steps:");
    println!(
        "  1. Set api.baseUrl in {} (default {})",
        config_path.display(),
        config.api.base_url
    );
    println!("  2. Log in: sdrlink login -e you@example.com");
    println!("  3. Pair WhatsApp: sdrlink connect");

    Ok(())
}
