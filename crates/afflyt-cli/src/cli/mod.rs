//! CLI entry and dispatch.

use std::path::Path;

use afflyt_core::{config, logging};
use anyhow::{Context, Result};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "afflyt")]
#[command(version)]
#[command(about = "Afflyt account and link preview client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show the current session
    Status,

    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password (omit for passwordless accounts)
        #[arg(long, env = "AFFLYT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with a magic link sent by email
    MagicLink {
        #[command(subcommand)]
        command: MagicLinkCommands,
    },

    /// Sign out and remove the saved session
    Logout,

    /// Show or edit the signed-in profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Open a public Afflyt link through its preview page
    Preview {
        /// The short link hash
        #[arg(value_name = "HASH")]
        hash: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum MagicLinkCommands {
    /// Email a sign-in link
    Send {
        /// Account email
        #[arg(long)]
        email: String,
    },
    /// Sign in with the token (or the full link) from the email
    Verify {
        #[arg(value_name = "TOKEN_OR_URL")]
        token: String,
    },
}

#[derive(clap::Subcommand)]
enum ProfileCommands {
    /// Print the profile
    Show {
        /// Print the raw profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update profile fields
    Update {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Amazon associate tag
        #[arg(long = "amazon-tag")]
        amazon_tag: Option<String>,
        /// Website URL
        #[arg(long)]
        website: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // config commands must work even when the file is broken
    let command = match cli.command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Path => {
                    commands::config::path();
                    Ok(())
                }
                ConfigCommands::Init => commands::config::init(),
            };
        }
        command => command,
    };

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(config.log_file.as_deref().map(Path::new))?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(command, &config).await })
}

async fn dispatch(command: Commands, config: &config::Config) -> Result<()> {
    match command {
        Commands::Status => commands::auth::status(config).await,
        Commands::Login { email, password } => {
            commands::auth::login(config, &email, password.as_deref()).await
        }
        Commands::MagicLink { command } => match command {
            MagicLinkCommands::Send { email } => {
                commands::auth::send_magic_link(config, &email).await
            }
            MagicLinkCommands::Verify { token } => {
                commands::auth::verify_magic_link(config, &token).await
            }
        },
        Commands::Logout => commands::auth::logout(config).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => commands::profile::show(config, json).await,
            ProfileCommands::Update {
                name,
                amazon_tag,
                website,
            } => commands::profile::update(config, name, amazon_tag, website).await,
        },
        Commands::Preview { hash } => commands::preview::run(config, &hash).await,
        Commands::Config { .. } => Ok(()),
    }
}
