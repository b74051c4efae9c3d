//! Construction Manager API client - command-line entry point
//!
//! Wires configuration, durable storage, the HTTP adapter and the session
//! core together, then runs one command against the API.

mod commands;
mod routes;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cm_domain::HttpMethod;
use cm_infrastructure::ClientConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::App;

#[derive(Parser, Debug)]
#[command(name = "cm", version, about = "Construction Manager API client")]
struct Cli {
    /// API base URL (overrides CM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding stored credentials (overrides CM_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep credentials in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the credential pair
    Login {
        username: String,
        #[arg(long, env = "CM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored credentials
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show session state
    Status,
    /// Send an authenticated request
    Request {
        method: HttpMethod,
        path: String,
        /// JSON body
        #[arg(long)]
        data: Option<String>,
        /// Query parameter as key=value, repeatable
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
        /// Page the request is made from, for post-logout navigation
        #[arg(long, default_value = "/")]
        page: String,
    },
    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Show or change the interface language
    Lang { code: Option<String> },
    /// Check navigation to a front-end path
    Open { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "configuration loaded");

    let app = App::build(&config, cli.ephemeral)?;

    match cli.command {
        Command::Login { username, password } => app.login(&username, password).await?,
        Command::Logout => app.logout(),
        Command::Whoami => app.whoami().await?,
        Command::Status => app.status().await,
        Command::Request {
            method,
            path,
            data,
            query,
            page,
        } => app.request(method, &path, data.as_deref(), &query, &page).await?,
        Command::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            app.register(username, email, password, first_name, last_name)
                .await?;
        }
        Command::Lang { code } => app.lang(code.as_deref())?,
        Command::Open { path } => app.open(&path).await,
    }

    Ok(())
}
