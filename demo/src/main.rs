//! datastore-auth-demo - run one authorization decision from the command line
//!
//! Loads the authorization configuration the same way the datastore API does
//! (`DATASTORE_AUTH_*` environment variables, optionally on top of a file),
//! then authorizes the given credentials and prints the outcome.
//!
//! ```text
//! DATASTORE_AUTH_MODE=SKIP_SIGNATURE datastore-auth-demo -v \
//!     data-admin --rdn no.ssb.test --token "$TOKEN" --user-info "$USER_INFO"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use datastore_auth::{AuthConfig, AuthError, Authorizer};
use serde_json::json;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "datastore-auth-demo",
    version,
    about = "Run a datastore authorization decision against the configured identity provider"
)]
struct Cli {
    /// Operation to authorize
    #[command(subcommand)]
    command: Command,

    /// Configuration file (.toml, .yaml, .yml or .json); environment overrides it
    #[arg(short, long, env = "DATASTORE_AUTH_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authorize a plain user token against the data audience
    User {
        /// Bearer token
        #[arg(long)]
        token: Option<String>,
    },
    /// Authorize a data administrator for one datastore
    DataAdmin {
        /// Datastore RDN
        #[arg(long)]
        rdn: String,
        /// Accreditation token
        #[arg(long)]
        token: Option<String>,
        /// User-info token; resolves the caller's identity when given
        #[arg(long)]
        user_info: Option<String>,
    },
    /// Authorize a datastore provisioner
    Provisioner {
        /// Accreditation token
        #[arg(long)]
        token: Option<String>,
        /// User-info token; resolves the caller's identity when given
        #[arg(long)]
        user_info: Option<String>,
    },
    /// Check a service API key
    ApiKey {
        /// Candidate key
        #[arg(long, env = "DATASTORE_AUTH_DEMO_API_KEY")]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = match &cli.config {
        Some(path) => AuthConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AuthConfig::from_env().context("loading configuration from environment")?,
    };
    let authorizer = Authorizer::from_config(&config).context("building authorizer")?;

    match run(&authorizer, cli.command).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let outcome = json!({
                "authorized": false,
                "status": e.status_code().as_u16(),
                "detail": e.public_message(),
            });
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(authorizer: &Authorizer, command: Command) -> Result<serde_json::Value, AuthError> {
    match command {
        Command::User { token } => {
            let user_id = authorizer.authorize_user(token.as_deref()).await?;
            Ok(json!({ "authorized": true, "user_id": user_id }))
        }
        Command::DataAdmin {
            rdn,
            token,
            user_info,
        } => {
            let context = authorizer
                .authorize_data_administrator(&rdn, token.as_deref())
                .await?;
            let identity = match user_info.as_deref() {
                Some(user_info) => {
                    Some(authorizer.resolve_identity(&context, Some(user_info)).await?)
                }
                None => None,
            };
            Ok(json!({
                "authorized": true,
                "user_id": context.user_id(),
                "rdn": rdn,
                "identity": identity,
            }))
        }
        Command::Provisioner { token, user_info } => {
            let context = authorizer
                .authorize_datastore_provisioner(token.as_deref())
                .await?;
            let identity = match user_info.as_deref() {
                Some(user_info) => {
                    Some(authorizer.resolve_identity(&context, Some(user_info)).await?)
                }
                None => None,
            };
            Ok(json!({
                "authorized": true,
                "user_id": context.user_id(),
                "identity": identity,
            }))
        }
        Command::ApiKey { key } => {
            authorizer.authorize_api_key(key.as_deref())?;
            Ok(json!({ "authorized": true }))
        }
    }
}

fn init_tracing(verbose: u8, json_logs: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("datastore_auth={level}")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
