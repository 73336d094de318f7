use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use crate::access::RoleTable;
use crate::auth::{generate_jwt, Claims};
use crate::catalog;
use crate::config::{AppConfig, LogFormat};
use crate::server;

#[derive(Parser)]
#[command(name = "respite")]
#[command(about = "Scoped CRUD API over registered resource types")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "List registered resources and their ownership")]
    Resources,

    #[command(about = "Show the role to permission table in effect")]
    Roles,

    #[command(about = "Mint a development token for the jwt provider")]
    Token {
        #[arg(long, help = "Subject id (UUID); a random one when omitted")]
        sub: Option<String>,
        #[arg(long, default_value = "developer", help = "preferred_username claim")]
        username: String,
        #[arg(long = "role", help = "Role to include; repeatable")]
        roles: Vec<String>,
        #[arg(long, default_value_t = 60, help = "Lifetime in minutes")]
        ttl: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("respite={},tower_http=info", config.logging.level)));

    let result = match config.logging.format {
        LogFormat::Json => fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

fn roles(config: &AppConfig) -> anyhow::Result<RoleTable> {
    server::load_roles(config, catalog::default_roles())
}

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("Starting respite in {:?} mode", config.environment);
            server::serve(config, catalog::registry(), roles(config)?).await
        }
        Commands::Resources => {
            let registry = catalog::registry();
            match output_format {
                OutputFormat::Json => {
                    let list: Vec<_> = registry
                        .names()
                        .into_iter()
                        .map(|name| json!({ "name": name, "global": registry.is_global(name) }))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&list)?);
                }
                OutputFormat::Text => {
                    for name in registry.names() {
                        let shape = if registry.is_global(name) { "global" } else { "owned" };
                        println!("{:<16} {}", name, shape);
                    }
                }
            }
            Ok(())
        }
        Commands::Roles => {
            let table = roles(config)?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
                OutputFormat::Text => {
                    for (role, permissions) in table.roles() {
                        println!("{}: {}", role, permissions.join(", "));
                    }
                }
            }
            Ok(())
        }
        Commands::Token { sub, username, roles, ttl } => {
            let sub = sub.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            uuid::Uuid::parse_str(&sub).map_err(|_| anyhow::anyhow!("--sub must be a UUID"))?;

            let claims = Claims::new(sub, username, chrono::Duration::minutes(ttl)).with_roles(roles);
            let token = generate_jwt(&claims, &config.auth.jwt_secret)?;
            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "token": token, "claims": claims }))?
                ),
                OutputFormat::Text => println!("{}", token),
            }
            Ok(())
        }
    }
}
