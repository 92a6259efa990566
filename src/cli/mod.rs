pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "rabbit-admin")]
#[command(about = "rabbit-admin - Operator tooling for the RabbitMQ Admin API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Issue a bearer token signed with SECURITY_JWT_SECRET")]
    Token {
        #[arg(long, help = "User id (UUID) the token is issued for")]
        user: uuid::Uuid,
        #[arg(long, help = "Username recorded in the token")]
        username: String,
        #[arg(long, default_value = "USER", help = "ADMINISTRATOR or USER")]
        role: String,
        #[arg(long, help = "Token lifetime in hours (defaults to configuration)")]
        expiry_hours: Option<u64>,
    },

    #[command(about = "Check that a management API answers with the given credentials")]
    Probe {
        #[arg(help = "Management API base URL, e.g. http://localhost:15672")]
        url: String,
        #[arg(long, default_value = "guest")]
        username: String,
        #[arg(long, default_value = "guest")]
        password: String,
    },

    #[command(about = "List stored cluster connections (requires DATABASE_URL)")]
    Clusters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token {
            user,
            username,
            role,
            expiry_hours,
        } => commands::token(user, username, &role, expiry_hours, &output_format),
        Commands::Probe {
            url,
            username,
            password,
        } => commands::probe(url, username, password, &output_format).await,
        Commands::Clusters => commands::clusters(&output_format).await,
    }
}
