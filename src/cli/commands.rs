use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::{output_empty_collection, output_success, output_table};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::models::{ClusterConnection, NewClusterConnection};
use crate::database::{ClusterStore, DatabaseManager, PgStore};
use crate::proxy::{map_response, rabbitmq, UpstreamClient};
use crate::types::Role;

pub fn token(
    user: Uuid,
    username: String,
    role: &str,
    expiry_hours: Option<u64>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let role = Role::parse(role).ok_or_else(|| anyhow::anyhow!("Unknown role '{}'", role))?;
    let config = config::config();
    let hours = expiry_hours.unwrap_or(config.security.jwt_expiry_hours);

    let claims = Claims::new(user, username, role, hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Token issued",
            Some(json!({ "token": token, "expires_at": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}

pub async fn probe(
    url: String,
    username: String,
    password: String,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    // Throwaway record; never stored
    let connection = ClusterConnection::from_new(NewClusterConnection {
        name: "probe".to_string(),
        api_url: url,
        username,
        password,
        is_active: true,
        description: None,
    });

    let client = UpstreamClient::build(&connection, &config::config().upstream)?;
    let op = rabbitmq::overview();
    let response = client.send(&op).await?;
    let overview = map_response(connection.id, &op, response)?.json()?;

    let version = overview
        .get("rabbitmq_version")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let cluster_name = overview
        .get("cluster_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    output_success(
        output_format,
        &format!("{} answered: RabbitMQ {} ({})", client.api_root(), version, cluster_name),
        Some(json!({ "overview": overview })),
    )
}

pub async fn clusters(output_format: &OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    if config.database.url.is_none() {
        anyhow::bail!("DATABASE_URL is not set");
    }

    let database = DatabaseManager::connect(&config.database).await?;
    let store = PgStore::new(database.pool());
    let connections = store.list_connections().await?;
    database.close().await;

    if connections.is_empty() {
        return output_empty_collection(output_format, "cluster connections");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&connections)?);
            Ok(())
        }
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = connections
                .iter()
                .map(|c| {
                    vec![
                        c.id.to_string(),
                        c.name.clone(),
                        c.api_url.clone(),
                        if c.is_active { "active" } else { "inactive" }.to_string(),
                    ]
                })
                .collect();
            output_table(&["ID", "NAME", "API URL", "STATUS"], &rows);
            Ok(())
        }
    }
}
