use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use std::time::Instant;
use url::Url;
use uuid::Uuid;

use super::error::ProxyError;
use super::operation::{Operation, UpstreamResponse};
use crate::config::UpstreamConfig;
use crate::database::models::ClusterConnection;

/// Resolve a stored base URL to the management API root (`.../api`).
///
/// Accepts `http(s)://host:15672`, `http(s)://host:15672/` and
/// `http(s)://host:15672/api`, including deployments under a path prefix.
pub fn management_api_root(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("URL '{}' must use http or https", raw));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("URL '{}' has no host", raw));
    }

    url.set_query(None);
    url.set_fragment(None);

    let ends_with_api = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map_or(false, |last| last == "api");

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| format!("URL '{}' cannot be used as a base", raw))?;
        segments.pop_if_empty();
        if !ends_with_api {
            segments.push("api");
        }
    }

    Ok(url)
}

/// HTTP client bound to one cluster connection's endpoint and credential
pub struct UpstreamClient {
    cluster_id: Uuid,
    api_root: Url,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("cluster_id", &self.cluster_id)
            .field("api_root", &self.api_root.as_str())
            .field("username", &self.username)
            .finish()
    }
}

impl UpstreamClient {
    pub fn build(connection: &ClusterConnection, config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let api_root = management_api_root(&connection.api_url)
            .map_err(|msg| ProxyError::cluster_unavailable(connection.id, msg))?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(concat!("rabbit-admin-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProxyError::cluster_unavailable(connection.id, format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            cluster_id: connection.id,
            api_root,
            username: connection.username.clone(),
            password: connection.password.clone(),
            http,
        })
    }

    /// Digest of everything a client is built from. Two connections with
    /// the same fingerprint can share a client.
    pub fn fingerprint_of(connection: &ClusterConnection) -> String {
        let mut hasher = Sha256::new();
        hasher.update(connection.api_url.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(connection.username.as_bytes());
        hasher.update([0u8]);
        hasher.update(connection.password.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Full upstream URL for an operation
    pub fn url_for(&self, op: &Operation) -> Result<Url, ProxyError> {
        let mut url = self.api_root.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProxyError::cluster_unavailable(self.cluster_id, "API root cannot be a base URL")
            })?;
            segments.pop_if_empty();
            segments.extend(op.segments.iter());
        }
        if !op.query.is_empty() {
            url.query_pairs_mut().extend_pairs(op.query.iter());
        }
        Ok(url)
    }

    /// Issue the call. Any HTTP status is returned as a response; only
    /// transport failures become errors here.
    pub async fn send(&self, op: &Operation) -> Result<UpstreamResponse, ProxyError> {
        let url = self.url_for(op)?;
        let started = Instant::now();

        let mut request = self
            .http
            .request(op.method.clone(), url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = &op.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.unreachable(e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| self.unreachable(e))?.to_vec();

        tracing::debug!(
            "Upstream {} {} on cluster {} -> {} in {:?}",
            op.method,
            op.display_path(),
            self.cluster_id,
            status,
            started.elapsed()
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    fn unreachable(&self, err: reqwest::Error) -> ProxyError {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        ProxyError::UpstreamUnreachable {
            cluster_id: self.cluster_id,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::NewClusterConnection;
    use crate::proxy::operation::rabbitmq;

    fn connection(api_url: &str) -> ClusterConnection {
        ClusterConnection::from_new(NewClusterConnection {
            name: "test".to_string(),
            api_url: api_url.to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            is_active: true,
            description: None,
        })
    }

    #[test]
    fn api_root_normalization() {
        assert_eq!(
            management_api_root("http://rabbit:15672").unwrap().as_str(),
            "http://rabbit:15672/api"
        );
        assert_eq!(
            management_api_root("http://rabbit:15672/").unwrap().as_str(),
            "http://rabbit:15672/api"
        );
        assert_eq!(
            management_api_root("https://rabbit/api/").unwrap().as_str(),
            "https://rabbit/api"
        );
        assert_eq!(
            management_api_root("https://proxy.local/rabbitmq?x=1").unwrap().as_str(),
            "https://proxy.local/rabbitmq/api"
        );
    }

    #[test]
    fn api_root_rejects_non_http() {
        assert!(management_api_root("amqp://rabbit:5672").is_err());
        assert!(management_api_root("rabbit:15672").is_err());
        assert!(management_api_root("").is_err());
    }

    #[test]
    fn url_for_encodes_vhost_segment() {
        let client = UpstreamClient::build(&connection("http://rabbit:15672"), &AppConfig::development().upstream).unwrap();
        let url = client.url_for(&rabbitmq::queue("/", "orders.eu")).unwrap();
        assert_eq!(url.as_str(), "http://rabbit:15672/api/queues/%2F/orders.eu");

        let url = client
            .url_for(&rabbitmq::queues(None).with_query([("page", "2"), ("name", "a b")]))
            .unwrap();
        assert_eq!(url.as_str(), "http://rabbit:15672/api/queues?page=2&name=a+b");
    }

    #[test]
    fn fingerprint_tracks_endpoint_and_credential() {
        let a = connection("http://rabbit:15672");
        let mut b = a.clone();
        assert_eq!(UpstreamClient::fingerprint_of(&a), UpstreamClient::fingerprint_of(&b));
        b.password = "other".to_string();
        assert_ne!(UpstreamClient::fingerprint_of(&a), UpstreamClient::fingerprint_of(&b));
        let mut c = a.clone();
        c.description = Some("ignored".to_string());
        assert_eq!(UpstreamClient::fingerprint_of(&a), UpstreamClient::fingerprint_of(&c));
    }

    #[test]
    fn debug_output_hides_password() {
        let mut conn = connection("http://rabbit:15672");
        conn.password = "s3cret-value".to_string();
        let client = UpstreamClient::build(&conn, &AppConfig::development().upstream).unwrap();
        assert!(!format!("{:?}", client).contains("s3cret-value"));
    }
}
