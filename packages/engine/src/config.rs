//! Engine connection configuration.

use std::time::Duration;

/// Default OAuth token endpoint for SaaS clusters.
pub const DEFAULT_AUTHORIZATION_SERVER_URL: &str = "https://login.cloud.camunda.io/oauth/token";

/// Default token audience for SaaS clusters.
pub const DEFAULT_TOKEN_AUDIENCE: &str = "zeebe.camunda.io";

/// Engine connection configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// REST gateway base URL, e.g. `http://localhost:8080`.
    pub address: String,
    /// OAuth client credentials, if the gateway requires them.
    pub credentials: Option<OAuthCredentials>,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Create a config for a gateway at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            credentials: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create a config for a SaaS cluster.
    pub fn saas(cluster_id: &str, region: &str) -> Self {
        Self::new(format!("https://{region}.zeebe.camunda.io/{cluster_id}"))
    }

    /// Set OAuth client credentials.
    pub fn with_credentials(mut self, credentials: OAuthCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// OAuth client-credentials grant parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_server_url: String,
    pub audience: String,
}

impl OAuthCredentials {
    /// Credentials against the SaaS authorization server.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_server_url: DEFAULT_AUTHORIZATION_SERVER_URL.to_string(),
            audience: DEFAULT_TOKEN_AUDIENCE.to_string(),
        }
    }

    pub fn with_authorization_server(mut self, url: impl Into<String>) -> Self {
        self.authorization_server_url = url.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_server_url", &self.authorization_server_url)
            .field("audience", &self.audience)
            .finish()
    }
}
