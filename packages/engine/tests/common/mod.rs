use engine::{EngineConfig, OAuthCredentials, RestEngineClient};

pub fn client_for(server: &mockito::Server) -> RestEngineClient {
    RestEngineClient::new(EngineConfig::new(server.url())).unwrap()
}

pub fn authenticated_client_for(server: &mockito::Server) -> RestEngineClient {
    let credentials = OAuthCredentials::new("worker-id", "worker-secret")
        .with_authorization_server(format!("{}/oauth/token", server.url()));
    RestEngineClient::new(EngineConfig::new(server.url()).with_credentials(credentials)).unwrap()
}

pub fn token_body(token: &str) -> String {
    format!(
        r#"{{"access_token":"{}","token_type":"Bearer","expires_in":300}}"#,
        token
    )
}
