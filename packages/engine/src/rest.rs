//! Engine client over the gateway's REST job API.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use worker_core::{ActivatedJob, JobKey, Variables};

use crate::auth::TokenProvider;
use crate::client::{ActivateJobsRequest, ActivateJobsResponse, EngineClient, EngineError, Topology};
use crate::config::EngineConfig;

/// REST engine client.
pub struct RestEngineClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Option<TokenProvider>,
}

impl RestEngineClient {
    /// Build a client from `config`. Does not contact the gateway.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.address.is_empty() {
            return Err(EngineError::InvalidConfig("gateway address is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let tokens = config
            .credentials
            .map(|credentials| TokenProvider::new(http.clone(), credentials));

        Ok(Self {
            http,
            base_url: config.address,
            tokens,
        })
    }

    /// Gateway base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, EngineError> {
        match &self.tokens {
            Some(tokens) => Ok(request.bearer_auth(tokens.token().await?)),
            None => Ok(request),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, EngineError> {
        let response = self.authorize(request).await?.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED
            && let Some(tokens) = &self.tokens
        {
            tokens.invalidate().await;
        }

        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, EngineError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }
}

impl EngineClient for RestEngineClient {
    async fn topology(&self) -> Result<Topology, EngineError> {
        let response = self.send(self.http.get(self.url("topology"))).await?;
        Ok(response.json().await?)
    }

    async fn activate_jobs(
        &self,
        request: ActivateJobsRequest,
    ) -> Result<Vec<ActivatedJob>, EngineError> {
        let response = self.post_json("jobs/activation", &request).await?;
        let body: ActivateJobsResponse = response.json().await?;
        Ok(body.jobs)
    }

    async fn complete_job(&self, job_key: &JobKey, variables: Variables) -> Result<(), EngineError> {
        self.post_json(
            &format!("jobs/{}/completion", job_key),
            &json!({ "variables": variables }),
        )
        .await?;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_key: &JobKey,
        retries: i32,
        error_message: &str,
    ) -> Result<(), EngineError> {
        self.post_json(
            &format!("jobs/{}/failure", job_key),
            &json!({ "retries": retries, "errorMessage": error_message }),
        )
        .await?;
        Ok(())
    }
}
