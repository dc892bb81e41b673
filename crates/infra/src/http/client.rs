use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use oncovista_common::AttemptError;
use oncovista_core::RecommendationService;
use oncovista_domain::constants::{DEFAULT_PERFORMANCE_STATUS, RECOMMENDATION_PATH};
use oncovista_domain::{
    OncoVistaError, RecommendationRequest, RemoteConfig, RemoteRecommendationResponse,
    TreatmentQuery,
};
use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::errors::{attempt_error, InfraError};

const MAX_ERROR_BODY: usize = 256;

/// reqwest adapter for the remote recommendation service.
///
/// Makes exactly one request per call; retries, backoff and the circuit
/// breaker live in the engine.
#[derive(Debug, Clone)]
pub struct HttpRecommendationClient {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    default_performance_status: u8,
}

impl HttpRecommendationClient {
    /// Start building a new client.
    pub fn builder(base_url: impl Into<String>) -> HttpRecommendationClientBuilder {
        HttpRecommendationClientBuilder::new(base_url)
    }

    /// Client for `config` with the given per-request timeout.
    pub fn from_config(config: &RemoteConfig, timeout: Duration) -> Result<Self, OncoVistaError> {
        Self::builder(&config.base_url)
            .timeout(timeout)
            .default_performance_status(config.default_performance_status)
            .build()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_for(&self, query: &TreatmentQuery) -> RecommendationRequest {
        let mut request = RecommendationRequest::from_query(query, Uuid::new_v4(), Utc::now());
        if query.performance_status.is_none() {
            request.performance_status = self.default_performance_status;
        }
        request
    }
}

#[async_trait]
impl RecommendationService for HttpRecommendationClient {
    #[instrument(skip_all, fields(query = %query.label()))]
    async fn call(&self, query: &TreatmentQuery) -> Result<RemoteRecommendationResponse, AttemptError> {
        let request = self.request_for(query);
        debug!(url = %self.endpoint, session_id = %request.session_id, "sending recommendation request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| attempt_error(&err, self.timeout))?;

        let status = response.status();
        debug!(%status, "received recommendation response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::http(Some(status.as_u16()), truncate(&body)));
        }

        response.json::<RemoteRecommendationResponse>().await.map_err(|err| {
            if err.is_timeout() {
                attempt_error(&err, self.timeout)
            } else {
                AttemptError::http(Some(status.as_u16()), format!("invalid response body: {err}"))
            }
        })
    }
}

fn truncate(body: &str) -> String {
    if body.is_empty() {
        return "empty error body".to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Builder for [`HttpRecommendationClient`].
#[derive(Debug)]
pub struct HttpRecommendationClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    default_performance_status: u8,
}

impl HttpRecommendationClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_performance_status: DEFAULT_PERFORMANCE_STATUS,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// ECOG status sent when the query leaves it unset.
    pub fn default_performance_status(mut self, status: u8) -> Self {
        self.default_performance_status = status;
        self
    }

    pub fn build(self) -> Result<HttpRecommendationClient, OncoVistaError> {
        let endpoint = endpoint_for(&self.base_url).map_err(OncoVistaError::from)?;

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(|err| OncoVistaError::from(InfraError::from(err)))?;

        Ok(HttpRecommendationClient {
            client,
            endpoint,
            timeout: self.timeout,
            default_performance_status: self.default_performance_status,
        })
    }
}

fn endpoint_for(base_url: &str) -> Result<Url, InfraError> {
    let mut base = Url::parse(base_url.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(RECOMMENDATION_PATH.trim_start_matches('/'))?)
}
