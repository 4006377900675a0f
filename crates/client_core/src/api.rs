//! Request/response calls against the agent backend.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{RunConfig, SelectorSet},
    error::BackendErrorBody,
    protocol::StartRunResponse,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::Settings;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum AgentApiError {
    #[error("unauthorized")]
    Unauthorized { detail: Option<String> },
    #[error("backend rejected request with status {status}")]
    Rejected { status: u16, detail: Option<String> },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl AgentApiError {
    /// Message supplied by the backend, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AgentApiError::Unauthorized { detail } | AgentApiError::Rejected { detail, .. } => {
                detail.as_deref()
            }
            AgentApiError::Transport(_) | AgentApiError::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AgentApiError::Unauthorized { .. })
    }
}

#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn start_run(&self, config: &RunConfig) -> Result<StartRunResponse, AgentApiError>;
    async fn fetch_selectors(&self, api_key: &str) -> Result<SelectorSet, AgentApiError>;
    async fn save_selectors(
        &self,
        api_key: &str,
        selectors: &SelectorSet,
    ) -> Result<SelectorSet, AgentApiError>;
}

pub struct HttpAgentApi {
    http: Client,
    backend_url: String,
}

impl HttpAgentApi {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            backend_url: backend_url.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AgentApiError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            backend_url: settings.backend_url.clone(),
        })
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn start_run(&self, config: &RunConfig) -> Result<StartRunResponse, AgentApiError> {
        let res = self
            .http
            .post(format!("{}/agent/start", self.backend_url))
            .json(config)
            .send()
            .await?;
        let body: StartRunResponse = read_json(res).await?;
        info!(
            max_posts = config.max_posts_to_process,
            auto_like = config.auto_like,
            auto_comment = config.auto_comment,
            "agent run accepted"
        );
        Ok(body)
    }

    async fn fetch_selectors(&self, api_key: &str) -> Result<SelectorSet, AgentApiError> {
        let res = self
            .http
            .get(format!("{}/admin/selectors", self.backend_url))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;
        read_json(res).await
    }

    async fn save_selectors(
        &self,
        api_key: &str,
        selectors: &SelectorSet,
    ) -> Result<SelectorSet, AgentApiError> {
        let res = self
            .http
            .post(format!("{}/admin/selectors", self.backend_url))
            .header(API_KEY_HEADER, api_key)
            .json(selectors)
            .send()
            .await?;
        read_json(res).await
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, AgentApiError> {
    let status = res.status();
    let url = res.url().path().to_string();
    if !status.is_success() {
        let detail = res
            .json::<BackendErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail_text());
        warn!(%url, status = status.as_u16(), ?detail, "backend request failed");
        if status == StatusCode::UNAUTHORIZED {
            return Err(AgentApiError::Unauthorized { detail });
        }
        return Err(AgentApiError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    let bytes = res.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| AgentApiError::Decode(err.to_string()))
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
