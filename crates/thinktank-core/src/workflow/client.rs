use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::types::{ChatRequest, PingResponse, ProjectStatus, WorkflowResponse};
use super::WorkflowApi;
use crate::error::{Error, Result};

/// HTTP client for the workflow service
#[derive(Clone)]
pub struct WorkflowClient {
    client: Client,
    base_url: String,
}

impl WorkflowClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client whose requests fail with a transport error after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send_chat(&self, message: &str) -> Result<WorkflowResponse> {
        let url = format!("{}/workflow/chat", self.base_url);
        debug!(%url, chars = message.chars().count(), "sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let response = check_status(response, "Workflow chat").await?;
        let body: WorkflowResponse = response.json().await?;
        debug!(
            outputs = body.individual_outputs.len(),
            project_id = body.project_id.as_deref().unwrap_or("-"),
            "workflow responded"
        );
        Ok(body)
    }

    pub async fn project_status(&self, project_id: &str) -> Result<ProjectStatus> {
        let url = format!("{}/workflow/status/{}", self.base_url, project_id);
        debug!(%url, "fetching project status");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "Project status").await?;
        Ok(response.json().await?)
    }

    /// `GET /ping`, true when the service answers `{"status": "ok"}`.
    pub async fn ping(&self) -> Result<bool> {
        let url = format!("{}/ping", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "Ping").await?;
        let body: PingResponse = response.json().await?;
        Ok(body.status == "ok")
    }
}

#[async_trait]
impl WorkflowApi for WorkflowClient {
    async fn chat(&self, message: &str) -> Result<WorkflowResponse> {
        self.send_chat(message).await
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    warn!(%status, body = %text, "{} request failed", what);
    Err(Error::Transport(format!("{} request failed with status: {}", what, status)))
}
