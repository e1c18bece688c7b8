pub mod client;
pub mod types;

pub use client::WorkflowClient;
pub use types::{ProjectStatus, WorkflowResponse};

use async_trait::async_trait;

use crate::error::Result;

/// The external workflow service, as seen by the session controller.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// `POST /workflow/chat`
    async fn chat(&self, message: &str) -> Result<WorkflowResponse>;
}
