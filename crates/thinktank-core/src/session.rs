//! Chat session controller
//!
//! Owns the conversation log, the in-flight flag, the current project id and
//! the agent board. Front-ends hold one `Session` and pass it around; nothing
//! here is global.

use tracing::{debug, info, warn};

use crate::agents::{AgentBoard, AgentKeyMatcher};
use crate::error::{Error, Result};
use crate::state::{Message, NewProject};
use crate::workflow::{WorkflowApi, WorkflowResponse};

/// Shown in place of a reply when the workflow call fails.
pub const TRANSPORT_APOLOGY: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input, or another send was already in flight.
    Ignored,
    Replied { project_id: Option<String> },
    Failed,
}

#[derive(Debug, Default)]
pub struct Session {
    messages: Vec<Message>,
    is_processing: bool,
    current_project_id: Option<String>,
    board: AgentBoard,
    matcher: AgentKeyMatcher,
}

/// Holds the in-flight flag for one send. Dropping it releases the flag, so a
/// cancelled or panicking send never leaves the session stuck.
struct InFlight<'a> {
    session: &'a mut Session,
}

impl InFlight<'_> {
    fn complete(self, result: Result<WorkflowResponse>) -> SendOutcome {
        self.session.finish_send(result)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.is_processing = false;
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matcher(matcher: AgentKeyMatcher) -> Self {
        Self {
            matcher,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    pub fn board(&self) -> &AgentBoard {
        &self.board
    }

    /// For the demo simulator, which drives the board directly.
    pub fn board_mut(&mut self) -> &mut AgentBoard {
        &mut self.board
    }

    /// Send one message and apply the reply. The in-flight flag is released on
    /// every exit path, including cancellation of this future.
    pub async fn send_message<A>(&mut self, api: &A, text: &str) -> SendOutcome
    where
        A: WorkflowApi + ?Sized,
    {
        let Some(message) = self.begin_send(text) else {
            return SendOutcome::Ignored;
        };

        let flight = InFlight { session: self };
        let result = api.chat(&message).await;
        flight.complete(result)
    }

    /// First half of a send for callers that run the request elsewhere.
    ///
    /// Appends the user message and raises the in-flight flag. Returns the
    /// trimmed text to send, or `None` when the input is empty or a send is
    /// already in flight; nothing changes in that case.
    pub fn begin_send(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.is_processing {
            debug!("send ignored, another request is in flight");
            return None;
        }

        self.messages.push(Message::user(text));
        self.is_processing = true;
        Some(text.to_string())
    }

    /// Second half of a send: append the reply (or the apology), project the
    /// agent outputs, and release the in-flight flag.
    pub fn finish_send(&mut self, result: Result<WorkflowResponse>) -> SendOutcome {
        if !self.is_processing {
            warn!("workflow result arrived with no send in flight, dropping it");
            return SendOutcome::Ignored;
        }

        let outcome = match result {
            Ok(response) => {
                self.messages.push(Message::assistant(response.workflow_result));
                self.project_agent_statuses(&response.individual_outputs);
                if let Some(id) = &response.project_id {
                    self.current_project_id = Some(id.clone());
                }
                SendOutcome::Replied {
                    project_id: response.project_id,
                }
            }
            Err(err) => {
                warn!(error = %err, "workflow call failed");
                self.messages.push(Message::error(TRANSPORT_APOLOGY));
                SendOutcome::Failed
            }
        };

        self.is_processing = false;
        outcome
    }

    pub fn project_agent_statuses(&mut self, outputs: &serde_json::Map<String, serde_json::Value>) {
        self.board.project(outputs, &self.matcher);
    }

    /// Acknowledge a new project. Nothing is persisted and no request is made.
    pub fn create_project(&mut self, project: &NewProject) -> Result<()> {
        let name = project.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Please enter a project name".to_string()));
        }

        info!(name, description = %project.description, "project created");
        self.messages.push(Message::assistant(format!(
            "Project \"{}\" created! You can now describe your project requirements.",
            name
        )));
        Ok(())
    }
}
