pub mod agents;
pub mod config;
pub mod error;
pub mod session;
pub mod simulation;
pub mod state;
pub mod workflow;

// Re-export main types for convenience
pub use agents::{Agent, AgentBoard, AgentKeyMatcher, AgentState, AgentStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use session::{SendOutcome, Session, TRANSPORT_APOLOGY};
pub use simulation::Simulation;
pub use state::{Message, MessageKind, NewProject, Sender};
pub use workflow::{ProjectStatus, WorkflowApi, WorkflowClient, WorkflowResponse};
