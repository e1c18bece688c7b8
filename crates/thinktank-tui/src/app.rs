use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use thinktank_core::simulation::STEP_INTERVAL;
use thinktank_core::{
    Error, NewProject, SendOutcome, Session, Simulation, WorkflowApi, WorkflowResponse,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::tui::AppEvent;

/// Shown by the project-list shortcut until the service has a projects API.
pub const PROJECTS_UNAVAILABLE: &str = "Project management is still in development.";

/// Each project runs one task per agent.
pub const PROJECT_TASK_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    NewProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Name,
    Description,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub field: FormField,
    /// Inline validation message
    pub error: Option<String>,
}

impl ProjectForm {
    pub fn field_mut(&mut self) -> &mut String {
        match self.field {
            FormField::Name => &mut self.name,
            FormField::Description => &mut self.description,
        }
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Description,
            FormField::Description => FormField::Name,
        };
    }
}

pub struct App {
    pub should_quit: bool,
    pub overlay: Overlay,

    // Conversation
    pub session: Session,
    pub api: Arc<dyn WorkflowApi>,
    pub api_url: String,
    events: UnboundedSender<AppEvent>,

    // Input state
    pub input: String,
    pub input_cursor: usize,

    // Chat scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat pane, set during render
    pub chat_width: u16,  // Inner width of the chat pane, set during render

    // Project popup and info panel
    pub project_form: ProjectForm,
    pub project_updated_at: Option<DateTime<Local>>,

    /// One-line notice in the footer, cleared on the next key press
    pub notice: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Demo simulation and the time of its last step
    pub simulation: Option<(Simulation, Instant)>,
}

impl App {
    pub fn new(
        session: Session,
        api: Arc<dyn WorkflowApi>,
        api_url: String,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            overlay: Overlay::None,

            session,
            api,
            api_url,
            events,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            project_form: ProjectForm::default(),
            project_updated_at: None,

            notice: None,
            animation_frame: 0,
            simulation: None,
        }
    }

    /// Send the input line. Ignored while a request is in flight; the input is
    /// kept in that case so nothing typed is lost.
    pub fn submit_input(&mut self) {
        let Some(message) = self.session.begin_send(&self.input) else {
            return;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.scroll_to_bottom();

        // The reply projects onto the same board the demo walks
        if self.simulation.take().is_some() {
            info!("workflow simulation cancelled by a send");
        }

        let api = Arc::clone(&self.api);
        let tx = self.events.clone();
        tokio::spawn(async move {
            // Run the call on its own task so a panic still produces a result
            // and the session's in-flight flag is always released.
            let result = match tokio::spawn(async move { api.chat(&message).await }).await {
                Ok(result) => result,
                Err(err) => Err(Error::Transport(format!("workflow task failed: {}", err))),
            };
            if tx.send(AppEvent::Workflow(result)).is_err() {
                debug!("event loop closed before the workflow reply arrived");
            }
        });
    }

    pub fn apply_workflow_result(&mut self, result: thinktank_core::Result<WorkflowResponse>) {
        if let SendOutcome::Replied {
            project_id: Some(id),
        } = self.session.finish_send(result)
        {
            info!(project_id = %id, "project updated");
            self.project_updated_at = Some(Local::now());
        }
        self.scroll_to_bottom();
    }

    pub fn open_project_form(&mut self) {
        self.overlay = Overlay::NewProject;
    }

    /// Close the popup and reset the form.
    pub fn close_project_form(&mut self) {
        self.overlay = Overlay::None;
        self.project_form = ProjectForm::default();
    }

    pub fn submit_project_form(&mut self) {
        let project = NewProject {
            name: self.project_form.name.clone(),
            description: self.project_form.description.clone(),
        };

        match self.session.create_project(&project) {
            Ok(()) => {
                self.close_project_form();
                self.scroll_to_bottom();
            }
            Err(err) => {
                let message = match err {
                    Error::Validation(msg) => msg,
                    other => format!("Could not create project: {}", other),
                };
                self.project_form.error = Some(message);
            }
        }
    }

    pub fn show_projects_notice(&mut self) {
        self.notice = Some(PROJECTS_UNAVAILABLE.to_string());
    }

    /// Start the demo walk unless one is already running or a request is in flight.
    pub fn start_simulation(&mut self, now: Instant) {
        if self.simulation.is_none() && !self.session.is_processing() {
            info!("starting workflow simulation");
            self.simulation = Some((Simulation::new(), now));
        }
    }

    /// Called on every Tick event.
    pub fn tick(&mut self, now: Instant) {
        if self.session.is_processing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        if let Some((sim, last_step)) = self.simulation.as_mut() {
            if now.duration_since(*last_step) >= STEP_INTERVAL {
                *last_step = now;
                if !sim.advance(self.session.board_mut()) || sim.is_finished() {
                    self.simulation = None;
                }
            }
        }
    }

    pub fn project_status_label(&self) -> &'static str {
        if self.session.current_project_id().is_some() {
            "in progress"
        } else {
            "not started"
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.chat_line_count().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    pub fn half_page(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    /// Scroll so the newest message (or the typing indicator) is visible.
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.chat_line_count();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Wrapped line count of the chat pane, matching what `ui` renders.
    fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: usize = 0;
        for msg in self.session.messages() {
            total += 1; // Sender line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Character count, not byte length, for UTF-8 text
                let char_count = line.chars().count();
                total += char_count.div_ceil(wrap_width).max(1);
            }
            total += 1; // Blank line after message
        }

        if self.session.is_processing() {
            total += 2; // "AI:" + "Thinking..."
        }

        total.min(u16::MAX as usize) as u16
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use thinktank_core::{Agent, AgentState, MessageKind};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    pub(crate) struct StubApi {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl WorkflowApi for StubApi {
        async fn chat(&self, message: &str) -> thinktank_core::Result<WorkflowResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Transport("connection refused".to_string()));
            }
            Ok(WorkflowResponse {
                workflow_result: format!("echo: {}", message),
                individual_outputs: json!({"taskplanner": "plan"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                project_id: Some("1".to_string()),
            })
        }
    }

    pub(crate) fn test_app(fail: bool) -> (App, Arc<StubApi>, UnboundedReceiver<AppEvent>) {
        let api = Arc::new(StubApi {
            calls: AtomicUsize::new(0),
            fail,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            Session::new(),
            api.clone(),
            "http://localhost:8000".to_string(),
            tx,
        );
        (app, api, rx)
    }

    async fn next_workflow(rx: &mut UnboundedReceiver<AppEvent>) -> thinktank_core::Result<WorkflowResponse> {
        match rx.recv().await {
            Some(AppEvent::Workflow(result)) => result,
            other => panic!("expected a workflow event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let (mut app, api, mut rx) = test_app(false);
        app.input = "Build a blog".to_string();
        app.input_cursor = 12;

        app.submit_input();
        assert!(app.session.is_processing());
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);

        let result = next_workflow(&mut rx).await;
        app.apply_workflow_result(result);

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!app.session.is_processing());
        assert_eq!(app.session.messages().len(), 2);
        assert_eq!(app.session.messages()[1].content, "echo: Build a blog");
        assert_eq!(app.session.board().state(Agent::TaskPlanner), AgentState::Completed);
        assert!(app.project_updated_at.is_some());
        assert_eq!(app.project_status_label(), "in progress");
    }

    #[tokio::test]
    async fn test_submit_while_processing_keeps_input() {
        let (mut app, api, mut rx) = test_app(false);
        app.input = "first".to_string();
        app.submit_input();

        app.input = "second".to_string();
        app.submit_input();
        assert_eq!(app.input, "second");
        assert_eq!(app.session.messages().len(), 1);

        let result = next_workflow(&mut rx).await;
        app.apply_workflow_result(result);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_request_shows_error_message() {
        let (mut app, _api, mut rx) = test_app(true);
        app.input = "hello".to_string();
        app.submit_input();

        let result = next_workflow(&mut rx).await;
        app.apply_workflow_result(result);

        let messages = app.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].kind, MessageKind::Error);
        assert!(!app.session.is_processing());
        assert!(app.project_updated_at.is_none());
    }

    #[tokio::test]
    async fn test_project_form_validation_is_inline() {
        let (mut app, api, _rx) = test_app(false);
        app.open_project_form();
        app.project_form.description = "x".to_string();

        app.submit_project_form();

        assert_eq!(app.overlay, Overlay::NewProject);
        assert!(app.project_form.error.is_some());
        assert!(app.session.messages().is_empty());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_project_form_submit_acknowledges_and_resets() {
        let (mut app, api, _rx) = test_app(false);
        app.open_project_form();
        app.project_form.name = "Alpha".to_string();
        app.project_form.description = "desc".to_string();

        app.submit_project_form();

        assert_eq!(app.overlay, Overlay::None);
        assert!(app.project_form.name.is_empty());
        assert_eq!(app.session.messages().len(), 1);
        assert!(app.session.messages()[0].content.contains("Alpha"));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_simulation_steps_on_ticks() {
        let (mut app, _api, _rx) = test_app(false);
        let start = Instant::now();
        app.start_simulation(start);

        // Too early for a step
        app.tick(start + Duration::from_millis(300));
        assert_eq!(app.session.board().state(Agent::ChiefMind), AgentState::Pending);

        for step in 1..=6u32 {
            app.tick(start + STEP_INTERVAL * step);
        }

        assert!(app.simulation.is_none());
        assert_eq!(app.session.board().completed_count(), 5);
    }

    #[tokio::test]
    async fn test_send_cancels_running_simulation() {
        let (mut app, _api, mut rx) = test_app(false);
        let start = Instant::now();
        app.start_simulation(start);
        app.tick(start + STEP_INTERVAL);
        assert_eq!(app.session.board().state(Agent::ChiefMind), AgentState::Active);

        app.input = "plan".to_string();
        app.submit_input();
        assert!(app.simulation.is_none());

        let result = next_workflow(&mut rx).await;
        app.apply_workflow_result(result);
        app.tick(start + STEP_INTERVAL * 2);

        // Only the reply's projection remains on the board
        assert_eq!(app.session.board().state(Agent::TaskPlanner), AgentState::Completed);
        assert_eq!(app.session.board().state(Agent::ChiefMind), AgentState::Pending);
        assert_eq!(app.session.board().completed_count(), 1);
    }

    #[tokio::test]
    async fn test_simulation_not_started_while_processing() {
        let (mut app, _api, mut rx) = test_app(false);
        app.input = "plan".to_string();
        app.submit_input();

        app.start_simulation(Instant::now());
        assert!(app.simulation.is_none());

        let result = next_workflow(&mut rx).await;
        app.apply_workflow_result(result);
        app.start_simulation(Instant::now());
        assert!(app.simulation.is_some());
    }

    #[tokio::test]
    async fn test_scroll_to_bottom_with_small_pane() {
        let (mut app, _api, _rx) = test_app(false);
        app.chat_height = 4;
        app.chat_width = 100;
        for i in 0..5 {
            app.session
                .create_project(&NewProject {
                    name: format!("P{}", i),
                    description: String::new(),
                })
                .unwrap();
        }

        app.scroll_to_bottom();
        // Each acknowledgement fits on one line: sender, text, blank
        assert_eq!(app.chat_scroll, 15 - 4);

        app.scroll_up(100);
        assert_eq!(app.chat_scroll, 0);
        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 11);
    }
}
