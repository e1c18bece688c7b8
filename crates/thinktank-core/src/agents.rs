//! The five fixed agents and the status board projected from workflow responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    ChiefMind,
    TaskPlanner,
    Researcher,
    PrdWriter,
    ToolFinder,
}

impl Agent {
    /// Display order of the status panel.
    pub const ALL: [Agent; 5] = [
        Agent::ChiefMind,
        Agent::TaskPlanner,
        Agent::Researcher,
        Agent::PrdWriter,
        Agent::ToolFinder,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Agent::ChiefMind => "ChiefMind",
            Agent::TaskPlanner => "TaskPlanner",
            Agent::Researcher => "Researcher",
            Agent::PrdWriter => "PRDWriter",
            Agent::ToolFinder => "ToolFinder",
        }
    }

    /// Lower-cased display name, the default key in `individual_outputs`.
    pub fn key(&self) -> &'static str {
        match self {
            Agent::ChiefMind => "chiefmind",
            Agent::TaskPlanner => "taskplanner",
            Agent::Researcher => "researcher",
            Agent::PrdWriter => "prdwriter",
            Agent::ToolFinder => "toolfinder",
        }
    }

    /// Case-insensitive lookup by display name or key.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|agent| agent.key() == lower)
    }

    /// Output keys the workflow service emits for this agent's tasks.
    fn task_keys(&self) -> &'static [&'static str] {
        match self {
            Agent::ChiefMind => &["requirements", "evaluation"],
            Agent::TaskPlanner => &["task_plan"],
            Agent::Researcher => &["market_research"],
            Agent::PrdWriter => &["prd"],
            Agent::ToolFinder => &["tool_selection"],
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Pending,
    Active,
    Completed,
}

impl AgentState {
    pub fn label(&self) -> &'static str {
        match self {
            AgentState::Pending => "pending",
            AgentState::Active => "running",
            AgentState::Completed => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStatus {
    pub agent: Agent,
    pub state: AgentState,
}

/// Maps `individual_outputs` keys onto agents.
///
/// Keys are compared lower-cased. Every agent always accepts its own key
/// (`chiefmind`, `prdwriter`, ...); the default table also accepts the task
/// keys the workflow service actually returns (`task_plan`, `prd`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentKeyMatcher {
    aliases: HashMap<Agent, Vec<String>>,
}

impl Default for AgentKeyMatcher {
    fn default() -> Self {
        let aliases = Agent::ALL
            .into_iter()
            .map(|agent| {
                let mut keys = vec![agent.key().to_string()];
                keys.extend(agent.task_keys().iter().map(|k| k.to_string()));
                (agent, keys)
            })
            .collect();
        Self { aliases }
    }
}

impl AgentKeyMatcher {
    /// Matcher that only accepts each agent's own key.
    pub fn names_only() -> Self {
        let aliases = Agent::ALL
            .into_iter()
            .map(|agent| (agent, vec![agent.key().to_string()]))
            .collect();
        Self { aliases }
    }

    /// Build from a config table of agent name to accepted keys.
    ///
    /// Agents missing from the table keep the default keys. Listing an agent
    /// replaces its task keys; its own key is always kept.
    pub fn from_table(table: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut matcher = Self::default();
        for (name, keys) in table {
            let agent = Agent::from_name(name)
                .ok_or_else(|| Error::Config(format!("unknown agent in agent_keys: {}", name)))?;
            let mut accepted = vec![agent.key().to_string()];
            for key in keys {
                let key = key.trim().to_lowercase();
                if !key.is_empty() && !accepted.contains(&key) {
                    accepted.push(key);
                }
            }
            matcher.aliases.insert(agent, accepted);
        }
        Ok(matcher)
    }

    pub fn keys_for(&self, agent: Agent) -> &[String] {
        self.aliases.get(&agent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `outputs` holds a non-empty entry under one of the agent's keys.
    pub fn matches(&self, agent: Agent, outputs: &Map<String, Value>) -> bool {
        let keys = self.keys_for(agent);
        outputs
            .iter()
            .any(|(key, value)| has_output(value) && keys.contains(&key.to_lowercase()))
    }
}

/// Empty strings, nulls, `false` and zero count as no output.
fn has_output(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Status of every agent, always in `Agent::ALL` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBoard {
    statuses: [AgentStatus; 5],
}

impl Default for AgentBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBoard {
    pub fn new() -> Self {
        Self {
            statuses: Agent::ALL.map(|agent| AgentStatus {
                agent,
                state: AgentState::Pending,
            }),
        }
    }

    pub fn statuses(&self) -> &[AgentStatus] {
        &self.statuses
    }

    pub fn state(&self, agent: Agent) -> AgentState {
        self.statuses
            .iter()
            .find(|s| s.agent == agent)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    pub fn set(&mut self, agent: Agent, state: AgentState) {
        if let Some(status) = self.statuses.iter_mut().find(|s| s.agent == agent) {
            status.state = state;
        }
    }

    pub fn set_all(&mut self, state: AgentState) {
        for status in &mut self.statuses {
            status.state = state;
        }
    }

    pub fn completed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| s.state == AgentState::Completed)
            .count()
    }

    /// Completed for agents with output, pending for the rest. Never sets `Active`.
    pub fn project(&mut self, outputs: &Map<String, Value>, matcher: &AgentKeyMatcher) {
        for status in &mut self.statuses {
            status.state = if matcher.matches(status.agent, outputs) {
                AgentState::Completed
            } else {
                AgentState::Pending
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_projection_marks_named_agents_completed() {
        let mut board = AgentBoard::new();
        board.project(
            &outputs(json!({"chiefmind": "goal analysis", "researcher": "market report"})),
            &AgentKeyMatcher::default(),
        );

        assert_eq!(board.state(Agent::ChiefMind), AgentState::Completed);
        assert_eq!(board.state(Agent::Researcher), AgentState::Completed);
        assert_eq!(board.state(Agent::TaskPlanner), AgentState::Pending);
        assert_eq!(board.state(Agent::PrdWriter), AgentState::Pending);
        assert_eq!(board.state(Agent::ToolFinder), AgentState::Pending);
    }

    #[test]
    fn test_projection_is_case_insensitive() {
        let mut board = AgentBoard::new();
        board.project(
            &outputs(json!({"PRDWriter": "prd", "ToolFinder": "tools"})),
            &AgentKeyMatcher::names_only(),
        );

        assert_eq!(board.state(Agent::PrdWriter), AgentState::Completed);
        assert_eq!(board.state(Agent::ToolFinder), AgentState::Completed);
        assert_eq!(board.completed_count(), 2);
    }

    #[test]
    fn test_projection_resets_missing_agents_to_pending() {
        let mut board = AgentBoard::new();
        board.set_all(AgentState::Active);
        board.set(Agent::TaskPlanner, AgentState::Completed);

        board.project(&outputs(json!({"researcher": "done"})), &AgentKeyMatcher::default());

        assert_eq!(board.state(Agent::TaskPlanner), AgentState::Pending);
        assert_eq!(board.state(Agent::ChiefMind), AgentState::Pending);
        assert_eq!(board.state(Agent::Researcher), AgentState::Completed);
    }

    #[test]
    fn test_empty_output_does_not_complete() {
        let mut board = AgentBoard::new();
        board.project(
            &outputs(json!({"chiefmind": "", "researcher": null, "taskplanner": "plan"})),
            &AgentKeyMatcher::default(),
        );

        assert_eq!(board.state(Agent::ChiefMind), AgentState::Pending);
        assert_eq!(board.state(Agent::Researcher), AgentState::Pending);
        assert_eq!(board.state(Agent::TaskPlanner), AgentState::Completed);
    }

    #[test]
    fn test_default_matcher_accepts_service_task_keys() {
        let mut board = AgentBoard::new();
        board.project(
            &outputs(json!({
                "requirements": "r",
                "task_plan": "t",
                "market_research": "m",
                "prd": "p",
                "tool_selection": "s",
                "evaluation": "e"
            })),
            &AgentKeyMatcher::default(),
        );

        assert_eq!(board.completed_count(), 5);
    }

    #[test]
    fn test_names_only_matcher_ignores_task_keys() {
        let mut board = AgentBoard::new();
        board.project(&outputs(json!({"task_plan": "t"})), &AgentKeyMatcher::names_only());
        assert_eq!(board.completed_count(), 0);
    }

    #[test]
    fn test_matcher_from_table() {
        let mut table = HashMap::new();
        table.insert("PRDWriter".to_string(), vec!["Product_Doc".to_string()]);
        let matcher = AgentKeyMatcher::from_table(&table).unwrap();

        assert_eq!(matcher.keys_for(Agent::PrdWriter), ["prdwriter", "product_doc"]);
        assert!(matcher.matches(Agent::PrdWriter, &outputs(json!({"product_doc": "x"}))));
        assert!(!matcher.matches(Agent::PrdWriter, &outputs(json!({"prd": "x"}))));
        // Untouched agents keep the defaults.
        assert!(matcher.matches(Agent::TaskPlanner, &outputs(json!({"task_plan": "x"}))));
    }

    #[test]
    fn test_matcher_rejects_unknown_agent() {
        let mut table = HashMap::new();
        table.insert("Designer".to_string(), vec!["design".to_string()]);
        let err = AgentKeyMatcher::from_table(&table).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_agent_from_name() {
        assert_eq!(Agent::from_name("PRDWriter"), Some(Agent::PrdWriter));
        assert_eq!(Agent::from_name(" chiefmind "), Some(Agent::ChiefMind));
        assert_eq!(Agent::from_name("nobody"), None);
    }
}
