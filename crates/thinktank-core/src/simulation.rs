//! Demo walk through the agents, for showing the status panel without a backend.

use std::time::Duration;

use crate::agents::{Agent, AgentBoard, AgentState};

/// Time between simulation steps.
pub const STEP_INTERVAL: Duration = Duration::from_secs(2);

/// One step per interval: each agent in turn becomes active (earlier ones stay
/// active), then a final step marks all of them completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Simulation {
    next: usize,
    finished: bool,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply the next step to `board`. Returns false once the walk is over.
    pub fn advance(&mut self, board: &mut AgentBoard) -> bool {
        if self.finished {
            return false;
        }

        match Agent::ALL.get(self.next) {
            Some(&agent) => {
                board.set(agent, AgentState::Active);
                self.next += 1;
            }
            None => {
                board.set_all(AgentState::Completed);
                self.finished = true;
            }
        }
        true
    }

    /// Drive the whole walk on a timer, calling `on_step` after every step.
    pub async fn run<F>(mut self, board: &mut AgentBoard, mut on_step: F)
    where
        F: FnMut(&AgentBoard),
    {
        let mut interval = tokio::time::interval(STEP_INTERVAL);
        // The first tick completes immediately; steps start one interval in.
        interval.tick().await;
        loop {
            interval.tick().await;
            if !self.advance(board) {
                break;
            }
            on_step(board);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agents_activate_in_order() {
        let mut board = AgentBoard::new();
        let mut sim = Simulation::new();

        assert!(sim.advance(&mut board));
        assert_eq!(board.state(Agent::ChiefMind), AgentState::Active);
        assert_eq!(board.state(Agent::TaskPlanner), AgentState::Pending);

        assert!(sim.advance(&mut board));
        assert_eq!(board.state(Agent::ChiefMind), AgentState::Active);
        assert_eq!(board.state(Agent::TaskPlanner), AgentState::Active);
        assert_eq!(board.state(Agent::Researcher), AgentState::Pending);
    }

    #[test]
    fn test_final_step_completes_everything() {
        let mut board = AgentBoard::new();
        let mut sim = Simulation::new();

        for _ in 0..Agent::ALL.len() {
            assert!(sim.advance(&mut board));
        }
        assert!(board.statuses().iter().all(|s| s.state == AgentState::Active));
        assert!(!sim.is_finished());

        assert!(sim.advance(&mut board));
        assert!(sim.is_finished());
        assert_eq!(board.completed_count(), 5);

        assert!(!sim.advance(&mut board));
        assert_eq!(board.completed_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_takes_six_steps() {
        let mut board = AgentBoard::new();
        let mut steps = Vec::new();
        let started = tokio::time::Instant::now();

        Simulation::new()
            .run(&mut board, |b| steps.push(b.completed_count()))
            .await;

        assert_eq!(steps, vec![0, 0, 0, 0, 0, 5]);
        assert_eq!(board.completed_count(), 5);
        assert!(started.elapsed() >= STEP_INTERVAL * 6);
    }
}
