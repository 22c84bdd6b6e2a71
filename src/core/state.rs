// core/state.rs

// Run lifecycle as a finite state machine. Transitions are pure: given the
// current state and an input they return the next state and the events to
// record, so the supervisor stays a thin shell around this table.

use std::fmt;
use thiserror::Error;

use crate::planning::PlanningError;

/// Named milestones and failures written to the run event log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunEventKind {
    /// Initial pose installed, run started
    RunStart,
    /// A navigation goal was dispatched
    TargetPoseSet,
    /// Every goal of the run was dispatched
    RunCompleted,
    /// Pruning left fewer than two nodes
    InsufficientNodes,
    /// Tour construction found the cost table inconsistent
    InconsistentCostTable,
    /// Graph data was unusable (bad weights or references)
    InvalidGraph,
    /// Navigation interface not available in time
    FailedToCommunicate,
    /// No goal left to dispatch
    InsufficientPoses,
    /// Interrupt received
    RosShutdown,
    /// Run exceeded its time bound
    RunTimeout,
    /// Supervisor is done after an abnormal end
    SupervisorFinished,
}

impl RunEventKind {
    /// Event name as written to `run_events.csv`
    pub fn name(&self) -> &'static str {
        match self {
            RunEventKind::RunStart => "run_start",
            RunEventKind::TargetPoseSet => "target_pose_set",
            RunEventKind::RunCompleted => "run_completed",
            RunEventKind::InsufficientNodes => {
                "insufficient_number_of_nodes_in_deleaved_reduced_voronoi_graph"
            }
            RunEventKind::InconsistentCostTable => "traversal_path_cost_table_inconsistent",
            RunEventKind::InvalidGraph => "invalid_traversal_graph",
            RunEventKind::FailedToCommunicate => "failed_to_communicate_with_navigation_node",
            RunEventKind::InsufficientPoses => "insufficient_number_of_poses_in_traversal_path",
            RunEventKind::RosShutdown => "ros_shutdown",
            RunEventKind::RunTimeout => "run_timeout",
            RunEventKind::SupervisorFinished => "supervisor_finished",
        }
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a run ended in [`RunState::Failed`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FailureReason {
    InsufficientNodes,
    InconsistentCostTable,
    InvalidGraph,
    NavigationUnavailable,
    GoalPoolExhausted,
    Interrupted,
    RunTimeout,
    /// Run could not be started after planning succeeded
    SetupFailed,
}

impl FailureReason {
    /// Closing events recorded when the run fails for this reason
    pub fn events(&self) -> Vec<RunEventKind> {
        match self {
            FailureReason::InsufficientNodes => vec![RunEventKind::InsufficientNodes],
            FailureReason::InconsistentCostTable => vec![RunEventKind::InconsistentCostTable],
            FailureReason::InvalidGraph => vec![RunEventKind::InvalidGraph],
            FailureReason::NavigationUnavailable => vec![RunEventKind::FailedToCommunicate],
            FailureReason::GoalPoolExhausted => vec![RunEventKind::InsufficientPoses],
            FailureReason::Interrupted => {
                vec![RunEventKind::RosShutdown, RunEventKind::SupervisorFinished]
            }
            FailureReason::RunTimeout => {
                vec![RunEventKind::RunTimeout, RunEventKind::SupervisorFinished]
            }
            FailureReason::SetupFailed => vec![RunEventKind::SupervisorFinished],
        }
    }
}

impl From<&PlanningError> for FailureReason {
    fn from(error: &PlanningError) -> Self {
        match error {
            PlanningError::InsufficientNodes { .. } => FailureReason::InsufficientNodes,
            PlanningError::TourInconsistency { .. } => FailureReason::InconsistentCostTable,
            PlanningError::UnknownStart(_) | PlanningError::Graph(_) => FailureReason::InvalidGraph,
        }
    }
}

/// Lifecycle of one benchmark run
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Initializing,       // Planning the traversal path
    Ready,              // Initial pose installed, run started
    AwaitingGoalAck,    // Waiting for the navigation interface
    GoalSent,           // Goal dispatched
    Completed,          // Terminal success
    Failed(FailureReason),
}

impl RunState {
    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Stimuli driving the state machine
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunInput {
    PlanReady,
    PlanFailed(FailureReason),
    DispatchRequested,
    NavigationUnavailable,
    GoalPoolExhausted,
    GoalDispatched,
    NextGoal,
    GoalsFinished,
    Interrupted,
    RunTimedOut,
}

/// Next state plus the events it emits, in order
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// State after the input
    pub state: RunState,
    /// Events to record, in order
    pub events: Vec<RunEventKind>,
}

impl Transition {
    fn to(state: RunState, events: Vec<RunEventKind>) -> Self {
        Transition { state, events }
    }

    fn fail(reason: FailureReason) -> Self {
        Transition {
            state: RunState::Failed(reason),
            events: reason.events(),
        }
    }
}

/// Input that has no meaning in the current state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("input {input:?} is not valid in state {state:?}")]
pub struct InvalidTransition {
    /// State the input arrived in
    pub state: RunState,
    /// Rejected input
    pub input: RunInput,
}

/// Transition table of the run lifecycle
pub fn transition(state: RunState, input: RunInput) -> Result<Transition, InvalidTransition> {
    use RunInput::*;

    let next = match (state, input) {
        (RunState::Initializing, PlanReady) => {
            Transition::to(RunState::Ready, vec![RunEventKind::RunStart])
        }
        (RunState::Initializing, PlanFailed(reason)) => Transition::fail(reason),
        (RunState::Ready, DispatchRequested) | (RunState::GoalSent, NextGoal) => {
            Transition::to(RunState::AwaitingGoalAck, Vec::new())
        }
        (RunState::AwaitingGoalAck, GoalDispatched) => {
            Transition::to(RunState::GoalSent, vec![RunEventKind::TargetPoseSet])
        }
        (RunState::AwaitingGoalAck, NavigationUnavailable) => {
            Transition::fail(FailureReason::NavigationUnavailable)
        }
        (RunState::AwaitingGoalAck, GoalPoolExhausted) => {
            Transition::fail(FailureReason::GoalPoolExhausted)
        }
        (RunState::GoalSent, GoalsFinished) => {
            Transition::to(RunState::Completed, vec![RunEventKind::RunCompleted])
        }
        (current, Interrupted) if !current.is_terminal() => {
            Transition::fail(FailureReason::Interrupted)
        }
        (current, RunTimedOut) if !current.is_terminal() => {
            Transition::fail(FailureReason::RunTimeout)
        }
        (state, input) => return Err(InvalidTransition { state, input }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(inputs: &[RunInput]) -> (RunState, Vec<RunEventKind>) {
        let mut state = RunState::Initializing;
        let mut events = Vec::new();
        for &input in inputs {
            let step = transition(state, input).unwrap();
            state = step.state;
            events.extend(step.events);
        }
        (state, events)
    }

    #[test]
    fn test_single_goal_run() {
        let (state, events) = run(&[
            RunInput::PlanReady,
            RunInput::DispatchRequested,
            RunInput::GoalDispatched,
            RunInput::GoalsFinished,
        ]);
        assert_eq!(state, RunState::Completed);
        assert_eq!(
            events,
            vec![
                RunEventKind::RunStart,
                RunEventKind::TargetPoseSet,
                RunEventKind::RunCompleted
            ]
        );
    }

    #[test]
    fn test_multi_goal_run_repeats_goal_events() {
        let (state, events) = run(&[
            RunInput::PlanReady,
            RunInput::DispatchRequested,
            RunInput::GoalDispatched,
            RunInput::NextGoal,
            RunInput::GoalDispatched,
            RunInput::GoalsFinished,
        ]);
        assert_eq!(state, RunState::Completed);
        let goals = events.iter().filter(|e| **e == RunEventKind::TargetPoseSet).count();
        assert_eq!(goals, 2);
    }

    #[test]
    fn test_navigation_timeout() {
        let (state, events) = run(&[
            RunInput::PlanReady,
            RunInput::DispatchRequested,
            RunInput::NavigationUnavailable,
        ]);
        assert_eq!(state, RunState::Failed(FailureReason::NavigationUnavailable));
        assert_eq!(events, vec![RunEventKind::RunStart, RunEventKind::FailedToCommunicate]);
    }

    #[test]
    fn test_planning_failure_skips_run_start() {
        let (state, events) = run(&[RunInput::PlanFailed(FailureReason::InsufficientNodes)]);
        assert_eq!(state, RunState::Failed(FailureReason::InsufficientNodes));
        assert_eq!(events, vec![RunEventKind::InsufficientNodes]);
    }

    #[test]
    fn test_interrupt_from_any_live_state() {
        for inputs in [
            &[][..],
            &[RunInput::PlanReady][..],
            &[RunInput::PlanReady, RunInput::DispatchRequested][..],
        ] {
            let (state, _) = run(inputs);
            let step = transition(state, RunInput::Interrupted).unwrap();
            assert_eq!(step.state, RunState::Failed(FailureReason::Interrupted));
            assert_eq!(
                step.events,
                vec![RunEventKind::RosShutdown, RunEventKind::SupervisorFinished]
            );
        }
    }

    #[test]
    fn test_run_timeout_from_any_live_state() {
        for inputs in [
            &[RunInput::PlanReady][..],
            &[RunInput::PlanReady, RunInput::DispatchRequested][..],
            &[
                RunInput::PlanReady,
                RunInput::DispatchRequested,
                RunInput::GoalDispatched,
            ][..],
        ] {
            let (state, _) = run(inputs);
            let step = transition(state, RunInput::RunTimedOut).unwrap();
            assert_eq!(step.state, RunState::Failed(FailureReason::RunTimeout));
            assert_eq!(
                step.events,
                vec![RunEventKind::RunTimeout, RunEventKind::SupervisorFinished]
            );
        }
        assert!(transition(RunState::Completed, RunInput::RunTimedOut).is_err());
    }

    #[test]
    fn test_setup_failure_closes_the_run() {
        let (state, events) = run(&[RunInput::PlanFailed(FailureReason::SetupFailed)]);
        assert_eq!(state, RunState::Failed(FailureReason::SetupFailed));
        assert_eq!(events, vec![RunEventKind::SupervisorFinished]);
    }

    #[test]
    fn test_terminal_states_reject_input() {
        for state in [RunState::Completed, RunState::Failed(FailureReason::RunTimeout)] {
            assert!(transition(state, RunInput::Interrupted).is_err());
            assert!(transition(state, RunInput::PlanReady).is_err());
        }
    }

    #[test]
    fn test_out_of_order_input_is_rejected() {
        let err = transition(RunState::Ready, RunInput::GoalDispatched).unwrap_err();
        assert_eq!(err.state, RunState::Ready);
        assert_eq!(err.input, RunInput::GoalDispatched);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(RunEventKind::RunStart.to_string(), "run_start");
        assert_eq!(
            RunEventKind::FailedToCommunicate.name(),
            "failed_to_communicate_with_navigation_node"
        );
    }
}
