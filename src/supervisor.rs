// src/supervisor.rs
// Drives one benchmark run: plans the traversal path, installs the initial pose,
// dispatches goals and records every lifecycle event. All state changes go
// through `core::state::transition`; this type only performs the side effects.

use log::{error, info, warn};
use rand::Rng;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{DispatchMode, SupervisorConfig};
use crate::core::{
    transition, Clock, EventLog, FailureReason, GroundTruthRecorder, RunInput, RunState,
    SharedRecorder,
};
use crate::graph::{GraphSource, NamedWeight};
use crate::navigation::{
    DryRunBroadcaster, GoalRequest, NavigationClient, PathPublisher, PoseBroadcaster,
    StampedTransform, TransformTimer,
};
use crate::planning::{PlanningError, TraversalPlan, TraversalPlanner};
use crate::SupervisorError;

/// Which goal the next dispatch takes from the pool
#[derive(Debug, Clone, Copy)]
enum GoalPick {
    Random,
    InOrder,
}

/// Lifecycle driver of a single benchmark run
pub struct RunSupervisor<N: NavigationClient, R: Rng> {
    config: SupervisorConfig,
    state: RunState,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
    navigator: N,
    broadcaster: Arc<dyn PoseBroadcaster>,
    path_publisher: Box<dyn PathPublisher>,
    recorder: SharedRecorder,
    shutdown: Arc<AtomicBool>,
    rng: R,
    plan: Option<TraversalPlan>,
    transform_timer: Option<TransformTimer>,
    started_at: Option<Instant>,
    goals_sent: usize,
    finalized: bool,
}

impl<N: NavigationClient, R: Rng> RunSupervisor<N, R> {
    /// Validates `config`, prepares the output folders and a fresh event log.
    ///
    /// Broadcasting and path publication default to the dry-run collaborators.
    pub fn create(
        config: SupervisorConfig,
        clock: Arc<dyn Clock>,
        navigator: N,
        rng: R,
    ) -> Result<Self, SupervisorError> {
        config.validate()?;
        fs::create_dir_all(config.benchmark_data_folder())?;
        let events = Arc::new(EventLog::create(config.run_events_path(), Arc::clone(&clock)));

        Ok(RunSupervisor {
            config,
            state: RunState::Initializing,
            events,
            clock,
            navigator,
            broadcaster: Arc::new(DryRunBroadcaster),
            path_publisher: Box::new(DryRunBroadcaster),
            recorder: GroundTruthRecorder::shared(),
            shutdown: Arc::new(AtomicBool::new(false)),
            rng,
            plan: None,
            transform_timer: None,
            started_at: None,
            goals_sent: 0,
            finalized: false,
        })
    }

    /// Uses `broadcaster` for the standing initial-pose transform
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn PoseBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Uses `publisher` for the traversal path
    pub fn with_path_publisher(mut self, publisher: Box<dyn PathPublisher>) -> Self {
        self.path_publisher = publisher;
        self
    }

    /// Flushes `recorder` during finalization
    pub fn with_recorder(mut self, recorder: SharedRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    /// Interrupt flag; when set, the run fails at the next checkpoint
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Configuration of this run
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Event log of this run
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Planning result, once initialized
    pub fn plan(&self) -> Option<&TraversalPlan> {
        self.plan.as_ref()
    }

    /// Navigation client
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Number of goals dispatched so far
    pub fn goals_sent(&self) -> usize {
        self.goals_sent
    }

    /// True once the run completed and the process may shut down
    pub fn shutdown_requested(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Feeds `input` to the state machine and records the emitted events
    pub fn apply(&mut self, input: RunInput) -> RunState {
        match transition(self.state, input) {
            Ok(step) => {
                for event in step.events {
                    self.events.record(event);
                }
                self.state = step.state;
            }
            Err(e) => warn!("Ignoring lifecycle input: {}", e),
        }
        self.state
    }

    /// Plans the traversal path from `source`.
    ///
    /// Any planning failure records its event, moves the run to `Failed` and
    /// is returned as [`SupervisorError::RunFailed`].
    pub fn initialize(&mut self, source: &dyn GraphSource) -> Result<(), SupervisorError> {
        info!("Planning traversal path from the reduced traversal graph");
        let planner = TraversalPlanner::new(NamedWeight::new(self.config.weight_attribute.as_str()));

        let planned = source
            .traversal_graph(self.config.minimum_radius())
            .map_err(PlanningError::from)
            .and_then(|graph| planner.plan(graph, &mut self.rng));

        match planned {
            Ok(plan) => {
                info!(
                    "Initial pose ready at ({:.3}, {:.3}, {:.3}), {} goal candidates",
                    plan.initial_pose.x,
                    plan.initial_pose.y,
                    plan.initial_pose.yaw,
                    plan.goals.len()
                );
                self.plan = Some(plan);
                Ok(())
            }
            Err(e) => {
                self.apply(RunInput::PlanFailed(FailureReason::from(&e)));
                Err(SupervisorError::RunFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Installs the initial pose and dispatches goals per the configured mode
    pub fn start_run(&mut self) -> Result<RunState, SupervisorError> {
        if self.state != RunState::Initializing {
            return Err(SupervisorError::NotInitialized);
        }
        if self.plan.is_none() {
            return Err(SupervisorError::NotInitialized);
        }
        self.check_interrupt()?;
        let Some(plan) = self.plan.as_ref() else {
            return Err(SupervisorError::NotInitialized);
        };
        info!("Preparing to start run");

        let stamp = self.clock.now();
        if let Err(e) = self
            .path_publisher
            .publish_path(&self.config.fixed_frame, stamp, &plan.traversal_path)
        {
            warn!("Traversal path not published: {}", e);
        }

        let transform = StampedTransform {
            frame_id: self.config.fixed_frame.clone(),
            child_frame_id: self.config.robot_base_frame.clone(),
            stamp,
            pose: plan.initial_pose,
        };
        let timer = TransformTimer::start(
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.clock),
            transform,
            self.config.transform_rate,
        );
        match timer {
            Ok(timer) => self.transform_timer = Some(timer),
            Err(e) => return Err(self.fail_setup(format!("could not start transform broadcast: {}", e))),
        }

        self.started_at = Some(Instant::now());
        self.apply(RunInput::PlanReady);
        self.apply(RunInput::DispatchRequested);

        match self.config.dispatch_mode {
            DispatchMode::SingleRandom => self.dispatch_goal(GoalPick::Random)?,
            DispatchMode::FullTour => self.dispatch_tour()?,
        }

        self.apply(RunInput::GoalsFinished);
        info!("Run completed after {} goal(s)", self.goals_sent);
        Ok(self.state)
    }

    /// External interrupt: fails the run unless it already ended
    pub fn interrupt(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!("Asked to shutdown, terminating run");
        self.apply(RunInput::Interrupted);
    }

    /// Fails the run if it has been going for longer than `run_timeout`.
    ///
    /// Returns true when the timeout fired on this call.
    pub fn check_run_timeout(&mut self) -> bool {
        let expired = self
            .started_at
            .is_some_and(|started| started.elapsed() > self.config.run_timeout());
        if !expired || self.state.is_terminal() {
            return false;
        }

        error!("Terminating supervisor due to timeout, terminating run");
        self.apply(RunInput::RunTimedOut);
        true
    }

    /// Stops the transform timer and flushes buffered measurements.
    ///
    /// Runs once; later calls (including the one from `Drop`) do nothing.
    pub fn end_run(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(mut timer) = self.transform_timer.take() {
            timer.stop();
        }

        let path = self.config.ground_truth_poses_path();
        let written = match self.recorder.lock() {
            Ok(recorder) => recorder.write_csv(&path),
            Err(poisoned) => poisoned.into_inner().write_csv(&path),
        };
        if let Err(e) = written {
            error!("Could not write ground truth poses to {}: {}", path.display(), e);
        }
    }

    fn check_interrupt(&mut self) -> Result<(), SupervisorError> {
        if !self.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.interrupt();
        Err(SupervisorError::RunFailed {
            reason: "interrupted".to_string(),
        })
    }

    fn check_deadline(&mut self) -> Result<(), SupervisorError> {
        if !self.check_run_timeout() {
            return Ok(());
        }
        Err(SupervisorError::RunFailed {
            reason: "run_timeout".to_string(),
        })
    }

    fn fail_setup(&mut self, reason: String) -> SupervisorError {
        error!("{}", reason);
        self.apply(RunInput::PlanFailed(FailureReason::SetupFailed));
        SupervisorError::RunFailed { reason }
    }

    fn dispatch_tour(&mut self) -> Result<(), SupervisorError> {
        let total = self.plan.as_ref().map_or(0, |plan| plan.goals.len());
        loop {
            info!("Goal {} / {}", self.goals_sent + 1, total);
            self.dispatch_goal(GoalPick::InOrder)?;

            let remaining = self.plan.as_ref().map_or(0, |plan| plan.goals.remaining());
            if remaining == 0 {
                return Ok(());
            }

            self.check_interrupt()?;
            self.check_deadline()?;
            self.apply(RunInput::NextGoal);
        }
    }

    fn dispatch_goal(&mut self, pick: GoalPick) -> Result<(), SupervisorError> {
        let available = self.navigator.wait_for_server(self.config.wait_timeout());
        // the wait may be long; honour what happened meanwhile before sending
        self.check_interrupt()?;
        self.check_deadline()?;
        if !available {
            self.apply(RunInput::NavigationUnavailable);
            return Err(SupervisorError::RunFailed {
                reason: "navigate_to_pose action server not available".to_string(),
            });
        }

        let taken = self.plan.as_mut().and_then(|plan| match pick {
            GoalPick::Random => plan.goals.take_random(&mut self.rng),
            GoalPick::InOrder => plan.goals.take_next(),
        });
        let Some((index, pose)) = taken else {
            self.apply(RunInput::GoalPoolExhausted);
            return Err(SupervisorError::RunFailed {
                reason: "insufficient number of poses in traversal path, can not send goal".to_string(),
            });
        };

        let goal = GoalRequest {
            frame_id: self.config.fixed_frame.clone(),
            stamp: self.clock.now(),
            pose,
        };
        if let Err(e) = self.navigator.send_goal(&goal) {
            self.apply(RunInput::NavigationUnavailable);
            return Err(SupervisorError::RunFailed {
                reason: e.to_string(),
            });
        }

        self.goals_sent += 1;
        info!(
            "Sending goal #{} (pool index {}): ({:.3}, {:.3}, {:.3})",
            self.goals_sent, index, pose.x, pose.y, pose.yaw
        );
        self.apply(RunInput::GoalDispatched);
        Ok(())
    }
}

impl<N: NavigationClient, R: Rng> Drop for RunSupervisor<N, R> {
    fn drop(&mut self) {
        self.end_run();
    }
}
