// End-to-end runs of the supervisor against mocked and dry-run navigation.

use global_planning_supervisor::core::{Clock, FailureReason, RunState};
use global_planning_supervisor::graph::{Graph, GraphEdge};
use global_planning_supervisor::navigation::{GoalRequest, NavigationClient, NavigationError};
use global_planning_supervisor::{DispatchMode, DryRunNavigator, RunSupervisor, SupervisorConfig, YamlGraphSource};
use mockall::mock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::{fixture, rstest};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

mock! {
    pub Navigator {}
    impl NavigationClient for Navigator {
        fn wait_for_server(&mut self, timeout: Duration) -> bool;
        fn send_goal(&mut self, goal: &GoalRequest) -> Result<(), NavigationError>;
    }
}

/// Clock advancing one second per reading
struct SteppingClock(Mutex<f64>);

impl Clock for SteppingClock {
    fn now(&self) -> f64 {
        let mut now = self.0.lock().unwrap();
        *now += 1.0;
        *now
    }
}

#[fixture]
fn output() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn config(output: &TempDir, mode: DispatchMode) -> SupervisorConfig {
    SupervisorConfig {
        run_output_folder: output.path().join("run"),
        dispatch_mode: mode,
        wait_timeout: 0.5,
        ..Default::default()
    }
}

/// 3 x 2 grid of unit edges
fn grid() -> Graph {
    let mut graph = Graph::new();
    for id in 0..6u64 {
        graph.add_node(id, (id % 3) as f64, (id / 3) as f64).unwrap();
    }
    for (a, b) in [(0, 1), (1, 2), (3, 4), (4, 5), (0, 3), (1, 4), (2, 5)] {
        graph
            .add_edge(GraphEdge::new(a, b).with_attribute("voronoi_path_distance", 1.0))
            .unwrap();
    }
    graph
}

fn log_lines(config: &SupervisorConfig) -> Vec<String> {
    fs::read_to_string(config.run_events_path())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[rstest]
fn test_successful_run_writes_event_log(output: TempDir) {
    let config = config(&output, DispatchMode::SingleRandom);
    let mut navigator = MockNavigator::new();
    navigator
        .expect_wait_for_server()
        .withf(|timeout| *timeout == Duration::from_millis(500))
        .times(1)
        .return_const(true);
    navigator.expect_send_goal().times(1).returning(|_| Ok(()));

    let clock = Arc::new(SteppingClock(Mutex::new(100.0)));
    let mut run = RunSupervisor::create(config.clone(), clock, navigator, StdRng::seed_from_u64(7)).unwrap();
    run.initialize(&grid()).unwrap();
    assert_eq!(run.start_run().unwrap(), RunState::Completed);
    run.end_run();

    let lines = log_lines(&config);
    assert_eq!(lines[0], "timestamp, event");
    let names: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split(", ").nth(1).unwrap())
        .collect();
    assert_eq!(names, vec!["run_start", "target_pose_set", "run_completed"]);

    let stamps: Vec<f64> = lines[1..]
        .iter()
        .map(|line| line.split(", ").next().unwrap().parse().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(config.ground_truth_poses_path().exists());
}

#[rstest]
fn test_unavailable_navigation_records_one_failure(output: TempDir) {
    let config = config(&output, DispatchMode::FullTour);
    let mut navigator = MockNavigator::new();
    navigator.expect_wait_for_server().times(1).return_const(false);
    navigator.expect_send_goal().never();

    let mut run = RunSupervisor::create(
        config.clone(),
        Arc::new(SteppingClock(Mutex::new(0.0))),
        navigator,
        StdRng::seed_from_u64(7),
    )
    .unwrap();
    run.initialize(&grid()).unwrap();
    assert!(run.start_run().is_err());
    drop(run);

    let lines = log_lines(&config);
    let failures = lines
        .iter()
        .filter(|line| line.ends_with("failed_to_communicate_with_navigation_node"))
        .count();
    assert_eq!(failures, 1);
    assert!(!lines.iter().any(|line| line.ends_with("target_pose_set")));
}

#[rstest]
fn test_full_tour_follows_traversal_path(output: TempDir) {
    let config = config(&output, DispatchMode::FullTour);
    let mut run = RunSupervisor::create(
        config,
        Arc::new(SteppingClock(Mutex::new(0.0))),
        DryRunNavigator::new(),
        StdRng::seed_from_u64(11),
    )
    .unwrap();
    run.initialize(&grid()).unwrap();
    run.start_run().unwrap();

    let plan = run.plan().unwrap();
    let sent: Vec<_> = run.navigator().sent_goals().iter().map(|goal| goal.pose).collect();
    assert_eq!(sent.len(), 5);
    assert_eq!(sent.as_slice(), &plan.traversal_path[1..]);
    assert!(run.navigator().sent_goals().iter().all(|goal| goal.frame_id == "map"));
    assert_eq!(plan.goals.remaining(), 0);
}

#[rstest]
fn test_interrupt_flag_stops_full_tour(output: TempDir) {
    let config = config(&output, DispatchMode::FullTour);
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let mut navigator = MockNavigator::new();
    navigator.expect_wait_for_server().return_const(true);
    navigator.expect_send_goal().times(1).returning(move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let mut run = RunSupervisor::create(
        config,
        Arc::new(SteppingClock(Mutex::new(0.0))),
        navigator,
        StdRng::seed_from_u64(3),
    )
    .unwrap()
    .with_shutdown_flag(shutdown);
    run.initialize(&grid()).unwrap();

    assert!(run.start_run().is_err());
    assert_eq!(run.state(), RunState::Failed(FailureReason::Interrupted));
    let names = run.events().event_names();
    assert_eq!(names[names.len() - 2..], ["ros_shutdown", "supervisor_finished"]);
}

#[rstest]
fn test_interrupt_during_wait_skips_single_goal(output: TempDir) {
    let config = config(&output, DispatchMode::SingleRandom);
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let mut navigator = MockNavigator::new();
    navigator.expect_wait_for_server().times(1).returning(move |_| {
        flag.store(true, Ordering::SeqCst);
        true
    });
    navigator.expect_send_goal().never();

    let mut run = RunSupervisor::create(
        config,
        Arc::new(SteppingClock(Mutex::new(0.0))),
        navigator,
        StdRng::seed_from_u64(3),
    )
    .unwrap()
    .with_shutdown_flag(shutdown);
    run.initialize(&grid()).unwrap();

    assert!(run.start_run().is_err());
    assert_eq!(run.state(), RunState::Failed(FailureReason::Interrupted));
    assert_eq!(run.goals_sent(), 0);
    assert_eq!(
        run.events().event_names(),
        vec!["run_start", "ros_shutdown", "supervisor_finished"]
    );
}

#[rstest]
fn test_run_timeout_fails_full_tour(output: TempDir) {
    let config = SupervisorConfig {
        run_timeout: 1e-6,
        ..config(&output, DispatchMode::FullTour)
    };
    let mut run = RunSupervisor::create(
        config,
        Arc::new(SteppingClock(Mutex::new(0.0))),
        DryRunNavigator::new(),
        StdRng::seed_from_u64(5),
    )
    .unwrap();
    run.initialize(&grid()).unwrap();

    assert!(run.start_run().is_err());
    assert_eq!(run.state(), RunState::Failed(FailureReason::RunTimeout));
    let names = run.events().event_names();
    assert_eq!(names[names.len() - 2..], ["run_timeout", "supervisor_finished"]);
    assert!(run.navigator().sent_goals().len() < 5);
}

#[rstest]
fn test_missing_graph_file_fails_initialization(output: TempDir) {
    let config = config(&output, DispatchMode::SingleRandom);
    let mut navigator = MockNavigator::new();
    navigator.expect_wait_for_server().never();

    let mut run = RunSupervisor::create(
        config,
        Arc::new(SteppingClock(Mutex::new(0.0))),
        navigator,
        StdRng::seed_from_u64(3),
    )
    .unwrap();
    let source = YamlGraphSource::new(output.path().join("missing.yaml"));

    assert!(run.initialize(&source).is_err());
    assert_eq!(run.state(), RunState::Failed(FailureReason::InvalidGraph));
    assert_eq!(run.events().event_names(), vec!["invalid_traversal_graph"]);
}

#[rstest]
fn test_second_run_backs_up_previous_log(output: TempDir) {
    let config = config(&output, DispatchMode::SingleRandom);
    for seed in 0..2 {
        let mut run = RunSupervisor::create(
            config.clone(),
            Arc::new(SteppingClock(Mutex::new(0.0))),
            DryRunNavigator::new(),
            StdRng::seed_from_u64(seed),
        )
        .unwrap();
        run.initialize(&grid()).unwrap();
        run.start_run().unwrap();
    }

    let backups = fs::read_dir(config.benchmark_data_folder())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("run_events.csv.backup_"))
        .count();
    assert_eq!(backups, 1);
    assert_eq!(log_lines(&config).len(), 4);
}
