//! Global Planning Benchmark Supervisor
//!
//! Sets up and supervises one run of a global-planning benchmark:
//! - derives a traversal path from the reduced traversal graph of a map
//! - installs a random initial pose and dispatches navigation goals
//! - records run lifecycle events and ground-truth poses for later analysis
//!
//! The ROS 2 bindings live behind the `ros` feature; everything else runs
//! against the traits in [`navigation`].

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod graph;
pub mod navigation;
pub mod planning;
#[cfg(feature = "ros")]
pub mod ros_interface;
pub mod supervisor;

// Re-export commonly used items for easier access
pub use config::{ConfigError, DispatchMode, RosConfig, SupervisorConfig};
pub use crate::core::{EventLog, GroundTruthRecorder, RunEventKind, RunState, SystemClock};
pub use graph::{Graph, GraphError, GraphSource, NamedWeight, YamlGraphSource};
pub use navigation::{DryRunBroadcaster, DryRunNavigator, NavigationClient, NavigationError};
pub use planning::{PlanningError, TraversalPlan, TraversalPlanner};
pub use supervisor::RunSupervisor;

use thiserror::Error;

/// Supervisor error types
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The run ended in a failure state; its events are already recorded
    #[error("run failed: {reason}")]
    RunFailed {
        /// Human readable cause
        reason: String,
    },
    /// `start_run` called without a successful plan
    #[error("supervisor not initialized")]
    NotInitialized,
    /// Configuration rejected when creating the supervisor
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Output folder could not be created
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
