//! Navigation-side collaborators of the run supervisor
//!
//! The supervisor only talks to the navigation stack through the traits in
//! this module: a goal client, a broadcaster for the standing initial-pose
//! transform and a publisher for the traversal path. The ROS 2 adapter
//! implements them with `r2r`; [`dry_run`] implements them with logging.

pub mod broadcast;
pub mod dry_run;

use std::time::Duration;
use thiserror::Error;

use crate::planning::OrientedPose;

pub use broadcast::TransformTimer;
pub use dry_run::{DryRunBroadcaster, DryRunNavigator};

/// Goal message handed to the navigation stack
#[derive(Debug, Clone, PartialEq)]
pub struct GoalRequest {
    /// Frame the pose is expressed in
    pub frame_id: String,
    /// Stamp (seconds)
    pub stamp: f64,
    /// Target pose
    pub pose: OrientedPose,
}

/// Pose published as a transform between two named frames
#[derive(Debug, Clone, PartialEq)]
pub struct StampedTransform {
    /// Parent frame (e.g. `map`)
    pub frame_id: String,
    /// Child frame (e.g. `base_footprint`)
    pub child_frame_id: String,
    /// Stamp (seconds), refreshed on every publication
    pub stamp: f64,
    /// Child frame origin in the parent frame
    pub pose: OrientedPose,
}

/// Navigation interface errors
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Goal could not be handed to the navigation stack
    #[error("could not send navigation goal: {0}")]
    SendFailed(String),
    /// Message could not be published
    #[error("could not publish {topic}: {reason}")]
    PublishFailed {
        /// Topic name
        topic: String,
        /// Underlying failure
        reason: String,
    },
}

/// Client of the navigate-to-pose interface
#[cfg_attr(test, mockall::automock)]
pub trait NavigationClient {
    /// Blocks until the interface is available or `timeout` elapses
    fn wait_for_server(&mut self, timeout: Duration) -> bool;

    /// Submits a goal without waiting for its outcome
    fn send_goal(&mut self, goal: &GoalRequest) -> Result<(), NavigationError>;
}

/// Periodic transform output, called from the broadcast timer thread
#[cfg_attr(test, mockall::automock)]
pub trait PoseBroadcaster: Send + Sync {
    /// Publishes one transform
    fn send_transform(&self, transform: &StampedTransform) -> Result<(), NavigationError>;
}

/// One-shot publication of the planned traversal path
#[cfg_attr(test, mockall::automock)]
pub trait PathPublisher {
    /// Publishes `poses` in `frame_id`
    fn publish_path(&self, frame_id: &str, stamp: f64, poses: &[OrientedPose]) -> Result<(), NavigationError>;
}
