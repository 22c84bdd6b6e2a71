// src/navigation/dry_run.rs
// Logging stand-ins for the navigation collaborators, used when no ROS graph is
// available. The run goes through the same lifecycle and event log.

use log::{info, trace};
use std::time::Duration;

use super::{GoalRequest, NavigationClient, NavigationError, PathPublisher, PoseBroadcaster, StampedTransform};
use crate::planning::OrientedPose;

/// Navigation client that is always available and logs every goal
#[derive(Debug, Default)]
pub struct DryRunNavigator {
    sent: Vec<GoalRequest>,
}

impl DryRunNavigator {
    /// Creates a dry-run client
    pub fn new() -> Self {
        DryRunNavigator::default()
    }

    /// Goals received so far
    pub fn sent_goals(&self) -> &[GoalRequest] {
        &self.sent
    }
}

impl NavigationClient for DryRunNavigator {
    fn wait_for_server(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn send_goal(&mut self, goal: &GoalRequest) -> Result<(), NavigationError> {
        info!(
            "[dry run] goal in {}: x={:.3}, y={:.3}, yaw={:.3}",
            goal.frame_id, goal.pose.x, goal.pose.y, goal.pose.yaw
        );
        self.sent.push(goal.clone());
        Ok(())
    }
}

/// Broadcaster and path publisher that only log
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBroadcaster;

impl PoseBroadcaster for DryRunBroadcaster {
    fn send_transform(&self, transform: &StampedTransform) -> Result<(), NavigationError> {
        trace!(
            "[dry run] transform {} -> {} at {}: ({:.3}, {:.3}, {:.3})",
            transform.frame_id,
            transform.child_frame_id,
            transform.stamp,
            transform.pose.x,
            transform.pose.y,
            transform.pose.yaw
        );
        Ok(())
    }
}

impl PathPublisher for DryRunBroadcaster {
    fn publish_path(&self, frame_id: &str, _stamp: f64, poses: &[OrientedPose]) -> Result<(), NavigationError> {
        info!("[dry run] traversal path with {} poses in {}", poses.len(), frame_id);
        Ok(())
    }
}
