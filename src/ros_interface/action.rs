// src/ros_interface/action.rs
// Client side of nav2's NavigateToPose action. Goals are fire-and-forget: the
// supervisor only cares that the request left, acceptance is merely logged.

use log::{info, warn};
use r2r::geometry_msgs::msg::PoseStamped;
use r2r::nav2_msgs::action::NavigateToPose;
use r2r::std_msgs::msg::Header;
use r2r::{ActionClient, Node};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::{to_pose, to_time, RosError};
use crate::navigation::{GoalRequest, NavigationClient, NavigationError};

/// Navigation client backed by the `navigate_to_pose` action
pub struct RosNavigationClient {
    node: Arc<Mutex<Node>>,
    client: ActionClient<NavigateToPose::Action>,
    action: String,
}

impl RosNavigationClient {
    /// Creates a client of `action` on `node`
    pub fn new(node: Arc<Mutex<Node>>, action: &str) -> Result<Self, RosError> {
        let client = node
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .create_action_client::<NavigateToPose::Action>(action)?;
        Ok(RosNavigationClient {
            node,
            client,
            action: action.to_string(),
        })
    }
}

impl NavigationClient for RosNavigationClient {
    fn wait_for_server(&mut self, timeout: Duration) -> bool {
        let available = {
            let mut node = self.node.lock().unwrap_or_else(PoisonError::into_inner);
            node.is_available(&self.client)
        };
        let available = match available {
            Ok(future) => future,
            Err(e) => {
                warn!("Could not query {} availability: {}", self.action, e);
                return false;
            }
        };

        // the spin thread drives the future; we only bound the wait
        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("action-wait".to_string())
            .spawn(move || {
                let _ = sender.send(futures::executor::block_on(available).is_ok());
            });
        if let Err(e) = spawned {
            warn!("Could not wait for {}: {}", self.action, e);
            return false;
        }

        match receiver.recv_timeout(timeout) {
            Ok(ready) => ready,
            Err(_) => {
                warn!("{} action server not available after {:?}", self.action, timeout);
                false
            }
        }
    }

    fn send_goal(&mut self, goal: &GoalRequest) -> Result<(), NavigationError> {
        let request = NavigateToPose::Goal {
            pose: PoseStamped {
                header: Header {
                    stamp: to_time(goal.stamp),
                    frame_id: goal.frame_id.clone(),
                },
                pose: to_pose(&goal.pose),
            },
            ..Default::default()
        };

        let response = self
            .client
            .send_goal_request(request)
            .map_err(|e| NavigationError::SendFailed(e.to_string()))?;

        let action = self.action.clone();
        thread::Builder::new()
            .name("goal-response".to_string())
            .spawn(move || match futures::executor::block_on(response) {
                Ok(_) => info!("Goal accepted by {}", action),
                Err(e) => warn!("Goal not accepted by {}: {}", action, e),
            })
            .map_err(|e| NavigationError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
