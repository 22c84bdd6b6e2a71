//! ROS 2 interface of the supervisor
//!
//! This module handles all communication with ROS 2, including:
//! - broadcasting the initial pose on `/tf` and publishing the traversal path
//! - sending goals to the `navigate_to_pose` action server
//! - recording ground-truth odometry and watching global plans

mod action;
mod publisher;
mod subscriber;

use log::{info, warn};
use r2r::{Context, Node, QosProfile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::config::RosConfig;
use crate::core::{Clock, SharedRecorder};

pub use action::RosNavigationClient;
pub use publisher::{RosPathPublisher, TfBroadcaster};

/// ROS error types
#[derive(Debug, Error)]
pub enum RosError {
    /// Error reported by the ROS 2 client library
    #[error("ROS 2 error: {0}")]
    Rcl(#[from] r2r::Error),
    /// Helper thread could not be started
    #[error("could not start {name} thread: {source}")]
    Thread {
        /// Thread name
        name: &'static str,
        /// Underlying error
        source: std::io::Error,
    },
}

impl From<RosError> for crate::SupervisorError {
    fn from(error: RosError) -> Self {
        crate::SupervisorError::RunFailed {
            reason: error.to_string(),
        }
    }
}

/// Node of the supervisor plus the thread spinning it
pub struct RosInterface {
    _context: Context,
    node: Arc<Mutex<Node>>,
    config: RosConfig,
    clock: Arc<RosClock>,
    running: Arc<AtomicBool>,
    spin_thread: Option<JoinHandle<()>>,
}

impl RosInterface {
    /// Creates the node; nothing is spun until [`RosInterface::start_spinning`]
    pub fn new(config: &RosConfig) -> Result<Self, RosError> {
        let context = Context::create()?;
        let node = Node::create(context.clone(), &config.node_name, "")?;
        info!("ROS 2 node {} created", config.node_name);

        Ok(RosInterface {
            _context: context,
            node: Arc::new(Mutex::new(node)),
            config: config.clone(),
            clock: Arc::new(RosClock::new()?),
            running: Arc::new(AtomicBool::new(false)),
            spin_thread: None,
        })
    }

    /// Clock following ROS time, `/clock` included when simulated
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock) as Arc<dyn Clock>
    }

    fn qos(&self) -> QosProfile {
        QosProfile::default().keep_last(self.config.qos_depth)
    }

    fn lock_node(&self) -> std::sync::MutexGuard<'_, Node> {
        self.node.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `/tf` broadcaster for the initial pose
    pub fn tf_broadcaster(&self) -> Result<TfBroadcaster, RosError> {
        let qos = self.qos();
        TfBroadcaster::new(&mut self.lock_node(), qos)
    }

    /// Latched publisher of the traversal path
    pub fn path_publisher(&self) -> Result<RosPathPublisher, RosError> {
        let topic = self.config.traversal_path_topic.clone();
        RosPathPublisher::new(&mut self.lock_node(), &topic)
    }

    /// Client of the navigate-to-pose action
    pub fn navigation_client(&self) -> Result<RosNavigationClient, RosError> {
        let action = self.config.navigate_to_pose_action.clone();
        RosNavigationClient::new(Arc::clone(&self.node), &action)
    }

    /// Buffers ground-truth odometry into `recorder`
    pub fn record_ground_truth(&mut self, recorder: SharedRecorder) -> Result<(), RosError> {
        let topic = self.config.ground_truth_pose_topic.clone();
        let qos = self.qos();
        subscriber::record_ground_truth(&mut self.lock_node(), &topic, qos, recorder)
    }

    /// Logs the first global plan seen on each configured topic
    pub fn observe_global_plans(&mut self) -> Result<(), RosError> {
        let topics = self.config.global_plan_topics.clone();
        let qos = self.qos();
        let mut node = self.lock_node();
        for topic in &topics {
            subscriber::observe_global_plan(&mut node, topic, qos.clone())?;
        }
        Ok(())
    }

    /// Spins the node from a background thread
    pub fn start_spinning(&mut self) -> Result<(), RosError> {
        if self.spin_thread.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);
        let node = Arc::clone(&self.node);
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("ros-spin".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    node.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .spin_once(Duration::from_millis(20));
                    // let other users of the node in between spins
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .map_err(|source| RosError::Thread { name: "ros-spin", source })?;

        self.spin_thread = Some(handle);
        info!("ROS interface spinning");
        Ok(())
    }

    /// Stops spinning
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.spin_thread.take() {
            if handle.join().is_err() {
                warn!("ROS spin thread panicked");
            }
        }
        info!("ROS interface shutdown complete");
    }
}

impl Drop for RosInterface {
    fn drop(&mut self) {
        if self.spin_thread.is_some() {
            self.shutdown();
        }
    }
}

/// ROS time source
pub struct RosClock {
    inner: Mutex<r2r::Clock>,
}

impl RosClock {
    fn new() -> Result<Self, RosError> {
        Ok(RosClock {
            inner: Mutex::new(r2r::Clock::create(r2r::ClockType::RosTime)?),
        })
    }
}

impl Clock for RosClock {
    fn now(&self) -> f64 {
        let mut clock = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match clock.get_now() {
            Ok(now) => now.as_secs_f64(),
            Err(e) => {
                warn!("ROS clock unavailable: {}", e);
                0.0
            }
        }
    }
}

/// Seconds to a `builtin_interfaces/Time`
pub(crate) fn to_time(stamp: f64) -> r2r::builtin_interfaces::msg::Time {
    let stamp = stamp.max(0.0);
    let sec = stamp.trunc();
    r2r::builtin_interfaces::msg::Time {
        sec: sec as i32,
        nanosec: ((stamp - sec) * 1e9) as u32,
    }
}

/// Planar pose to a `geometry_msgs/Pose`
pub(crate) fn to_pose(pose: &crate::planning::OrientedPose) -> r2r::geometry_msgs::msg::Pose {
    let orientation = pose.orientation();
    r2r::geometry_msgs::msg::Pose {
        position: r2r::geometry_msgs::msg::Point {
            x: pose.x,
            y: pose.y,
            z: 0.0,
        },
        orientation: r2r::geometry_msgs::msg::Quaternion {
            x: orientation.i,
            y: orientation.j,
            z: orientation.k,
            w: orientation.w,
        },
    }
}
