// src/ros_interface/publisher.rs
// Publishers of the supervisor: the standing initial-pose transform on /tf and
// the traversal path for visualization.

use r2r::geometry_msgs::msg::{PoseStamped, Transform, TransformStamped, Vector3};
use r2r::nav_msgs::msg::Path;
use r2r::std_msgs::msg::Header;
use r2r::tf2_msgs::msg::TFMessage;
use r2r::{Node, QosDurabilityPolicy, QosProfile};

use super::{to_pose, to_time, RosError};
use crate::navigation::{NavigationError, PathPublisher, PoseBroadcaster, StampedTransform};
use crate::planning::OrientedPose;

fn header(frame_id: &str, stamp: f64) -> Header {
    Header {
        stamp: to_time(stamp),
        frame_id: frame_id.to_string(),
    }
}

fn publish_failed(topic: &str, error: r2r::Error) -> NavigationError {
    NavigationError::PublishFailed {
        topic: topic.to_string(),
        reason: error.to_string(),
    }
}

/// Broadcasts stamped transforms on `/tf`
pub struct TfBroadcaster {
    inner: r2r::Publisher<TFMessage>,
}

impl TfBroadcaster {
    /// Creates the `/tf` publisher
    pub fn new(node: &mut Node, qos: QosProfile) -> Result<Self, RosError> {
        let inner = node.create_publisher::<TFMessage>("/tf", qos)?;
        Ok(TfBroadcaster { inner })
    }
}

impl PoseBroadcaster for TfBroadcaster {
    fn send_transform(&self, transform: &StampedTransform) -> Result<(), NavigationError> {
        let pose = to_pose(&transform.pose);
        let message = TFMessage {
            transforms: vec![TransformStamped {
                header: header(&transform.frame_id, transform.stamp),
                child_frame_id: transform.child_frame_id.clone(),
                transform: Transform {
                    translation: Vector3 {
                        x: pose.position.x,
                        y: pose.position.y,
                        z: pose.position.z,
                    },
                    rotation: pose.orientation,
                },
            }],
        };
        self.inner.publish(&message).map_err(|e| publish_failed("/tf", e))
    }
}

/// Publishes the traversal path, latched for late subscribers
pub struct RosPathPublisher {
    topic: String,
    inner: r2r::Publisher<Path>,
}

impl RosPathPublisher {
    /// Creates a transient-local publisher on `topic`
    pub fn new(node: &mut Node, topic: &str) -> Result<Self, RosError> {
        let qos = QosProfile::default()
            .keep_last(1)
            .durability(QosDurabilityPolicy::TransientLocal);
        let inner = node.create_publisher::<Path>(topic, qos)?;
        Ok(RosPathPublisher {
            topic: topic.to_string(),
            inner,
        })
    }
}

impl PathPublisher for RosPathPublisher {
    fn publish_path(&self, frame_id: &str, stamp: f64, poses: &[OrientedPose]) -> Result<(), NavigationError> {
        let message = Path {
            header: header(frame_id, stamp),
            poses: poses
                .iter()
                .map(|pose| PoseStamped {
                    header: header(frame_id, stamp),
                    pose: to_pose(pose),
                })
                .collect(),
        };
        self.inner.publish(&message).map_err(|e| publish_failed(&self.topic, e))
    }
}
