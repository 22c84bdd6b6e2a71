// src/ros_interface/subscriber.rs
// Subscriptions of the supervisor. Each stream is drained on its own thread;
// messages only touch shared state through the recorder's mutex.

use futures::StreamExt;
use log::{debug, info};
use nalgebra::{Quaternion, UnitQuaternion};
use r2r::nav_msgs::msg::{Odometry, Path};
use r2r::{Node, QosProfile};
use std::sync::PoisonError;
use std::thread;

use super::RosError;
use crate::core::{GroundTruthSample, SharedRecorder};

fn sample_from(odometry: &Odometry) -> GroundTruthSample {
    let stamp = &odometry.header.stamp;
    let pose = &odometry.pose.pose;
    let twist = &odometry.twist.twist;
    let orientation = UnitQuaternion::from_quaternion(Quaternion::new(
        pose.orientation.w,
        pose.orientation.x,
        pose.orientation.y,
        pose.orientation.z,
    ));

    GroundTruthSample {
        t: stamp.sec as f64 + stamp.nanosec as f64 * 1e-9,
        x: pose.position.x,
        y: pose.position.y,
        theta: orientation.euler_angles().2,
        v_x: twist.linear.x,
        v_y: twist.linear.y,
        v_theta: twist.angular.z,
    }
}

/// Buffers every odometry message of `topic` into `recorder`
pub(super) fn record_ground_truth(
    node: &mut Node,
    topic: &str,
    qos: QosProfile,
    recorder: SharedRecorder,
) -> Result<(), RosError> {
    let stream = node.subscribe::<Odometry>(topic, qos)?;
    info!("Recording ground truth poses from {}", topic);

    thread::Builder::new()
        .name("ground-truth".to_string())
        .spawn(move || {
            futures::executor::block_on(stream.for_each(|odometry| {
                let sample = sample_from(&odometry);
                recorder
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(sample);
                futures::future::ready(())
            }));
            debug!("Ground truth stream closed");
        })
        .map_err(|source| RosError::Thread {
            name: "ground-truth",
            source,
        })?;
    Ok(())
}

/// Logs the first plan received on `topic` and counts the rest
pub(super) fn observe_global_plan(node: &mut Node, topic: &str, qos: QosProfile) -> Result<(), RosError> {
    let stream = node.subscribe::<Path>(topic, qos)?;
    let topic = topic.to_string();

    thread::Builder::new()
        .name("global-plan".to_string())
        .spawn(move || {
            let mut received = 0usize;
            futures::executor::block_on(stream.for_each(|plan| {
                received += 1;
                if received == 1 {
                    info!("Global plan received on {} ({} poses)", topic, plan.poses.len());
                } else {
                    debug!("Global plan #{} on {} ({} poses)", received, topic, plan.poses.len());
                }
                futures::future::ready(())
            }));
        })
        .map_err(|source| RosError::Thread {
            name: "global-plan",
            source,
        })?;
    Ok(())
}
