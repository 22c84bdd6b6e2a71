// src/planning/poses.rs
// Turns a tour into oriented poses. The first pose is the run's initial pose,
// the rest form the goal pool handed to the navigation stack.

use nalgebra::{UnitQuaternion, Vector3};
use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::f64::consts::PI;

use super::tour::Tour;
use super::PlanningError;
use crate::graph::{Graph, GraphError};

/// Planar pose: position from a graph node, yaw drawn at planning time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedPose {
    /// X position (meters)
    pub x: f64,
    /// Y position (meters)
    pub y: f64,
    /// Heading in (-pi, pi] (radians)
    pub yaw: f64,
}

impl OrientedPose {
    /// Pose at `(x, y)` facing `yaw`
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        OrientedPose { x, y, yaw }
    }

    /// Rotation about the z axis as a unit quaternion
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.yaw)
    }
}

/// Uniform heading in (-pi, pi]
pub fn random_yaw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen_range samples [-pi, pi); the negation moves the closed end to +pi
    -rng.gen_range(-PI..PI)
}

/// One pose per tour node, in tour order
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSequence {
    poses: Vec<OrientedPose>,
}

impl PoseSequence {
    /// Copies node positions from `graph` and draws one yaw per node
    pub fn from_tour<R: Rng + ?Sized>(
        tour: &Tour,
        graph: &Graph,
        rng: &mut R,
    ) -> Result<Self, PlanningError> {
        let mut poses = Vec::with_capacity(tour.len());
        for &id in tour.nodes() {
            let node = graph.node(id).ok_or(GraphError::UnknownNode(id))?;
            poses.push(OrientedPose::new(
                node.position.x,
                node.position.y,
                random_yaw(rng),
            ));
        }
        Ok(PoseSequence { poses })
    }

    /// Poses in tour order
    pub fn poses(&self) -> &[OrientedPose] {
        &self.poses
    }

    /// Number of poses
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// True if there are no poses
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Splits off index 0 as the initial pose; the rest become the goal pool
    pub fn split_initial(self) -> Option<(OrientedPose, GoalPool)> {
        let mut poses = self.poses.into_iter();
        let initial = poses.next()?;
        Some((initial, GoalPool::new(poses.collect())))
    }
}

/// Immutable goal candidates with a record of which ones were dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct GoalPool {
    poses: Vec<OrientedPose>,
    consumed: BTreeSet<usize>,
    cursor: usize,
}

impl GoalPool {
    /// Pool over `poses`, nothing consumed
    pub fn new(poses: Vec<OrientedPose>) -> Self {
        GoalPool {
            poses,
            consumed: BTreeSet::new(),
            cursor: 0,
        }
    }

    /// All candidates, consumed or not, in tour order
    pub fn poses(&self) -> &[OrientedPose] {
        &self.poses
    }

    /// Total number of candidates
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// True if the pool never had candidates
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Candidates not yet dispatched
    pub fn remaining(&self) -> usize {
        self.poses.len() - self.consumed.len()
    }

    /// Whether `index` was already dispatched
    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.contains(&index)
    }

    /// Takes an unconsumed candidate chosen uniformly at random
    pub fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(usize, OrientedPose)> {
        let index = (0..self.poses.len())
            .filter(|index| !self.consumed.contains(index))
            .choose(rng)?;
        self.consumed.insert(index);
        Some((index, self.poses[index]))
    }

    /// Takes the next unconsumed candidate in tour order
    pub fn take_next(&mut self) -> Option<(usize, OrientedPose)> {
        while self.cursor < self.poses.len() {
            let index = self.cursor;
            self.cursor += 1;
            if self.consumed.insert(index) {
                return Some((index, self.poses[index]));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(n: usize) -> GoalPool {
        GoalPool::new((0..n).map(|i| OrientedPose::new(i as f64, 0.0, 0.0)).collect())
    }

    #[test]
    fn test_yaw_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let yaw = random_yaw(&mut rng);
            assert!(yaw > -PI && yaw <= PI, "yaw {} out of range", yaw);
        }
    }

    #[test]
    fn test_orientation_matches_yaw() {
        let pose = OrientedPose::new(1.0, 2.0, PI / 2.0);
        let q = pose.orientation();
        assert!((q.angle() - PI / 2.0).abs() < 1e-12);
        assert!((q.k - (PI / 4.0).sin()).abs() < 1e-12);
        assert!((q.w - (PI / 4.0).cos()).abs() < 1e-12);
    }

    #[test]
    fn test_random_and_sequential_share_consumption() {
        let mut goals = pool(4);
        let mut rng = StdRng::seed_from_u64(11);

        let (picked, _) = goals.take_random(&mut rng).unwrap();
        assert!(goals.is_consumed(picked));
        assert_eq!(goals.remaining(), 3);

        let mut rest = Vec::new();
        while let Some((index, _)) = goals.take_next() {
            rest.push(index);
        }
        assert_eq!(rest.len(), 3);
        assert!(!rest.contains(&picked));
        assert_eq!(goals.remaining(), 0);
        assert!(goals.take_random(&mut rng).is_none());
        assert_eq!(goals.len(), 4);
    }

    #[test]
    fn test_split_initial_on_empty_sequence() {
        let empty = PoseSequence { poses: Vec::new() };
        assert!(empty.split_initial().is_none());
    }
}
