// src/config.rs
// Supervisor configuration, loaded from YAML. Every key has a default so a
// config file only needs to name what differs (usually the graph and output paths).

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// How goals are drawn from the goal pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One goal chosen uniformly at random
    #[default]
    SingleRandom,
    /// Every goal in tour order
    FullTour,
}

/// Configuration of a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Frame goals and the traversal path are expressed in
    pub fixed_frame: String,
    /// Child frame of the standing initial-pose transform
    pub robot_base_frame: String,
    /// Robot footprint radius (meters)
    pub robot_radius: f64,
    /// Minimum clearance of graph locations; `2 * robot_radius` when unset
    pub clearance_radius: Option<f64>,
    /// Root folder of the run's output
    pub run_output_folder: PathBuf,
    /// Traversal graph file
    pub graph_path: PathBuf,
    /// Edge attribute holding the traversal distance
    pub weight_attribute: String,
    /// Upper bound on the whole run (seconds)
    pub run_timeout: f64,
    /// Upper bound on waiting for the navigation interface (seconds)
    pub wait_timeout: f64,
    /// Initial-pose transform rate (Hz)
    pub transform_rate: f64,
    /// Goal dispatch strategy
    pub dispatch_mode: DispatchMode,
    /// Seed of the planning/dispatch random source; fresh entropy when unset
    pub seed: Option<u64>,
    /// ROS 2 names
    pub ros: RosConfig,
}

/// ROS 2 specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosConfig {
    /// Node name
    pub node_name: String,
    /// QoS history depth
    pub qos_depth: usize,
    /// Navigate-to-pose action name
    pub navigate_to_pose_action: String,
    /// Ground-truth odometry topic
    pub ground_truth_pose_topic: String,
    /// Topic of the traversal path (latched)
    pub traversal_path_topic: String,
    /// Global plan topics of the planners under test
    pub global_plan_topics: Vec<String>,
}

impl Default for RosConfig {
    fn default() -> Self {
        RosConfig {
            node_name: "global_planning_benchmark_supervisor".to_string(),
            qos_depth: 10,
            navigate_to_pose_action: "navigate_to_pose".to_string(),
            ground_truth_pose_topic: "/odom".to_string(),
            traversal_path_topic: "~/traversal_path".to_string(),
            global_plan_topics: vec![
                "/move_base/NavfnROS/plan".to_string(),
                "/move_base/GlobalPlanner/plan".to_string(),
            ],
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            fixed_frame: "map".to_string(),
            robot_base_frame: "base_footprint".to_string(),
            robot_radius: 0.2,
            clearance_radius: None,
            run_output_folder: PathBuf::from("output"),
            graph_path: PathBuf::from("graph.yaml"),
            weight_attribute: "voronoi_path_distance".to_string(),
            run_timeout: 3600.0,
            wait_timeout: 5.0,
            transform_rate: 20.0,
            dispatch_mode: DispatchMode::SingleRandom,
            seed: None,
            ros: RosConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be opened
    #[error("could not open config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// YAML did not match the expected layout
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl SupervisorConfig {
    /// Loads and validates a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SupervisorConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML document
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = serde_yaml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("run_timeout", self.run_timeout),
            ("wait_timeout", self.wait_timeout),
            ("transform_rate", self.transform_rate),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        let durations = [
            ("run_timeout", self.run_timeout),
            ("wait_timeout", self.wait_timeout),
            ("transform_rate period", 1.0 / self.transform_rate),
        ];
        for (name, seconds) in durations {
            if Duration::try_from_secs_f64(seconds).is_err() {
                return Err(ConfigError::Invalid(format!("{} of {} s is out of range", name, seconds)));
            }
        }

        if !(self.robot_radius.is_finite() && self.robot_radius >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "robot_radius must be non-negative, got {}",
                self.robot_radius
            )));
        }
        if let Some(radius) = self.clearance_radius {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "clearance_radius must be non-negative, got {}",
                    radius
                )));
            }
        }
        if self.weight_attribute.is_empty() {
            return Err(ConfigError::Invalid("weight_attribute is empty".to_string()));
        }
        if self.fixed_frame.is_empty() || self.robot_base_frame.is_empty() {
            return Err(ConfigError::Invalid("frame names must not be empty".to_string()));
        }
        Ok(())
    }

    /// Clearance the graph source enforces on locations
    pub fn minimum_radius(&self) -> f64 {
        self.clearance_radius.unwrap_or(2.0 * self.robot_radius)
    }

    /// `<run_output_folder>/benchmark_data`
    pub fn benchmark_data_folder(&self) -> PathBuf {
        self.run_output_folder.join("benchmark_data")
    }

    /// Event log path
    pub fn run_events_path(&self) -> PathBuf {
        self.benchmark_data_folder().join("run_events.csv")
    }

    /// Ground-truth CSV path
    pub fn ground_truth_poses_path(&self) -> PathBuf {
        self.benchmark_data_folder().join("ground_truth_poses.csv")
    }

    /// Navigation wait bound; saturates for unvalidated values
    pub fn wait_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.wait_timeout).unwrap_or(Duration::MAX)
    }

    /// Whole-run bound; saturates for unvalidated values
    pub fn run_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.run_timeout).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = SupervisorConfig::from_yaml(
            "graph_path: maps/office.yaml\nrobot_radius: 0.3\ndispatch_mode: full_tour\nros:\n  node_name: bench\n",
        )
        .unwrap();

        assert_eq!(config.graph_path, PathBuf::from("maps/office.yaml"));
        assert_eq!(config.dispatch_mode, DispatchMode::FullTour);
        assert_eq!(config.ros.node_name, "bench");
        assert_eq!(config.ros.qos_depth, 10);
        assert_eq!(config.wait_timeout(), Duration::from_secs(5));
        assert!((config.minimum_radius() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_clearance_wins() {
        let config = SupervisorConfig::from_yaml("robot_radius: 0.3\nclearance_radius: 0.1\n").unwrap();
        assert_eq!(config.minimum_radius(), 0.1);
    }

    #[test]
    fn test_output_layout() {
        let config = SupervisorConfig {
            run_output_folder: PathBuf::from("/tmp/run_0"),
            ..Default::default()
        };
        assert_eq!(
            config.run_events_path(),
            PathBuf::from("/tmp/run_0/benchmark_data/run_events.csv")
        );
        assert_eq!(
            config.ground_truth_poses_path(),
            PathBuf::from("/tmp/run_0/benchmark_data/ground_truth_poses.csv")
        );
    }

    #[test]
    fn test_unvalidated_durations_saturate() {
        let config = SupervisorConfig {
            run_timeout: 1e300,
            wait_timeout: -1.0,
            ..Default::default()
        };
        assert_eq!(config.run_timeout(), Duration::MAX);
        assert_eq!(config.wait_timeout(), Duration::MAX);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            SupervisorConfig::from_yaml("wait_timeout: 0.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SupervisorConfig::from_yaml("robot_radius: -1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SupervisorConfig::from_yaml("run_timeout: 1e300\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SupervisorConfig::from_yaml("transform_rate: 1e-300\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SupervisorConfig::from_yaml("dispatch_mode: patrol\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
