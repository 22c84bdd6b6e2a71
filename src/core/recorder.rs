// core/recorder.rs

// Buffers ground-truth poses while the run is alive and writes them out once,
// at finalization, as `ground_truth_poses.csv`.

use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column header of the ground-truth CSV
pub const GROUND_TRUTH_HEADER: &str = "t,x,y,theta,v_x,v_y,v_theta";

/// One ground-truth measurement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroundTruthSample {
    /// Stamp (seconds)
    pub t: f64,
    /// X position (meters)
    pub x: f64,
    /// Y position (meters)
    pub y: f64,
    /// Heading (radians)
    pub theta: f64,
    /// Linear velocity along x
    pub v_x: f64,
    /// Linear velocity along y
    pub v_y: f64,
    /// Angular velocity about z
    pub v_theta: f64,
}

/// Recorder shared between the subscription thread and the supervisor
pub type SharedRecorder = Arc<Mutex<GroundTruthRecorder>>;

/// In-memory buffer of ground-truth samples
#[derive(Debug, Default)]
pub struct GroundTruthRecorder {
    samples: Vec<GroundTruthSample>,
}

impl GroundTruthRecorder {
    /// Empty recorder
    pub fn new() -> Self {
        GroundTruthRecorder::default()
    }

    /// Empty recorder behind an `Arc<Mutex<_>>`
    pub fn shared() -> SharedRecorder {
        Arc::new(Mutex::new(GroundTruthRecorder::new()))
    }

    /// Buffers a sample
    pub fn push(&mut self, sample: GroundTruthSample) {
        self.samples.push(sample);
    }

    /// Buffered samples
    pub fn samples(&self) -> &[GroundTruthSample] {
        &self.samples
    }

    /// Writes header plus every sample to `path`, replacing the file.
    ///
    /// Returns the number of rows written.
    pub fn write_csv(&self, path: &Path) -> io::Result<usize> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", GROUND_TRUTH_HEADER)?;
        for s in &self.samples {
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                s.t, s.x, s.y, s.theta, s.v_x, s.v_y, s.v_theta
            )?;
        }
        writer.flush()?;

        info!("Wrote {} ground truth poses to {}", self.samples.len(), path.display());
        Ok(self.samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ground_truth_poses.csv");

        let mut recorder = GroundTruthRecorder::new();
        recorder.push(GroundTruthSample {
            t: 1.5,
            x: 2.0,
            y: -1.0,
            theta: 0.25,
            ..Default::default()
        });

        assert_eq!(recorder.write_csv(&path).unwrap(), 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "t,x,y,theta,v_x,v_y,v_theta\n1.5,2,-1,0.25,0,0,0\n");
    }

    #[test]
    fn test_empty_recorder_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ground_truth_poses.csv");

        assert_eq!(GroundTruthRecorder::new().write_csv(&path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "t,x,y,theta,v_x,v_y,v_theta\n");
    }
}
