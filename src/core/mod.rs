// core/mod.rs

// Run bookkeeping shared by the supervisor and the ROS adapter: the lifecycle
// state machine, the event log and the ground-truth recorder.

pub mod events;
pub mod recorder;
pub mod state;

pub use events::{backup_file_if_exists, Clock, EventLog, RunEvent, SystemClock};
pub use recorder::{GroundTruthRecorder, GroundTruthSample, SharedRecorder};
pub use state::{transition, FailureReason, RunEventKind, RunInput, RunState, Transition};
