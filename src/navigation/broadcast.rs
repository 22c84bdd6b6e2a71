// src/navigation/broadcast.rs
// Republishes the initial pose as a standing transform at a fixed rate from a
// background thread. The thread only reads its own copy of the transform.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{PoseBroadcaster, StampedTransform};
use crate::core::Clock;

const STOP_POLL: Duration = Duration::from_millis(50);

/// Handle of the periodic broadcast thread; stops it on drop
pub struct TransformTimer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransformTimer {
    /// Starts publishing `transform` every `1 / rate_hz` seconds
    pub fn start(
        broadcaster: Arc<dyn PoseBroadcaster>,
        clock: Arc<dyn Clock>,
        transform: StampedTransform,
        rate_hz: f64,
    ) -> std::io::Result<Self> {
        let period = Duration::try_from_secs_f64(1.0 / rate_hz).unwrap_or(Duration::MAX);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("transform-broadcast".to_string())
            .spawn(move || {
                let mut transform = transform;
                let mut failures = 0u64;
                while thread_running.load(Ordering::Relaxed) {
                    let tick = Instant::now();
                    transform.stamp = clock.now();
                    if let Err(e) = broadcaster.send_transform(&transform) {
                        failures += 1;
                        // one report per second of failures is plenty
                        if failures == 1 || failures % 20 == 0 {
                            warn!("Transform broadcast failed ({} times): {}", failures, e);
                        }
                    }
                    // sleep in slices so a stop request never waits a whole period
                    while thread_running.load(Ordering::Relaxed) {
                        let Some(rest) = period.checked_sub(tick.elapsed()) else {
                            break;
                        };
                        thread::sleep(rest.min(STOP_POLL));
                    }
                }
                debug!("Transform broadcast stopped");
            })?;

        Ok(TransformTimer {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still publishing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the thread and waits for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Transform broadcast thread panicked");
            }
        }
    }
}

impl Drop for TransformTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
