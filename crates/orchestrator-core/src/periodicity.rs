//! Optional per-component timer driving `Finished -> Running` cycles for
//! one-shot scripts (spec §4.C).

use crate::component::Event;
use crate::recipe::TimerSpec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// A single-shot, re-armed timer. Each fire re-arms itself for another
/// fuzzed period unless the component has been shut down.
///
/// Fuzz arithmetic is grounded on the teacher's `retry::JitterStrategy`
/// computation (`fastrand`-seeded full jitter), reused here for the
/// timer's `period * (1 +/- rand * fuzz)` formula rather than for retry
/// control flow.
pub struct TimerHandle {
    disarmed: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Disarm the timer synchronously; no further fires occur after this
    /// returns (spec §5, "Timers are disarmed synchronously before
    /// shutdown steps run").
    pub fn disarm(&self) {
        self.disarmed.store(true, Ordering::SeqCst);
    }
}

/// Compute the fuzzed fire delay for one cycle: `period * (1 +/- rand *
/// fuzz)`, clamped so the delay never goes negative.
fn fuzzed_delay(spec: &TimerSpec) -> Duration {
    let fuzz = spec.fuzz.clamp(0.0, 1.0);
    let sign = if fastrand::bool() { 1.0 } else { -1.0 };
    let factor = 1.0 + sign * fastrand::f64() * fuzz;
    let factor = factor.max(0.0);
    Duration::from_secs_f64(spec.period.as_secs_f64() * factor)
}

/// Arm a timer for `owner`'s recipe, delivering `Event::TimerFired` into
/// `event_tx` on each fire. `is_running` is polled at fire time so an
/// overlapping fire while the component is still `Running` is coalesced
/// (dropped) rather than queued, per spec §4.C.
pub fn arm<F>(spec: TimerSpec, event_tx: mpsc::Sender<Event>, is_running: F) -> TimerHandle
where
    F: Fn() -> bool + Send + 'static,
{
    let disarmed = Arc::new(AtomicBool::new(false));
    let task_disarmed = Arc::clone(&disarmed);

    tokio::spawn(async move {
        loop {
            let delay = fuzzed_delay(&spec);
            tokio::time::sleep(delay).await;

            if task_disarmed.load(Ordering::SeqCst) {
                break;
            }

            if is_running() {
                debug!("timer fire coalesced: component still running");
                continue;
            }

            if event_tx.send(Event::TimerFired).await.is_err() {
                break;
            }
        }
    });

    TimerHandle { disarmed }
}
