use crate::core::error::{Error, Result};
use crate::core::session::SlotSignal;
use pcsc::{Context, ReaderState, State};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound on one status wait, so a missed cancel is still noticed
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Running monitor; stopping it closes the signal channel
pub struct MonitorHandle {
    context: Context,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Cancel the pending status wait and join the thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop.store(true, Ordering::SeqCst);
            if let Err(e) = self.context.cancel() {
                log::warn!("Failed to cancel card monitor: {e}");
            }
            if thread.join().is_err() {
                log::error!("Card monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Watch `readers` and send a signal whenever a card appears or leaves
///
/// The state found on the first poll is the baseline and is not reported.
pub fn start(context: Context, readers: &[String], signals: Sender<SlotSignal>) -> Result<MonitorHandle> {
    let cnames = readers
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(|_| Error::InvalidReaderName(name.clone())))
        .collect::<Result<Vec<_>>>()?;
    let names = readers.to_vec();
    let thread_context = context.clone();
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("card-monitor".into())
        .spawn(move || {
            let mut states: Vec<ReaderState> = cnames
                .into_iter()
                .map(|cname| ReaderState::new(cname, State::UNAWARE))
                .collect();
            watch(&thread_context, &names, &mut states, &signals, &thread_stop)
        })
        .map_err(Error::Monitor)?;

    log::info!("Monitoring {} reader(s)", readers.len());

    Ok(MonitorHandle {
        context,
        stop,
        thread: Some(thread),
    })
}

fn watch(
    context: &Context,
    names: &[String],
    states: &mut [ReaderState],
    signals: &Sender<SlotSignal>,
    stop: &AtomicBool,
) {
    let mut present = vec![false; states.len()];
    let mut baseline = true;

    while !stop.load(Ordering::SeqCst) {
        match context.get_status_change(POLL_TIMEOUT, states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => continue,
            Err(pcsc::Error::Cancelled) => {
                log::debug!("Card monitor cancelled");
                return;
            }
            Err(e) => {
                log::error!("Card monitor stopped: {e}");
                return;
            }
        }

        for (i, state) in states.iter_mut().enumerate() {
            let event = state.event_state();
            if baseline || event.contains(State::CHANGED) {
                state.sync_current_state();
                if event.intersects(State::UNAVAILABLE | State::UNKNOWN) {
                    log::warn!("Reader {} became unavailable", names[i]);
                }
            }

            let (now_present, edge) = transition(baseline, present[i], event);
            if baseline && now_present {
                log::info!("Card already present on {}", names[i]);
            }
            present[i] = now_present;

            let signal = match edge {
                Some(true) => SlotSignal::Inserted {
                    reader: names[i].clone(),
                    at: Instant::now(),
                },
                Some(false) => SlotSignal::Removed {
                    reader: names[i].clone(),
                },
                None => continue,
            };
            if signals.send(signal).is_err() {
                log::debug!("Signal receiver gone, card monitor exiting");
                return;
            }
        }
        baseline = false;
    }
    log::debug!("Card monitor stopped");
}

/// Presence after one status report, plus the edge to signal if any
///
/// `Some(true)` is an insertion, `Some(false)` a removal. The baseline poll
/// and reports without `CHANGED` never produce an edge. A mute card counts
/// as absent.
fn transition(baseline: bool, was_present: bool, event: State) -> (bool, Option<bool>) {
    if !baseline && !event.contains(State::CHANGED) {
        return (was_present, None);
    }

    let now_present = event.contains(State::PRESENT) && !event.contains(State::MUTE);
    if baseline || now_present == was_present {
        return (now_present, None);
    }
    (now_present, Some(now_present))
}
