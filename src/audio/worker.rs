//! Alert dispatch from the frame loop

use super::device::PcmBackend;
use super::player::{AlertPlayer, PlaybackReport};
use super::AlertError;
use std::sync::mpsc::{self, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// A detection that crossed the proximity threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub frame_index: u64,
    pub class_id: usize,
    pub label: String,
    pub normalized_area: i64,
}

/// Result of one alert, as seen by an observer
#[derive(Debug)]
pub struct AlertOutcome {
    pub request: AlertRequest,
    pub result: Result<PlaybackReport, AlertError>,
}

/// Receives alert requests from the pipeline.
///
/// Failures stay inside the sink and are logged; the frame loop never sees
/// them.
pub trait AlertSink: Send {
    fn trigger(&mut self, request: AlertRequest);
}

fn log_outcome(request: &AlertRequest, result: &Result<PlaybackReport, AlertError>) {
    match result {
        Ok(report) => debug!(
            "Alert for {} (frame {}) wrote {} periods",
            request.label, request.frame_index, report.periods_written
        ),
        Err(e) => warn!(
            "Alert for {} (frame {}) failed: {}",
            request.label, request.frame_index, e
        ),
    }
}

/// Plays every alert inline, so the caller waits for the clip to finish
pub struct BlockingAlerts<B: PcmBackend> {
    player: AlertPlayer<B>,
}

impl<B: PcmBackend> BlockingAlerts<B> {
    pub fn new(player: AlertPlayer<B>) -> Self {
        Self { player }
    }
}

impl<B: PcmBackend + Send> AlertSink for BlockingAlerts<B> {
    fn trigger(&mut self, request: AlertRequest) {
        info!(
            "Proximity alert: {} (normalized area {})",
            request.label, request.normalized_area
        );
        let result = self.player.play_alert();
        log_outcome(&request, &result);
    }
}

/// Plays alerts on a dedicated thread, one session at a time, in the order
/// they were queued. When the queue is full new requests are dropped.
pub struct AlertWorker {
    sender: Option<SyncSender<AlertRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl AlertWorker {
    pub fn spawn<B>(player: AlertPlayer<B>, capacity: usize) -> Result<Self, AlertError>
    where
        B: PcmBackend + Send + 'static,
    {
        Self::start(player, capacity, None)
    }

    /// Like [`AlertWorker::spawn`], also reporting each finished alert on
    /// `observer`
    pub fn spawn_observed<B>(
        player: AlertPlayer<B>,
        capacity: usize,
        observer: Sender<AlertOutcome>,
    ) -> Result<Self, AlertError>
    where
        B: PcmBackend + Send + 'static,
    {
        Self::start(player, capacity, Some(observer))
    }

    fn start<B>(
        player: AlertPlayer<B>,
        capacity: usize,
        observer: Option<Sender<AlertOutcome>>,
    ) -> Result<Self, AlertError>
    where
        B: PcmBackend + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<AlertRequest>(capacity.max(1));

        let handle = thread::Builder::new()
            .name("alert-player".to_string())
            .spawn(move || {
                for request in receiver {
                    info!(
                        "Proximity alert: {} (normalized area {})",
                        request.label, request.normalized_area
                    );
                    let result = player.play_alert();
                    log_outcome(&request, &result);
                    if let Some(observer) = &observer {
                        // Observer going away does not stop playback
                        let _ = observer.send(AlertOutcome { request, result });
                    }
                }
                debug!("Alert worker exiting");
            })
            .map_err(|e| AlertError::WorkerStopped(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue an alert without blocking
    pub fn enqueue(&self, request: AlertRequest) -> Result<(), AlertError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| AlertError::WorkerStopped("worker shut down".to_string()))?;

        sender.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => AlertError::QueueFull,
            TrySendError::Disconnected(_) => {
                AlertError::WorkerStopped("playback thread exited".to_string())
            }
        })
    }

    /// Stop accepting alerts and wait for queued ones to finish
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Alert worker panicked");
            }
        }
    }
}

impl AlertSink for AlertWorker {
    fn trigger(&mut self, request: AlertRequest) {
        let label = request.label.clone();
        if let Err(e) = self.enqueue(request) {
            warn!("Dropping alert for {}: {}", label, e);
        }
    }
}

impl Drop for AlertWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::tests::{raw_clip, small_params, Event, MockBackend};
    use std::time::Duration;

    fn request(frame_index: u64) -> AlertRequest {
        AlertRequest {
            frame_index,
            class_id: 0,
            label: "person".to_string(),
            normalized_area: 30,
        }
    }

    #[test]
    fn test_worker_plays_in_order_without_overlap() {
        let clip = raw_clip(8 * 2);
        let mut backend = MockBackend::new();
        backend.write_delay = Some(Duration::from_millis(5));
        let player = AlertPlayer::new(backend.clone(), clip.path(), small_params());

        let (tx, rx) = mpsc::channel();
        let mut worker = AlertWorker::spawn_observed(player, 8, tx).unwrap();
        for frame in 0..3 {
            worker.enqueue(request(frame)).unwrap();
        }
        worker.shutdown();

        let order: Vec<u64> = rx.iter().map(|o| o.request.frame_index).collect();
        assert_eq!(order, vec![0, 1, 2]);

        // Every session closes before the next one opens
        let mut open = false;
        for event in backend.events() {
            match event {
                Event::Open => {
                    assert!(!open, "sessions overlapped");
                    open = true;
                }
                Event::Release => open = false,
                _ => assert!(open),
            }
        }
        assert!(!open);
    }

    #[test]
    fn test_full_queue_drops_requests() {
        let clip = raw_clip(8 * 4);
        let mut backend = MockBackend::new();
        backend.write_delay = Some(Duration::from_millis(50));
        let player = AlertPlayer::new(backend, clip.path(), small_params());

        let worker = AlertWorker::spawn(player, 1).unwrap();
        let results: Vec<_> = (0..10).map(|i| worker.enqueue(request(i))).collect();

        assert!(results[0].is_ok());
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AlertError::QueueFull))));
    }

    #[test]
    fn test_failed_alert_does_not_stop_worker() {
        let clip = raw_clip(8);
        let backend = MockBackend::new();
        let player = AlertPlayer::new(backend, "/nonexistent/sound.raw", small_params());

        let (tx, rx) = mpsc::channel();
        let mut worker = AlertWorker::spawn_observed(player, 4, tx).unwrap();
        worker.enqueue(request(1)).unwrap();
        worker.enqueue(request(2)).unwrap();
        worker.shutdown();

        let outcomes: Vec<_> = rx.iter().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.result, Err(AlertError::AssetMissing { .. }))));
        drop(clip);
    }

    #[test]
    fn test_enqueue_after_shutdown_fails() {
        let clip = raw_clip(8);
        let player = AlertPlayer::new(MockBackend::new(), clip.path(), small_params());

        let mut worker = AlertWorker::spawn(player, 2).unwrap();
        worker.shutdown();
        assert!(matches!(
            worker.enqueue(request(0)),
            Err(AlertError::WorkerStopped(_))
        ));
    }

    #[test]
    fn test_blocking_alerts_play_inline() {
        let clip = raw_clip(8 * 2);
        let backend = MockBackend::new();
        let player = AlertPlayer::new(backend.clone(), clip.path(), small_params());

        let mut sink = BlockingAlerts::new(player);
        sink.trigger(request(0));
        sink.trigger(request(1));

        let events = backend.events();
        assert_eq!(events.iter().filter(|e| **e == Event::Open).count(), 2);
        assert_eq!(events.last(), Some(&Event::Release));
    }
}
