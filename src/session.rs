use crate::config::StreamConfig;
use crate::device;
use crate::rotation::Rotation;
use crate::stream::ImuStream;
use crate::tracker::HeadTracker;
use crate::transport::Transport;
use crate::types::{StatsSnapshot, StopReason, StreamState};
use crate::Result;
use std::sync::Arc;

/// Host-facing lifecycle around one head-tracking stream.
///
/// `start`, `reset` and `orientation` never block on I/O; `stop` waits at
/// most the configured join grace period.
pub struct Session {
    config: StreamConfig,
    tracker: Arc<HeadTracker>,
    stream: Option<ImuStream>,
    last_error: Option<String>,
    last_stop: Option<StopReason>,
    last_stats: StatsSnapshot,
}

impl Session {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            tracker: Arc::new(HeadTracker::new()),
            stream: None,
            last_error: None,
            last_stop: None,
            last_stats: StatsSnapshot::default(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Shared tracker, for consumers that sample it from their own thread.
    pub fn tracker(&self) -> Arc<HeadTracker> {
        self.tracker.clone()
    }

    /// Open the configured device and start streaming from it.
    pub fn start_device(&mut self) -> Result<()> {
        self.stop();
        match device::open_transport(&self.config) {
            Ok(transport) => self.start(transport),
            Err(e) => {
                log::error!("Failed to open sensor: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Start streaming from an already opened and claimed transport.
    ///
    /// A running stream is stopped first; the orientation is kept.
    pub fn start<T: Transport + 'static>(&mut self, transport: T) -> Result<()> {
        self.stop();
        self.last_error = None;
        self.last_stop = None;
        match ImuStream::start(transport, self.tracker.clone(), &self.config) {
            Ok(stream) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop the stream, if any. Returns `None` when nothing was running.
    ///
    /// The final counters stay readable through [`Session::stats`].
    pub fn stop(&mut self) -> Option<StopReason> {
        let mut stream = self.stream.take()?;
        let reason = stream.stop();
        self.last_stats = stream.stats();
        self.last_stop = reason.clone();
        reason
    }

    pub fn reset(&self) {
        self.tracker.reset();
        log::info!("Orientation reset");
    }

    pub fn orientation(&self) -> Rotation {
        self.tracker.snapshot()
    }

    pub fn state(&self) -> StreamState {
        match &self.stream {
            Some(stream) => stream.state(),
            None if self.last_stop.is_some() || self.last_error.is_some() => StreamState::Stopped,
            None => StreamState::Idle,
        }
    }

    /// Counters of the running stream, or of the last one once stopped.
    pub fn stats(&self) -> StatsSnapshot {
        match &self.stream {
            Some(stream) => stream.stats(),
            None => self.last_stats,
        }
    }

    /// One-line status for display, including why the stream last stopped.
    pub fn status(&mut self) -> String {
        if let Some(stream) = self.stream.as_mut() {
            if stream.state() == StreamState::Stopped {
                self.last_stop = stream.wait(std::time::Duration::ZERO);
            } else {
                return stream.state().to_string();
            }
        }
        if let Some(err) = &self.last_error {
            return format!("Stopped: {}", err);
        }
        match &self.last_stop {
            Some(reason) => format!("Stopped: {}", reason),
            None => self.state().to_string(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
