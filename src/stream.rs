use crate::config::{StreamConfig, MIN_READ_TIMEOUT};
use crate::protocol::{Decoded, PacketDecoder, PoseLayout};
use crate::tracker::HeadTracker;
use crate::transport::Transport;
use crate::types::{Profile, StatsSnapshot, StopReason, StreamState};
use crate::{Result, TrackerError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Back-off after a read that returned no bytes without waiting.
const IDLE_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct StreamStats {
    packets: AtomicU64,
    rejected: AtomicU64,
    timeouts: AtomicU64,
    io_errors: AtomicU64,
}

impl StreamStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    stop_flag: AtomicBool,
    stats: StreamStats,
}

impl Shared {
    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Parameters copied into the reader thread.
#[derive(Debug, Clone, Copy)]
struct LoopParams {
    profile: Profile,
    pose_layout: PoseLayout,
    read_timeout: Duration,
    max_consecutive_errors: u32,
}

/// Handle to the background acquisition loop.
///
/// The reader thread owns the transport for its whole life, feeds decoded
/// samples into the shared [`HeadTracker`], and closes the transport on exit.
pub struct ImuStream {
    shared: Arc<Shared>,
    done: Receiver<StopReason>,
    outcome: Option<StopReason>,
    thread: Option<std::thread::JoinHandle<()>>,
    join_grace: Duration,
}

impl ImuStream {
    /// Spawn the reader thread on an opened, claimed transport.
    pub fn start<T>(transport: T, tracker: Arc<HeadTracker>, config: &StreamConfig) -> Result<ImuStream>
    where
        T: Transport + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(StreamState::Enabling as u8),
            stop_flag: AtomicBool::new(false),
            stats: StreamStats::default(),
        });
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let params = LoopParams {
            profile: config.profile,
            pose_layout: config.pose_layout,
            read_timeout: config.read_timeout.max(MIN_READ_TIMEOUT),
            max_consecutive_errors: config.max_consecutive_errors.max(1),
        };

        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("rayneo-imu".into())
            .spawn(move || {
                reader_loop(transport, tracker, thread_shared, params, done_tx);
            })
            .map_err(|e| TrackerError::ThreadSpawn(e.to_string()))?;

        Ok(ImuStream {
            shared,
            done: done_rx,
            outcome: None,
            thread: Some(thread),
            join_grace: config.join_grace,
        })
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Check if the loop is still enabling or streaming.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), StreamState::Enabling | StreamState::Streaming)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Why the loop stopped, once it has been observed stopping.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.outcome.as_ref()
    }

    /// Wait up to `timeout` for the loop to end on its own.
    pub fn wait(&mut self, timeout: Duration) -> Option<StopReason> {
        if self.outcome.is_none() {
            // Abandoned by an earlier stop().
            self.thread.as_ref()?;

            let reason = match self.done.recv_timeout(timeout) {
                Ok(reason) => reason,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.shared.set_state(StreamState::Stopped);
                    StopReason::Aborted
                }
            };
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            self.outcome = Some(reason);
        }
        self.outcome.clone()
    }

    /// Request cancellation and wait up to the join grace period.
    ///
    /// A thread that does not finish in time is detached and left to exit on
    /// its own; the stream then reports `Stopped` with [`StopReason::Unresponsive`].
    pub fn stop(&mut self) -> Option<StopReason> {
        self.shared.stop_flag.store(true, Ordering::Release);
        let reason = self.wait(self.join_grace);
        if reason.is_none() && self.thread.take().is_some() {
            log::warn!(
                "IMU reader did not stop within {:?}, abandoning it",
                self.join_grace
            );
            self.shared.set_state(StreamState::Stopped);
            self.outcome = Some(StopReason::Unresponsive);
        }
        self.outcome.clone()
    }
}

impl Drop for ImuStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reader_loop<T: Transport>(
    mut transport: T,
    tracker: Arc<HeadTracker>,
    shared: Arc<Shared>,
    params: LoopParams,
    done: Sender<StopReason>,
) {
    log::info!("IMU reader started ({:?})", params.profile);

    let reason = run(&mut transport, &tracker, &shared, &params);
    transport.close();

    let stats = shared.stats.snapshot();
    log::info!(
        "IMU reader stopped: {} (packets={} rejected={} timeouts={} ioErrors={})",
        reason,
        stats.packets,
        stats.rejected,
        stats.timeouts,
        stats.io_errors
    );
    // Reason first, so whoever sees `Stopped` can collect it without waiting.
    let _ = done.send(reason);
    shared.set_state(StreamState::Stopped);
}

fn run<T: Transport>(
    transport: &mut T,
    tracker: &HeadTracker,
    shared: &Shared,
    params: &LoopParams,
) -> StopReason {
    shared.set_state(StreamState::Enabling);
    if let Err(e) = transport.enable_sensor_stream() {
        log::error!("Could not enable IMU stream: {}", e);
        return StopReason::EnableFailed(e.to_string());
    }
    shared.set_state(StreamState::Streaming);

    let stats = &shared.stats;
    let mut decoder = PacketDecoder::new(params.profile, params.pose_layout);
    let mut buf = vec![0u8; transport.report_size()];
    let mut last_sample: Option<Instant> = None;
    let mut consecutive_errors: u32 = 0;

    loop {
        if shared.stop_flag.load(Ordering::Acquire) {
            return StopReason::Cancelled;
        }

        let len = match transport.read(&mut buf, params.read_timeout) {
            Ok(0) => {
                StreamStats::bump(&stats.timeouts);
                std::thread::sleep(IDLE_BACKOFF.min(params.read_timeout));
                continue;
            }
            Ok(n) => {
                consecutive_errors = 0;
                n
            }
            Err(TrackerError::Timeout) => {
                StreamStats::bump(&stats.timeouts);
                continue;
            }
            Err(e) => {
                StreamStats::bump(&stats.io_errors);
                consecutive_errors += 1;
                log::warn!(
                    "IMU read error ({}/{}): {}",
                    consecutive_errors,
                    params.max_consecutive_errors,
                    e
                );
                if consecutive_errors >= params.max_consecutive_errors {
                    return StopReason::IoErrorThreshold(consecutive_errors);
                }
                continue;
            }
        };

        let now = Instant::now();
        match decoder.decode(&buf[..len]) {
            Ok(Decoded::Imu(sample)) => {
                StreamStats::bump(&stats.packets);
                // The first sample only anchors the clock.
                if let Some(prev) = last_sample.replace(now) {
                    let dt = now.duration_since(prev).as_secs_f64();
                    tracker.update(sample.gyro_rad.map(f64::from), dt);
                }
            }
            Ok(Decoded::Pose(pose)) => {
                StreamStats::bump(&stats.packets);
                tracker.set_pose(&pose);
            }
            Err(rejection) => {
                StreamStats::bump(&stats.rejected);
                log::trace!("Skipping packet: {}", rejection);
            }
        }
    }
}
