use super::device::{MediaDevices, MediaStream};
use super::types::{DeviceDescriptor, FacingMode, StreamConstraints, StreamSettings};
use crate::error::CameraError;
use crate::frame::{FrameFormat, RawFrame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Largest frame the synthetic backend will generate
const MAX_SYNTHETIC_RESOLUTION: (u32, u32) = (1920, 1080);

/// Software camera producing test-pattern frames.
///
/// Clones share state, so a test can keep a handle to inject failures
/// and inspect how many streams are open.
#[derive(Clone)]
pub struct SyntheticDevices {
    shared: Arc<Shared>,
}

struct Shared {
    devices: Vec<DeviceDescriptor>,
    supported: AtomicBool,
    permission_granted: AtomicBool,
    next_open_error: Mutex<Option<CameraError>>,
    fail_pause: AtomicBool,
    fail_resume: AtomicBool,
    fail_frames: AtomicBool,
    start_delay: Mutex<Duration>,
    open_streams: AtomicUsize,
    max_open_streams: AtomicUsize,
    total_opened: AtomicUsize,
    stream_counter: AtomicU64,
    active_tracks: Mutex<Vec<(String, CancellationToken)>>,
}

impl SyntheticDevices {
    /// Front and rear synthetic cameras
    pub fn new() -> Self {
        Self::with_devices(vec![
            DeviceDescriptor {
                device_id: "synthetic-front".to_string(),
                label: "Synthetic Front Camera".to_string(),
                facing: Some(FacingMode::Front),
            },
            DeviceDescriptor {
                device_id: "synthetic-rear".to_string(),
                label: "Synthetic Rear Camera".to_string(),
                facing: Some(FacingMode::Rear),
            },
        ])
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                devices,
                supported: AtomicBool::new(true),
                permission_granted: AtomicBool::new(false),
                next_open_error: Mutex::new(None),
                fail_pause: AtomicBool::new(false),
                fail_resume: AtomicBool::new(false),
                fail_frames: AtomicBool::new(false),
                start_delay: Mutex::new(Duration::ZERO),
                open_streams: AtomicUsize::new(0),
                max_open_streams: AtomicUsize::new(0),
                total_opened: AtomicUsize::new(0),
                stream_counter: AtomicU64::new(0),
                active_tracks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the environment report capture as unsupported
    pub fn set_supported(&self, supported: bool) {
        self.shared.supported.store(supported, Ordering::SeqCst);
    }

    /// Fail the next `open` call with `error`
    pub fn fail_next_open(&self, error: CameraError) {
        *self.shared.next_open_error.lock() = Some(error);
    }

    pub fn set_fail_pause(&self, fail: bool) {
        self.shared.fail_pause.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.shared.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Stop streams from producing frames
    pub fn set_fail_frames(&self, fail: bool) {
        self.shared.fail_frames.store(fail, Ordering::SeqCst);
    }

    /// Delay before a started stream reports it can play
    pub fn set_start_delay(&self, delay: Duration) {
        *self.shared.start_delay.lock() = delay;
    }

    /// Simulate the device being unplugged
    pub fn end_active_tracks(&self) {
        let tracks = std::mem::take(&mut *self.shared.active_tracks.lock());
        info!("Ending {} synthetic track(s)", tracks.len());
        for (_, token) in tracks {
            token.cancel();
        }
    }

    /// Streams currently open
    pub fn open_streams(&self) -> usize {
        self.shared.open_streams.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams observed
    pub fn max_open_streams(&self) -> usize {
        self.shared.max_open_streams.load(Ordering::SeqCst)
    }

    /// Streams opened over the lifetime of this backend
    pub fn total_opened(&self) -> usize {
        self.shared.total_opened.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    fn is_supported(&self) -> bool {
        self.shared.supported.load(Ordering::SeqCst)
    }

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        if !self.is_supported() {
            return Err(CameraError::Unsupported);
        }

        if let Some(error) = self.shared.next_open_error.lock().take() {
            debug!("Synthetic open failing with injected error: {}", error);
            return Err(error);
        }

        // Facing is a preference: fall back to the first device
        let device = self
            .shared
            .devices
            .iter()
            .find(|d| d.facing == Some(constraints.facing))
            .or_else(|| self.shared.devices.first())
            .ok_or_else(|| CameraError::ConstraintUnsatisfiable {
                details: "no video input devices".to_string(),
            })?;

        let width = constraints.ideal_width.clamp(1, MAX_SYNTHETIC_RESOLUTION.0);
        let height = constraints.ideal_height.clamp(1, MAX_SYNTHETIC_RESOLUTION.1);

        let stream_number = self.shared.stream_counter.fetch_add(1, Ordering::SeqCst);
        let open = self.shared.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_open_streams.fetch_max(open, Ordering::SeqCst);
        self.shared.total_opened.fetch_add(1, Ordering::SeqCst);
        self.shared.permission_granted.store(true, Ordering::SeqCst);

        let stream_id = format!("synthetic-{}", stream_number);
        let ended = CancellationToken::new();
        self.shared
            .active_tracks
            .lock()
            .push((stream_id.clone(), ended.clone()));

        debug!(
            "Opened synthetic stream {} on {} ({}x{})",
            stream_number, device.device_id, width, height
        );

        Ok(Box::new(SyntheticStream {
            settings: StreamSettings {
                stream_id,
                device_id: device.device_id.clone(),
                facing: device.facing.unwrap_or(constraints.facing),
                width,
                height,
            },
            shared: Arc::clone(&self.shared),
            ended,
            started: false,
            paused: false,
            stopped: false,
            sequence: AtomicU64::new(0),
        }))
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let labelled = self.shared.permission_granted.load(Ordering::SeqCst);
        Ok(self
            .shared
            .devices
            .iter()
            .map(|d| DeviceDescriptor {
                label: if labelled { d.label.clone() } else { String::new() },
                ..d.clone()
            })
            .collect())
    }
}

struct SyntheticStream {
    settings: StreamSettings,
    shared: Arc<Shared>,
    ended: CancellationToken,
    started: bool,
    paused: bool,
    stopped: bool,
    sequence: AtomicU64,
}

#[async_trait]
impl MediaStream for SyntheticStream {
    fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    fn track_ended(&self) -> CancellationToken {
        self.ended.clone()
    }

    async fn start(&mut self) -> Result<(), CameraError> {
        let delay = *self.shared.start_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.ended.is_cancelled() {
            return Err(CameraError::StartFailed {
                details: "track ended before playback started".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CameraError> {
        if self.shared.fail_pause.load(Ordering::SeqCst) {
            return Err(CameraError::PauseFailed {
                details: "synthetic playback refused to pause".to_string(),
            });
        }
        self.paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CameraError> {
        if self.shared.fail_resume.load(Ordering::SeqCst) {
            return Err(CameraError::ResumeFailed {
                details: "synthetic playback refused to resume".to_string(),
            });
        }
        self.paused = false;
        Ok(())
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        if !self.started
            || self.paused
            || self.stopped
            || self.ended.is_cancelled()
            || self.shared.fail_frames.load(Ordering::SeqCst)
        {
            return None;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (width, height) = (self.settings.width, self.settings.height);
        let shift = (sequence % 256) as u32;

        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }

        trace!(
            "Generated synthetic frame {} ({}x{})",
            sequence,
            width,
            height
        );
        Some(RawFrame::new(sequence, data, width, height, FrameFormat::Rgb24))
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.shared.open_streams.fetch_sub(1, Ordering::SeqCst);
        let stream_id = &self.settings.stream_id;
        self.shared
            .active_tracks
            .lock()
            .retain(|(id, _)| id != stream_id);
        debug!("Stopped synthetic stream {}", self.settings.stream_id);
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

