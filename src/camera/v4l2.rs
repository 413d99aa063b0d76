use super::device::{MediaDevices, MediaStream};
use super::types::{DeviceDescriptor, FacingMode, StreamConstraints, StreamSettings};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameFormat, RawFrame};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// How long `start` waits for the first decoded frame
const FIRST_FRAME_TIMEOUT_SECS: u64 = 5;

/// V4L2 cameras opened through a GStreamer pipeline
pub struct V4l2Devices {
    front_device: u32,
    rear_device: u32,
}

impl V4l2Devices {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self {
            front_device: config.front_device,
            rear_device: config.rear_device,
        })
    }

    fn device_index(&self, facing: FacingMode) -> u32 {
        match facing {
            FacingMode::Front => self.front_device,
            FacingMode::Rear => self.rear_device,
        }
    }

    fn facing_for_path(&self, path: &str) -> Option<FacingMode> {
        if path == format!("/dev/video{}", self.front_device) {
            Some(FacingMode::Front)
        } else if path == format!("/dev/video{}", self.rear_device) {
            Some(FacingMode::Rear)
        } else {
            None
        }
    }

    /// Build the capture pipeline, scaled to the requested size as RGB
    fn build_pipeline_string(device: &str, width: u32, height: u32) -> String {
        format!(
            "v4l2src device={} do-timestamp=true ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            device, width, height
        )
    }
}

#[async_trait]
impl MediaDevices for V4l2Devices {
    fn is_supported(&self) -> bool {
        Path::new("/dev").exists()
    }

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        let device = format!("/dev/video{}", self.device_index(constraints.facing));

        if !Path::new(&device).exists() {
            return Err(CameraError::ConstraintUnsatisfiable {
                details: format!("{} camera {} not present", constraints.facing, device),
            });
        }

        if let Err(e) = std::fs::OpenOptions::new().read(true).open(&device) {
            return Err(if e.kind() == std::io::ErrorKind::PermissionDenied {
                CameraError::PermissionDenied {
                    details: format!("{}: {}", device, e),
                }
            } else {
                CameraError::DeviceOpen {
                    details: format!("{}: {}", device, e),
                }
            });
        }

        let pipeline_desc = Self::build_pipeline_string(
            &device,
            constraints.ideal_width,
            constraints.ideal_height,
        );
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::DeviceOpen {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::DeviceOpen {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::DeviceOpen {
                details: "Pipeline has no appsink".to_string(),
            })?;

        Ok(Box::new(V4l2Stream {
            settings: StreamSettings {
                stream_id: uuid::Uuid::new_v4().to_string(),
                device_id: device,
                facing: constraints.facing,
                width: constraints.ideal_width,
                height: constraints.ideal_height,
            },
            pipeline,
            appsink,
            ended: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(Mutex::new(None)),
            reader: None,
            stopped: false,
        }))
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let found = tokio::task::spawn_blocking(|| -> Result<Vec<(String, String)>, String> {
            let monitor = gstreamer::DeviceMonitor::new();
            monitor.add_filter(Some("Video/Source"), None);
            monitor.start().map_err(|e| e.to_string())?;

            let devices = monitor
                .devices()
                .into_iter()
                .map(|device| {
                    let path = device
                        .properties()
                        .and_then(|props| props.get::<String>("device.path").ok())
                        .unwrap_or_default();
                    (path, device.display_name().to_string())
                })
                .collect();

            monitor.stop();
            Ok(devices)
        })
        .await
        .map_err(|e| CameraError::Enumeration {
            details: e.to_string(),
        })?
        .map_err(|details| CameraError::Enumeration { details })?;

        Ok(found
            .into_iter()
            .map(|(path, label)| DeviceDescriptor {
                facing: self.facing_for_path(&path),
                device_id: path,
                label,
            })
            .collect())
    }
}

struct V4l2Stream {
    settings: StreamSettings,
    pipeline: Pipeline,
    appsink: AppSink,
    ended: CancellationToken,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<RawFrame>>>,
    reader: Option<JoinHandle<()>>,
    stopped: bool,
}

impl V4l2Stream {
    fn sample_to_frame(sample: &gstreamer::Sample, sequence: u64) -> Option<RawFrame> {
        let buffer = sample.buffer()?;
        let caps = sample.caps()?;
        let info = VideoInfo::from_caps(caps).ok()?;
        let map = buffer.map_readable().ok()?;

        let width = info.width();
        let height = info.height();
        let row_len = width as usize * 3;
        let stride = info.stride()[0] as usize;

        let data = if stride == row_len {
            map.as_slice().to_vec()
        } else {
            map.as_slice()
                .chunks(stride)
                .take(height as usize)
                .flat_map(|row| row[..row_len.min(row.len())].iter().copied())
                .collect()
        };

        Some(RawFrame::new(sequence, data, width, height, FrameFormat::Rgb24))
    }

    /// Pull samples into `latest` until stopped; cancel `ended` on EOS/error
    fn spawn_reader(&mut self) {
        let appsink = self.appsink.clone();
        let bus = self.pipeline.bus();
        let running = Arc::clone(&self.running);
        let latest = Arc::clone(&self.latest);
        let ended = self.ended.clone();
        let counter = AtomicU64::new(1);

        self.reader = Some(std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if let Some(bus) = &bus {
                    if let Some(msg) = bus.pop_filtered(&[
                        gstreamer::MessageType::Error,
                        gstreamer::MessageType::Eos,
                    ]) {
                        warn!("Camera pipeline ended: {:?}", msg.view());
                        ended.cancel();
                        break;
                    }
                }

                match appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(200)) {
                    Some(sample) => {
                        let sequence = counter.fetch_add(1, Ordering::Relaxed);
                        if let Some(frame) = Self::sample_to_frame(&sample, sequence) {
                            trace!("Pulled frame {} ({}x{})", sequence, frame.width, frame.height);
                            *latest.lock() = Some(frame);
                        }
                    }
                    None if appsink.is_eos() => {
                        warn!("Camera appsink reached end of stream");
                        ended.cancel();
                        break;
                    }
                    None => {}
                }
            }
            debug!("Camera reader thread exited");
        }));
    }
}

#[async_trait]
impl MediaStream for V4l2Stream {
    fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    fn track_ended(&self) -> CancellationToken {
        self.ended.clone()
    }

    async fn start(&mut self) -> Result<(), CameraError> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::StartFailed {
                details: format!("Failed to start pipeline: {}", e),
            })?;

        let appsink = self.appsink.clone();
        let first = tokio::task::spawn_blocking(move || {
            appsink
                .try_pull_sample(gstreamer::ClockTime::from_seconds(FIRST_FRAME_TIMEOUT_SECS))
                .and_then(|sample| Self::sample_to_frame(&sample, 0))
        })
        .await
        .map_err(|e| CameraError::StartFailed {
            details: e.to_string(),
        })?
        .ok_or_else(|| CameraError::StartFailed {
            details: format!("no frame within {}s", FIRST_FRAME_TIMEOUT_SECS),
        })?;

        self.settings.width = first.width;
        self.settings.height = first.height;
        *self.latest.lock() = Some(first);

        self.running.store(true, Ordering::Relaxed);
        self.spawn_reader();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CameraError> {
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map(|_| ())
            .map_err(|e| CameraError::PauseFailed {
                details: e.to_string(),
            })
    }

    async fn resume(&mut self) -> Result<(), CameraError> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map(|_| ())
            .map_err(|e| CameraError::ResumeFailed {
                details: e.to_string(),
            })
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        self.latest.lock().clone()
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!("Failed to stop camera pipeline: {}", e);
        }
        // The reader polls `running` at least every 200ms
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                error!("Camera reader thread panicked");
            }
        }
        info!("Camera stream {} released", self.settings.stream_id);
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
