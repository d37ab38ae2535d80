//! V4L2 camera source via the `v4l` crate.

use crate::frame::{self, PixelFormat};
use punch_core::camera::{CameraError, CameraSource, MediaStream, StreamConstraints};
use punch_core::Frame;
use std::io;
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Formats to try, in order of preference.
const PREFERRED_FORMATS: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"GREY"];
/// Dark frames tolerated after stream start before one is accepted anyway.
const SETTLE_FRAMES: usize = 5;
const DARK_THRESHOLD: f32 = 0.95;
const EBUSY: i32 = 16;

/// Camera at a fixed V4L2 device path, e.g. `/dev/video0`.
#[derive(Debug, Clone)]
pub struct V4lCamera {
    device_path: String,
}

impl V4lCamera {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }
}

impl CameraSource for V4lCamera {
    type Stream = V4lStream;

    async fn open(&self, constraints: &StreamConstraints) -> Result<V4lStream, CameraError> {
        let path = self.device_path.clone();
        let constraints = *constraints;
        tokio::task::spawn_blocking(move || V4lStream::open(&path, &constraints))
            .await
            .map_err(|e| CameraError::CaptureFailed(format!("camera open task: {e}")))?
    }
}

/// Open V4L2 device. Frames are pulled on demand through a short-lived
/// mmap stream, so nothing streams between snapshots.
pub struct V4lStream {
    device: Option<Device>,
    device_path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl V4lStream {
    fn open(device_path: &str, constraints: &StreamConstraints) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }
        let device = Device::with_path(device_path).map_err(|e| classify_open_error(device_path, &e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "{device_path} is not a video capture device"
            )));
        }
        tracing::info!(device = device_path, driver = %caps.driver, card = %caps.card, "opened camera");

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;
        fmt.width = constraints.width;
        fmt.height = constraints.height;

        for fourcc in PREFERRED_FORMATS {
            fmt.fourcc = FourCC::new(fourcc);
            let negotiated = device
                .set_format(&fmt)
                .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;
            let Some(format) = PixelFormat::from_fourcc(&negotiated.fourcc.repr) else {
                tracing::debug!(requested = ?fmt.fourcc, got = ?negotiated.fourcc, "format rejected");
                continue;
            };
            tracing::info!(
                width = negotiated.width,
                height = negotiated.height,
                fourcc = ?negotiated.fourcc,
                "negotiated format"
            );
            return Ok(Self {
                device: Some(device),
                device_path: device_path.to_string(),
                width: negotiated.width,
                height: negotiated.height,
                format,
            });
        }

        Err(CameraError::FormatNegotiationFailed(format!(
            "{device_path} offers none of YUYV, MJPG, GREY"
        )))
    }
}

impl MediaStream for V4lStream {
    fn snapshot(&mut self) -> Result<Frame, CameraError> {
        let device = self.device.as_ref().ok_or(CameraError::StreamStopped)?;
        let mut stream = MmapStream::with_buffers(device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
            let used = (meta.bytesused as usize).min(buf.len());
            let data = if used > 0 { &buf[..used] } else { buf };
            let rgb = self
                .format
                .to_rgb(data, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

            if attempt <= SETTLE_FRAMES && frame::is_dark_frame(&rgb, DARK_THRESHOLD) {
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }
            return Frame::new(rgb, self.width, self.height, meta.sequence)
                .map_err(|e| CameraError::CaptureFailed(e.to_string()));
        }
    }

    fn stop(&mut self) {
        if self.device.take().is_some() {
            tracing::debug!(device = %self.device_path, "camera device closed");
        }
    }

    fn is_live(&self) -> bool {
        self.device.is_some()
    }
}

impl Drop for V4lStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map an open failure to the error the kiosk shows the user.
fn classify_open_error(device_path: &str, err: &io::Error) -> CameraError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(format!("{device_path}: {err}")),
        io::ErrorKind::NotFound => CameraError::DeviceNotFound(device_path.to_string()),
        _ if err.raw_os_error() == Some(EBUSY) || err.to_string().contains("busy") => CameraError::DeviceBusy,
        _ => CameraError::CaptureFailed(format!("{device_path}: {err}")),
    }
}
