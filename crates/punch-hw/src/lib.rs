//! punch-hw: camera hardware for the kiosk.
//!
//! Implements the core [`CameraSource`](punch_core::CameraSource) seam on top
//! of V4L2, converting YUYV, MJPG and GREY buffers to RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{V4lCamera, V4lStream};
pub use frame::{ConvertError, PixelFormat};
