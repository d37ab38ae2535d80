//! Camera capability: acquire a live stream, snapshot it, release it.

use crate::frame::Frame;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("stream already stopped")]
    StreamStopped,
}

/// Requested stream properties. The kiosk camera always faces the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Source of exclusive live video streams.
pub trait CameraSource: Send + Sync {
    type Stream: MediaStream;

    /// Acquire the camera. Resolves once the device is open and streaming,
    /// or with the platform error (permission, missing device, busy).
    fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// An open camera stream.
pub trait MediaStream: Send + 'static {
    /// Grab the current frame synchronously.
    fn snapshot(&mut self) -> Result<Frame, CameraError>;

    /// Stop all tracks and release the device. Stopping twice is a no-op.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Owns a stream and stops it when dropped, so every exit path releases the
/// device exactly once.
pub struct StreamGuard<S: MediaStream> {
    stream: S,
}

impl<S: MediaStream> StreamGuard<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn snapshot(&mut self) -> Result<Frame, CameraError> {
        self.stream.snapshot()
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }
}

impl<S: MediaStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if self.stream.is_live() {
            tracing::info!("releasing camera stream");
        }
        self.stream.stop();
    }
}

/// Serialises camera access: at most one [`CameraLease`] exists at a time.
///
/// A second `open` waits until the previous lease has been dropped, which is
/// after its stream stopped.
#[derive(Clone)]
pub struct CameraGate {
    permits: Arc<Semaphore>,
}

impl Default for CameraGate {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }
}

impl CameraGate {
    pub async fn open<C: CameraSource>(
        &self,
        camera: &C,
        constraints: &StreamConstraints,
    ) -> Result<CameraLease<C::Stream>, CameraError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CameraError::CaptureFailed("camera gate closed".into()))?;
        let stream = camera.open(constraints).await?;
        Ok(CameraLease {
            stream: StreamGuard::new(stream),
            _permit: permit,
        })
    }

    /// True while a lease is held.
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

/// Exclusive hold on an open stream. Dropping it stops the stream first and
/// then lets the next `open` through.
pub struct CameraLease<S: MediaStream> {
    // Field order matters: the stream is dropped before the permit.
    stream: StreamGuard<S>,
    _permit: OwnedSemaphorePermit,
}

impl<S: MediaStream> CameraLease<S> {
    pub fn snapshot(&mut self) -> Result<Frame, CameraError> {
        self.stream.snapshot()
    }

    /// Grab one frame on the blocking pool, then stop the stream and give
    /// the camera back. V4L capture blocks for several frame periods.
    pub async fn take_frame(mut self) -> Result<Frame, CameraError> {
        tokio::task::spawn_blocking(move || {
            let frame = self.snapshot();
            drop(self);
            frame
        })
        .await
        .map_err(|e| CameraError::CaptureFailed(format!("capture task failed: {e}")))?
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStream {
        live: bool,
        stops: Arc<AtomicUsize>,
    }

    impl MediaStream for CountingStream {
        fn snapshot(&mut self) -> Result<Frame, CameraError> {
            if !self.live {
                return Err(CameraError::StreamStopped);
            }
            Frame::new(vec![0; 12], 2, 2, 0).map_err(|e| CameraError::CaptureFailed(e.to_string()))
        }

        fn stop(&mut self) {
            if self.live {
                self.live = false;
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_live(&self) -> bool {
            self.live
        }
    }

    #[test]
    fn test_guard_stops_on_drop() {
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = StreamGuard::new(CountingStream {
                live: true,
                stops: Arc::clone(&stops),
            });
            assert!(guard.snapshot().is_ok());
            assert!(guard.is_live());
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_drop_after_manual_stop_is_noop() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut stream = CountingStream {
            live: true,
            stops: Arc::clone(&stops),
        };
        stream.stop();
        drop(StreamGuard::new(stream));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_constraints() {
        let c = StreamConstraints::default();
        assert_eq!((c.width, c.height), (640, 480));
    }

    struct CountingCamera {
        stops: Arc<AtomicUsize>,
    }

    impl CameraSource for CountingCamera {
        type Stream = CountingStream;

        async fn open(&self, _constraints: &StreamConstraints) -> Result<CountingStream, CameraError> {
            Ok(CountingStream {
                live: true,
                stops: Arc::clone(&self.stops),
            })
        }
    }

    #[tokio::test]
    async fn test_gate_waits_for_previous_lease() {
        let stops = Arc::new(AtomicUsize::new(0));
        let camera = CountingCamera {
            stops: Arc::clone(&stops),
        };
        let gate = CameraGate::default();
        let constraints = StreamConstraints::default();

        let mut first = gate.open(&camera, &constraints).await.unwrap();
        assert!(gate.is_held());
        assert!(first.snapshot().is_ok());

        let second = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            gate.open(&camera, &constraints),
        )
        .await;
        assert!(second.is_err(), "second lease granted while first is open");

        drop(first);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!gate.is_held());

        let frame = gate.open(&camera, &constraints).await.unwrap().take_frame().await.unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(stops.load(Ordering::SeqCst), 2);
        assert!(!gate.is_held());
        let second = gate.open(&camera, &constraints).await.unwrap();
        assert!(second.is_live());
    }
}
