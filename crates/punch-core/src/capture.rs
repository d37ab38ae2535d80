//! Turn a snapshotted frame into a descriptor plus photo.

use crate::frame::Frame;
use crate::model::{FaceModel, ModelLoader};
use crate::types::{Capture, CapturedFrame};
use crate::workflow::WorkflowError;

/// Encode `frame` as a JPEG data URL and extract its single-face descriptor.
///
/// The frame is consumed by detection; the photo is encoded first.
pub async fn extract_capture<M: FaceModel>(
    loader: &ModelLoader<M>,
    frame: Frame,
    jpeg_quality: u8,
) -> Result<Capture, WorkflowError> {
    let data_url = frame
        .to_data_url(jpeg_quality)
        .map_err(|e| WorkflowError::Photo(e.to_string()))?;
    let (width, height, captured_at) = (frame.width, frame.height, frame.timestamp);

    let descriptor = loader
        .detect_single_face(frame)
        .await
        .map_err(|e| WorkflowError::Detection(e.to_string()))?
        .ok_or(WorkflowError::NoFaceDetected)?;
    tracing::debug!(width, height, "face descriptor extracted");

    Ok(Capture {
        descriptor,
        frame: CapturedFrame {
            data_url,
            width,
            height,
            captured_at,
        },
    })
}
