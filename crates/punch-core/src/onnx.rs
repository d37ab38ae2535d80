//! ONNX Runtime face model: SCRFD detection plus a 128-d SFace embedder.
//!
//! Only the single most confident face is used, so detection skips NMS and
//! landmark decoding and just keeps the best anchor over all strides.

use crate::frame::Frame;
use crate::model::{FaceModel, ModelError};
use crate::types::{FaceDescriptor, DESCRIPTOR_LEN};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const DETECTOR_FILE: &str = "det_10g.onnx";
pub const EMBEDDER_FILE: &str = "face_recognition_sface_2021dec.onnx";

const DETECT_SIZE: u32 = 640;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const DETECT_THRESHOLD: f32 = 0.5;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

const EMBED_SIZE: u32 = 112;
/// Fraction of the box size added on each side before cropping.
const CROP_MARGIN: f32 = 0.1;

/// Face box in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Detection {
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    width: u32,
    height: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, target);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, target);
        Self {
            scale,
            pad_x: ((target - new_w) / 2) as f32,
            pad_y: ((target - new_h) / 2) as f32,
            width: new_w,
            height: new_h,
        }
    }

    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

struct Pipeline {
    detector: Session,
    embedder: Session,
}

impl Pipeline {
    fn load(dir: &Path) -> Result<Self, ModelError> {
        let detector = open_session(&dir.join(DETECTOR_FILE))?;
        let outputs = detector.outputs().len();
        if outputs < STRIDES.len() * 2 {
            return Err(ModelError::InferenceFailed(format!(
                "detector needs score and bbox outputs for {} strides, got {outputs} outputs",
                STRIDES.len()
            )));
        }
        let embedder = open_session(&dir.join(EMBEDDER_FILE))?;
        Ok(Self { detector, embedder })
    }

    fn describe(&mut self, frame: &Frame) -> Result<Option<FaceDescriptor>, ModelError> {
        let image = frame
            .to_rgb_image()
            .ok_or_else(|| ModelError::InferenceFailed("frame buffer does not match its size".into()))?;

        let Some(face) = self.detect(&image)? else {
            return Ok(None);
        };
        tracing::debug!(score = face.score, "face detected");

        let crop = crop_face(&image, &face);
        let input = embedder_input(&crop);
        let outputs = self
            .embedder
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("embedding: {e}")))?;
        if raw.len() != DESCRIPTOR_LEN {
            return Err(ModelError::InferenceFailed(format!(
                "expected {DESCRIPTOR_LEN}-dim embedding, got {}",
                raw.len()
            )));
        }
        Ok(Some(FaceDescriptor::new(l2_normalize(raw))?))
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Option<Detection>, ModelError> {
        let letterbox = Letterbox::fit(image.width(), image.height(), DETECT_SIZE);
        let input = detector_input(image, &letterbox);
        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut best: Option<Detection> = None;
        for (pos, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[pos + STRIDES.len()]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            if let Some(candidate) = best_in_stride(scores, boxes, stride, &letterbox) {
                if best.map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }
}

fn open_session(path: &Path) -> Result<Session, ModelError> {
    if !path.exists() {
        return Err(ModelError::ModelNotFound(path.display().to_string()));
    }
    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(path)?;
    tracing::info!(
        path = %path.display(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded ONNX model"
    );
    Ok(session)
}

/// Letterboxed, normalized NCHW input for the detector.
fn detector_input(image: &RgbImage, letterbox: &Letterbox) -> Array4<f32> {
    let size = DETECT_SIZE as usize;
    let resized = imageops::resize(image, letterbox.width, letterbox.height, FilterType::Triangle);
    // Padding stays zero, which is the normalized mean.
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (ox, oy) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, oy + y as usize, ox + x as usize]] = (pixel[c] as f32 - DETECT_MEAN) / DETECT_STD;
        }
    }
    tensor
}

/// Highest-scoring anchor above threshold for one stride, mapped back to
/// source-frame pixels.
fn best_in_stride(scores: &[f32], boxes: &[f32], stride: usize, letterbox: &Letterbox) -> Option<Detection> {
    let grid = DETECT_SIZE as usize / stride;
    let anchors = (grid * grid * ANCHORS_PER_CELL).min(scores.len()).min(boxes.len() / 4);

    let (idx, score) = scores[..anchors]
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| *s > DETECT_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let cell = idx / ANCHORS_PER_CELL;
    let step = stride as f32;
    let cx = (cell % grid) as f32 * step;
    let cy = (cell / grid) as f32 * step;
    let d = &boxes[idx * 4..idx * 4 + 4];
    let (x1, y1) = letterbox.to_source(cx - d[0] * step, cy - d[1] * step);
    let (x2, y2) = letterbox.to_source(cx + d[2] * step, cy + d[3] * step);
    Some(Detection { score, x1, y1, x2, y2 })
}

/// Expand the box by the crop margin and clamp to the image.
/// Returns `(x, y, width, height)`, never empty.
fn crop_region(face: &Detection, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let mx = (face.x2 - face.x1) * CROP_MARGIN;
    let my = (face.y2 - face.y1) * CROP_MARGIN;
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    let x1 = (face.x1 - mx).clamp(0.0, max_x) as u32;
    let y1 = (face.y1 - my).clamp(0.0, max_y) as u32;
    let x2 = (face.x2 + mx).clamp(0.0, width as f32) as u32;
    let y2 = (face.y2 + my).clamp(0.0, height as f32) as u32;
    (x1, y1, x2.saturating_sub(x1).max(1), y2.saturating_sub(y1).max(1))
}

fn crop_face(image: &RgbImage, face: &Detection) -> RgbImage {
    let (x, y, w, h) = crop_region(face, image.width(), image.height());
    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    imageops::resize(&cropped, EMBED_SIZE, EMBED_SIZE, FilterType::Triangle)
}

/// SFace takes raw 0-255 RGB values.
fn embedder_input(crop: &RgbImage) -> Array4<f32> {
    let size = EMBED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// Face model backed by ONNX Runtime sessions loaded from `model_dir`.
pub struct OnnxFaceModel {
    model_dir: PathBuf,
    pipeline: Arc<Mutex<Option<Pipeline>>>,
}

impl OnnxFaceModel {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            pipeline: Arc::new(Mutex::new(None)),
        }
    }
}

impl FaceModel for OnnxFaceModel {
    async fn load(&self) -> Result<(), ModelError> {
        let dir = self.model_dir.clone();
        let pipeline = tokio::task::spawn_blocking(move || Pipeline::load(&dir))
            .await
            .map_err(|e| ModelError::InferenceFailed(format!("model load task: {e}")))??;
        *self.pipeline.lock().unwrap_or_else(PoisonError::into_inner) = Some(pipeline);
        Ok(())
    }

    async fn detect_single_face(&self, frame: Frame) -> Result<Option<FaceDescriptor>, ModelError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || {
            let mut guard = pipeline.lock().unwrap_or_else(PoisonError::into_inner);
            let pipeline = guard.as_mut().ok_or(ModelError::NotLoaded)?;
            pipeline.describe(&frame)
        })
        .await
        .map_err(|e| ModelError::InferenceFailed(format!("detection task: {e}")))?
    }
}
