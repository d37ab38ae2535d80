//! Face model capability and the once-per-process model loader.

use crate::frame::Frame;
use crate::types::{DescriptorError, FaceDescriptor};
use std::future::Future;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0} — download the model bundle and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("model not loaded")]
    NotLoaded,
    #[error("bad descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Single-face detection plus descriptor extraction.
pub trait FaceModel: Send + Sync {
    /// Load weights. Called at most once per process by [`ModelLoader`].
    fn load(&self) -> impl Future<Output = Result<(), ModelError>> + Send;

    /// Detect the most prominent face and extract its descriptor.
    /// `Ok(None)` means no face was found.
    fn detect_single_face(
        &self,
        frame: Frame,
    ) -> impl Future<Output = Result<Option<FaceDescriptor>, ModelError>> + Send;
}

/// Wraps a [`FaceModel`] so its weights are loaded exactly once.
///
/// Concurrent `ensure_loaded` calls wait on the same load; once it has
/// succeeded every later call returns immediately. A failed load leaves the
/// loader unloaded so the next attempt retries.
pub struct ModelLoader<M> {
    model: M,
    loaded: OnceCell<()>,
}

impl<M: FaceModel> ModelLoader<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            loaded: OnceCell::new(),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<(), ModelError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::info!("loading face model");
                self.model.load().await?;
                tracing::info!("face model loaded");
                Ok::<(), ModelError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Run detection. Fails with `NotLoaded` before `ensure_loaded` succeeded.
    pub async fn detect_single_face(&self, frame: Frame) -> Result<Option<FaceDescriptor>, ModelError> {
        if !self.is_loaded() {
            return Err(ModelError::NotLoaded);
        }
        self.model.detect_single_face(frame).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::types::DESCRIPTOR_LEN;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted model: counts loads and replays queued detection results.
    #[derive(Default)]
    pub struct ScriptedModel {
        pub loads: AtomicUsize,
        pub fail_load: AtomicBool,
        pub load_delay_ms: u64,
        pub detections: Mutex<VecDeque<Option<FaceDescriptor>>>,
    }

    pub fn descriptor(seed: f32) -> FaceDescriptor {
        FaceDescriptor::new((0..DESCRIPTOR_LEN).map(|i| seed + i as f32 * 1e-3).collect()).unwrap()
    }

    impl ScriptedModel {
        pub fn push_detection(&self, result: Option<FaceDescriptor>) {
            self.detections.lock().unwrap().push_back(result);
        }
    }

    impl FaceModel for ScriptedModel {
        async fn load(&self) -> Result<(), ModelError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.load_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.load_delay_ms)).await;
            }
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(ModelError::ModelNotFound("/models/missing.onnx".into()));
            }
            Ok(())
        }

        async fn detect_single_face(&self, _frame: Frame) -> Result<Option<FaceDescriptor>, ModelError> {
            Ok(self.detections.lock().unwrap().pop_front().unwrap_or(None))
        }
    }
}
