use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{ArrayD, CowArray};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};

use crate::error::{LoadError, Result, VisionError};
use crate::mapping::{LabelTable, parse_names_metadata};

/// A loaded model that maps one input tensor to its output tensors.
///
/// Implementations must be safe to call from several threads; the ONNX backend
/// serializes calls on the same session.
pub trait InferenceBackend: Send + Sync {
    /// Run a forward pass. Outputs are returned in the model's declared output order.
    fn run(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>>;

    /// Class names embedded in the model artifact, if any.
    fn labels(&self) -> Option<&LabelTable> {
        None
    }
}

/// Turns model artifacts on disk into inference handles.
pub trait ModelLoader {
    /// Load a self-contained model file.
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn InferenceBackend>, LoadError>;

    /// Load an architecture-only graph whose weights live in a separate file.
    ///
    /// The weights must sit in the same directory as the graph, under the name the graph
    /// references, so the runtime resolves them when the graph is loaded.
    fn load_with_weights(
        &self,
        architecture: &Path,
        weights: &Path,
    ) -> std::result::Result<Box<dyn InferenceBackend>, LoadError> {
        if architecture.parent() != weights.parent() {
            return Err(LoadError::corrupt(
                weights,
                format!(
                    "weights must be stored next to the architecture graph in {}",
                    architecture
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
            ));
        }
        self.load(architecture)
    }
}

/// ONNX Runtime session factory.
pub struct OnnxModel {
    provider: [ExecutionProviderDispatch; 1],
}

impl OnnxModel {
    pub fn new(cuda: bool) -> Self {
        let provider = if cuda {
            [CUDAExecutionProvider::default().build().error_on_failure()]
        } else {
            [CPUExecutionProvider::default().build()]
        };
        Self { provider }
    }

    pub fn load_model(&self, model_path: &Path) -> std::result::Result<Session, ort::Error> {
        let session = SessionBuilder::new()?
            .with_execution_providers(self.provider.clone())?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;
        Ok(session)
    }
}

impl ModelLoader for OnnxModel {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn InferenceBackend>, LoadError> {
        if !path.is_file() {
            return Err(LoadError::ArtifactMissing {
                path: path.to_path_buf(),
            });
        }
        let session = self
            .load_model(path)
            .map_err(|e| LoadError::corrupt(path, e))?;
        Ok(Box::new(OnnxBackend::new(session, path)))
    }
}

/// An ONNX Runtime session behind a mutex, one inference in flight at a time.
pub struct OnnxBackend {
    session: Mutex<Session>,
    labels: Option<LabelTable>,
    source: PathBuf,
}

impl OnnxBackend {
    pub fn new(session: Session, source: &Path) -> Self {
        let labels = read_label_metadata(&session);
        if let Some(table) = &labels {
            tracing::debug!(path = %source.display(), classes = table.len(), "found class names in model metadata");
        }
        Self {
            session: Mutex::new(session),
            labels,
            source: source.to_path_buf(),
        }
    }
}

fn read_label_metadata(session: &Session) -> Option<LabelTable> {
    let metadata = session.metadata().ok()?;
    let raw = metadata.custom("names").ok().flatten()?;
    let names = parse_names_metadata(&raw).ok()?;
    (!names.is_empty()).then(|| LabelTable::new(names))
}

impl std::fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxBackend")
            .field("source", &self.source)
            .field("labels", &self.labels)
            .finish()
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        let session = self
            .session
            .lock()
            .map_err(|_| VisionError::inference("onnx session lock poisoned"))?;

        let xs = CowArray::from(input);
        let input_data = ort::inputs![xs.view()]?;
        let ys = session.run(input_data)?;
        ys.iter()
            .map(|(_name, value)| -> Result<ArrayD<f32>> {
                Ok(value.try_extract_tensor::<f32>()?.into_owned())
            })
            .collect()
    }

    fn labels(&self) -> Option<&LabelTable> {
        self.labels.as_ref()
    }
}
