//! One-time acquisition of the classifier and detector.
//!
//! The registry is built once at start-up and never changes afterwards. A model that fails to
//! load is simply absent; the pipelines check for it on every call.

use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{LoadError, ModelKind};
use crate::model::{InferenceBackend, ModelLoader};

/// One way of obtaining the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStrategy {
    /// A self-contained model file.
    Complete(PathBuf),
    /// An architecture-only graph plus its separately stored weights.
    Reconstructed {
        architecture: PathBuf,
        weights: PathBuf,
    },
}

impl LoadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LoadStrategy::Complete(_) => "complete",
            LoadStrategy::Reconstructed { .. } => "reconstructed",
        }
    }

    /// The artifacts this strategy needs, all of which must exist.
    fn artifacts(&self) -> Vec<&Path> {
        match self {
            LoadStrategy::Complete(path) => vec![path.as_path()],
            LoadStrategy::Reconstructed {
                architecture,
                weights,
            } => vec![weights.as_path(), architecture.as_path()],
        }
    }

    pub fn is_available(&self) -> bool {
        self.artifacts().iter().all(|p| p.is_file())
    }

    /// Attempt this strategy. A missing artifact fails without calling the loader.
    pub fn attempt(
        &self,
        loader: &dyn ModelLoader,
    ) -> Result<Box<dyn InferenceBackend>, LoadError> {
        if let Some(missing) = self.artifacts().into_iter().find(|p| !p.is_file()) {
            return Err(LoadError::ArtifactMissing {
                path: missing.to_path_buf(),
            });
        }
        match self {
            LoadStrategy::Complete(path) => loader.load(path),
            LoadStrategy::Reconstructed {
                architecture,
                weights,
            } => loader.load_with_weights(architecture, weights),
        }
    }
}

/// Ordered classifier strategies plus the one retried as a last resort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierStrategies {
    pub ordered: Vec<LoadStrategy>,
    pub last_resort: Option<LoadStrategy>,
}

impl ClassifierStrategies {
    pub fn from_config(config: &ModelConfig) -> Self {
        let reconstructed = LoadStrategy::Reconstructed {
            architecture: config.classifier_architecture.clone(),
            weights: config.classifier_weights.clone(),
        };
        Self {
            ordered: vec![
                LoadStrategy::Complete(config.classifier.clone()),
                reconstructed.clone(),
            ],
            last_resort: Some(reconstructed),
        }
    }
}

/// Snapshot of what the registry managed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatus {
    pub classifier: bool,
    pub classifier_strategy: Option<&'static str>,
    pub detector: bool,
}

/// Read-only handles to the loaded models.
#[derive(Default)]
pub struct ModelRegistry {
    classifier: Option<Box<dyn InferenceBackend>>,
    classifier_strategy: Option<&'static str>,
    detector: Option<Box<dyn InferenceBackend>>,
}

impl ModelRegistry {
    /// Load both models. Never fails; unavailable models are logged and left absent.
    pub fn initialize(config: &ModelConfig, loader: &dyn ModelLoader) -> Self {
        tracing::info!("initializing model registry");
        let detector = load_detector(&config.detector, loader);
        let classifier = load_classifier(&ClassifierStrategies::from_config(config), loader);

        let (classifier, classifier_strategy) = match classifier {
            Some((backend, strategy)) => (Some(backend), Some(strategy)),
            None => (None, None),
        };
        let registry = Self {
            classifier,
            classifier_strategy,
            detector,
        };
        let status = registry.status();
        tracing::info!(
            classifier = status.classifier,
            classifier_strategy = status.classifier_strategy.unwrap_or("none"),
            detector = status.detector,
            "model registry ready"
        );
        registry
    }

    /// Build a registry from already constructed handles.
    pub fn from_parts(
        classifier: Option<Box<dyn InferenceBackend>>,
        detector: Option<Box<dyn InferenceBackend>>,
    ) -> Self {
        let classifier_strategy = classifier.as_ref().map(|_| "provided");
        Self {
            classifier,
            classifier_strategy,
            detector,
        }
    }

    /// A registry with no models, every pipeline in degraded mode.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn classifier(&self) -> Option<&dyn InferenceBackend> {
        self.classifier.as_deref()
    }

    pub fn detector(&self) -> Option<&dyn InferenceBackend> {
        self.detector.as_deref()
    }

    pub fn get(&self, kind: ModelKind) -> Option<&dyn InferenceBackend> {
        match kind {
            ModelKind::Classifier => self.classifier(),
            ModelKind::Detector => self.detector(),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            classifier: self.classifier.is_some(),
            classifier_strategy: self.classifier_strategy,
            detector: self.detector.is_some(),
        }
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("status", &self.status())
            .finish()
    }
}

fn load_detector(path: &Path, loader: &dyn ModelLoader) -> Option<Box<dyn InferenceBackend>> {
    match LoadStrategy::Complete(path.to_path_buf()).attempt(loader) {
        Ok(backend) => {
            tracing::info!(path = %path.display(), "detector loaded");
            Some(backend)
        }
        Err(err @ LoadError::ArtifactMissing { .. }) => {
            tracing::warn!(error = %err, "detector not found, segmentation disabled");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, source = ?std::error::Error::source(&err), "detector failed to load, segmentation disabled");
            None
        }
    }
}

fn load_classifier(
    strategies: &ClassifierStrategies,
    loader: &dyn ModelLoader,
) -> Option<(Box<dyn InferenceBackend>, &'static str)> {
    for strategy in &strategies.ordered {
        match strategy.attempt(loader) {
            Ok(backend) => {
                tracing::info!(strategy = strategy.name(), "classifier loaded");
                return Some((backend, strategy.name()));
            }
            Err(err) if err.is_missing() => {
                tracing::warn!(strategy = strategy.name(), error = %err, "classifier artifact missing");
            }
            Err(err) => {
                tracing::error!(
                    strategy = strategy.name(),
                    error = %err,
                    source = ?std::error::Error::source(&err),
                    "classifier failed to load"
                );
            }
        }
    }

    if let Some(strategy) = &strategies.last_resort {
        if strategy.is_available() {
            tracing::warn!(strategy = strategy.name(), "retrying classifier as a last resort");
            match strategy.attempt(loader) {
                Ok(backend) => {
                    tracing::info!(strategy = strategy.name(), "classifier loaded on retry");
                    return Some((backend, strategy.name()));
                }
                Err(err) => {
                    tracing::error!(strategy = strategy.name(), error = %err, "last resort failed");
                }
            }
        }
    }

    tracing::error!("no classifier could be loaded, classification disabled");
    None
}
