use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayD, IxDyn};
use tomato_scan::error::Result;
use tomato_scan::{InferenceBackend, LabelTable, LoadError, ModelLoader};

/// Classifier that always returns the same probability row.
pub struct FixedClassifier {
    pub probabilities: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self {
            probabilities,
            calls: AtomicUsize::new(0),
        }
    }
}

impl InferenceBackend for FixedClassifier {
    fn run(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = self.probabilities.len();
        Ok(vec![
            ArrayD::from_shape_vec(IxDyn(&[1, n]), self.probabilities.clone()).unwrap(),
        ])
    }
}

/// One synthetic anchor of a YOLO segmentation head.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub class_id: usize,
    pub score: f32,
}

/// Detector emitting a fixed YOLO-seg output with a single all-positive mask prototype.
pub struct SyntheticDetector {
    pub anchors: Vec<Anchor>,
    pub num_classes: usize,
    pub labels: Option<LabelTable>,
}

impl SyntheticDetector {
    pub fn new(anchors: Vec<Anchor>, num_classes: usize) -> Self {
        Self {
            anchors,
            num_classes,
            labels: None,
        }
    }
}

impl InferenceBackend for SyntheticDetector {
    fn run(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        assert_eq!(input.ndim(), 4);
        let rows = 4 + self.num_classes + 1;
        let n = self.anchors.len();
        let mut predictions = ArrayD::<f32>::zeros(IxDyn(&[1, rows, n]));
        for (i, a) in self.anchors.iter().enumerate() {
            predictions[[0, 0, i]] = a.cx;
            predictions[[0, 1, i]] = a.cy;
            predictions[[0, 2, i]] = a.w;
            predictions[[0, 3, i]] = a.h;
            predictions[[0, 4 + a.class_id, i]] = a.score;
            predictions[[0, 4 + self.num_classes, i]] = 1.0;
        }
        let prototypes = ArrayD::<f32>::from_elem(IxDyn(&[1, 1, 16, 16]), 10.0);
        Ok(vec![predictions, prototypes])
    }

    fn labels(&self) -> Option<&LabelTable> {
        self.labels.as_ref()
    }
}

/// Backend whose every call fails.
pub struct FailingBackend;

impl InferenceBackend for FailingBackend {
    fn run(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        Err(tomato_scan::VisionError::inference("runtime crashed"))
    }
}

/// Loader that hands out a fixed classifier for any existing file and records the paths.
pub struct RecordingLoader {
    pub probabilities: Vec<f32>,
    pub calls: std::sync::Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self {
            probabilities,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl ModelLoader for RecordingLoader {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn InferenceBackend>, LoadError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(FixedClassifier::new(self.probabilities.clone())))
    }
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 90])
    })
    .save(&path)
    .unwrap();
    path
}
