mod common;

use std::path::Path;

use common::fakes::{Anchor, FixedClassifier, RecordingLoader, SyntheticDetector, write_png};
use tomato_scan::types::{LABEL_UNAVAILABLE, MIN_POLYGON_VERTICES};
use tomato_scan::{
    AnalysisMode, AnalysisRequest, Analyzer, AnalyzerConfig, ModelConfig, ModelRegistry,
    SegmentationConfig, VisionError,
};

const PROBABILITIES: [f32; 4] = [0.05, 0.0735, 0.8765, 0.0];

fn config_in(dir: &Path) -> AnalyzerConfig {
    AnalyzerConfig {
        models: ModelConfig {
            detector: dir.join("seg.onnx"),
            classifier: dir.join("classifier.onnx"),
            classifier_architecture: dir.join("arch.onnx"),
            classifier_weights: dir.join("arch.onnx.data"),
        },
        segmentation: SegmentationConfig {
            input_size: 64,
            labels: vec!["Ripe".to_string()],
            ..SegmentationConfig::default()
        },
        ..AnalyzerConfig::default()
    }
}

#[test]
fn missing_models_leave_analyzer_in_degraded_mode() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "tomato.png", 32, 32);
    let loader = RecordingLoader::new(PROBABILITIES.to_vec());

    let analyzer = Analyzer::with_loader(config_in(dir.path()), &loader);

    assert!(loader.calls.lock().unwrap().is_empty(), "absent files are never handed to the loader");
    let status = analyzer.registry().status();
    assert!(!status.classifier && !status.detector);
    assert_eq!(status.classifier_strategy, None);

    let result = analyzer.classify(&image);
    assert_eq!(result.label, LABEL_UNAVAILABLE);
    assert_eq!(result.confidence, 0.0);
    assert!(analyzer.detect(&image).unwrap().is_empty());
}

#[test]
fn complete_classifier_is_loaded_and_used() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "tomato.png", 32, 32);
    std::fs::write(dir.path().join("classifier.onnx"), b"model").unwrap();
    let loader = RecordingLoader::new(PROBABILITIES.to_vec());

    let analyzer = Analyzer::with_loader(config_in(dir.path()), &loader);

    assert_eq!(*loader.calls.lock().unwrap(), vec![dir.path().join("classifier.onnx")]);
    let status = analyzer.registry().status();
    assert_eq!(status.classifier_strategy, Some("complete"));
    assert!(!status.detector);

    let first = analyzer.classify(&image);
    let second = analyzer.classify(&image);
    assert_eq!(first, second);
    assert_eq!(first.label, "Ripe");
    assert!((first.confidence - 87.65).abs() < 1e-3);
}

#[test]
fn classification_report_rounds_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "tomato.png", 32, 32);
    let registry = ModelRegistry::from_parts(
        Some(Box::new(FixedClassifier::new(vec![0.123456, 0.0, 0.0, 0.876544]))),
        None,
    );
    let analyzer = Analyzer::from_registry(registry, config_in(dir.path()));

    let report = analyzer
        .analyze(&AnalysisRequest::new(&image, AnalysisMode::Classification))
        .unwrap();

    assert_eq!(report.mode, AnalysisMode::Classification);
    assert!(report.detections.is_empty());
    let classification = report.classification.unwrap();
    assert_eq!(classification.label, "Unripe");
    assert!((classification.confidence - 87.65).abs() < 1e-4);
}

#[test]
fn segmentation_report_runs_only_the_detector() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "tomato.png", 64, 64);
    let classifier = FixedClassifier::new(PROBABILITIES.to_vec());
    let detector = SyntheticDetector::new(
        vec![
            Anchor { cx: 24.0, cy: 24.0, w: 24.0, h: 24.0, class_id: 0, score: 0.876 },
            Anchor { cx: 25.0, cy: 25.0, w: 24.0, h: 24.0, class_id: 0, score: 0.6 },
        ],
        1,
    );
    let registry = ModelRegistry::from_parts(Some(Box::new(classifier)), Some(Box::new(detector)));
    let analyzer = Analyzer::from_registry(registry, config_in(dir.path()));

    let report = analyzer
        .analyze(&AnalysisRequest::new(&image, AnalysisMode::Segmentation))
        .unwrap();

    assert!(report.classification.is_none());
    assert_eq!(report.detections.len(), 1);
    let detection = &report.detections[0];
    assert_eq!(detection.label, "Ripe");
    assert!((detection.confidence - 0.88).abs() < 1e-6);
    assert!(detection.polygon.len() >= MIN_POLYGON_VERTICES);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "segmentation");
    assert!(json["classification"].is_null());
    assert!(json["detections"][0]["polygon"].is_array());
}

#[test]
fn analyze_rejects_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = Analyzer::from_registry(ModelRegistry::empty(), config_in(dir.path()));

    let gif = dir.path().join("tomato.gif");
    std::fs::write(&gif, b"GIF89a").unwrap();
    let err = analyzer
        .analyze(&AnalysisRequest::new(&gif, AnalysisMode::Classification))
        .unwrap_err();
    assert!(matches!(err, VisionError::InvalidInput { .. }));

    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").unwrap();
    let err = analyzer
        .analyze(&AnalysisRequest::new(&empty, AnalysisMode::Segmentation))
        .unwrap_err();
    assert!(matches!(err, VisionError::InvalidInput { .. }));
}

#[test]
fn undecodable_image_classifies_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.png");
    std::fs::write(&broken, b"definitely not a png").unwrap();
    let registry = ModelRegistry::from_parts(
        Some(Box::new(FixedClassifier::new(PROBABILITIES.to_vec()))),
        None,
    );
    let analyzer = Analyzer::from_registry(registry, config_in(dir.path()));

    let report = analyzer
        .analyze(&AnalysisRequest::new(&broken, AnalysisMode::Classification))
        .unwrap();
    let classification = report.classification.unwrap();
    assert_eq!(classification.label, "Error");
    assert_eq!(classification.confidence, 0.0);
}

#[test]
fn analyzer_serves_concurrent_requests() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "tomato.png", 32, 32);
    let registry = ModelRegistry::from_parts(
        Some(Box::new(FixedClassifier::new(PROBABILITIES.to_vec()))),
        None,
    );
    let analyzer = Analyzer::from_registry(registry, config_in(dir.path()));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| analyzer.classify(&image)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().label, "Ripe");
        }
    });
}
