use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

/// Read an ordered label vocabulary, one label per line.
///
/// Line order is the class index order of the model output. Blank lines are skipped.
pub fn load_labels<P: AsRef<Path>>(file_path: P) -> std::io::Result<Vec<String>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);

    let mut labels = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            labels.push(name.to_string());
        }
    }
    Ok(labels)
}

/// `index: 'name'` or `index: "name"` pairs of a YOLO `names` dict.
const NAMES_PATTERN: &str = r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#;

/// Parse the `names` entry that YOLO exporters write into ONNX model metadata,
/// e.g. `{0: 'Damaged', 1: 'Old', 2: 'Ripe'}`.
///
/// Entries that do not parse are skipped.
pub fn parse_names_metadata(raw: &str) -> Result<HashMap<usize, String>, regex::Error> {
    let pattern = Regex::new(NAMES_PATTERN)?;
    let mut mapping = HashMap::new();
    for caps in pattern.captures_iter(raw) {
        let Ok(id) = caps[1].parse::<usize>() else {
            continue;
        };
        if let Some(name) = caps.get(2).or_else(|| caps.get(3)) {
            mapping.insert(id, name.as_str().to_string());
        }
    }
    Ok(mapping)
}

/// Class index to label lookup for detector outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    names: HashMap<usize, String>,
}

impl LabelTable {
    pub fn new(names: HashMap<usize, String>) -> Self {
        Self { names }
    }

    pub fn from_ordered(labels: &[String]) -> Self {
        Self::new(labels.iter().cloned().enumerate().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Label for `class_id`, or `class_<id>` when the table has no entry.
    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}
