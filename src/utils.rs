use std::fs;
use std::path::Path;

use crate::error::{Result, VisionError};

/// Accepted image file extensions, lowercase.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Largest accepted image file, in bytes.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Check that a path names a non-empty image file of a supported type and size.
pub fn validate_image(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .ok_or_else(|| VisionError::invalid_input(format!("{} has no file extension", path.display())))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(VisionError::invalid_input(format!(
            "unsupported format .{ext}, use one of: {}",
            ALLOWED_EXTENSIONS.join(", ").to_uppercase()
        )));
    }

    let size = fs::metadata(path)?.len();
    if size == 0 {
        return Err(VisionError::invalid_input(format!("{} is empty", path.display())));
    }
    if size > MAX_FILE_SIZE {
        return Err(VisionError::invalid_input(format!(
            "file too large ({:.1}MB), maximum is 10MB",
            size as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(())
}
