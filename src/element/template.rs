use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::SetupError;

/// Averaged column intensities of the target sound, one value per display row
/// starting at the lowest non-DC bin. Rows past the end compare as absent.
pub const DEFAULT_TEMPLATE: [u8; 320] = [
    72, 23, 26, 55, 48, 36, 81, 172, 174, 88, 58, 59, 104, 118, 108, 98, 64, 56, 44, 40, 49, 63,
    50, 28, 23, 25, 44, 48, 42, 38, 54, 64, 34, 25, 33, 64, 84, 53, 38, 43, 58, 44, 40, 47, 48,
    44, 27, 30, 42, 44, 49, 39, 27, 19, 19, 17, 16, 14, 16, 13, 15, 16, 14, 11, 10, 10, 9, 10, 9,
    9, 8, 9, 11, 12, 14, 17, 11, 9, 10, 13, 14, 14, 10, 10, 10, 14, 17, 11, 8, 9, 9, 6, 6, 7, 7,
    9, 7, 6, 6, 5, 7, 8, 7, 9, 14, 13, 8, 7, 5, 4, 6, 4, 3, 4, 4, 3, 4, 5, 6, 5, 4, 3, 4, 5, 4, 4,
    5, 4, 4, 5, 5, 5, 5, 4, 6, 5, 4, 5, 8, 11, 12, 7, 7, 6, 5, 4, 5, 5, 5, 4, 4, 4, 4, 4, 5, 3, 4,
    3, 3, 4, 4, 4, 5, 5, 4, 3, 3, 3, 3, 3, 4, 3, 3, 3, 4, 5, 8, 7, 6, 5, 5, 3, 4, 5, 5, 5, 3, 4,
    3, 3, 3, 3, 2, 3, 2, 2, 3, 2, 1, 0, 61, 0, 0, 24, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 14,
    0, 0, 0, 0, 0, 0, 0, 0,
];

pub fn default_template() -> Vec<f32> {
    DEFAULT_TEMPLATE.iter().map(|&v| f32::from(v)).collect()
}

/// Load a template from a JSON array of numbers.
pub fn load_template(path: &Path) -> Result<Vec<f32>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let values: Vec<f32> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse template {}", path.display()))?;
    if values.is_empty() {
        return Err(SetupError::EmptyTemplate.into());
    }
    log::info!("Loaded {}-row template from {}", values.len(), path.display());
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("onsetscope-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn default_template_shape() {
        let template = default_template();
        assert_eq!(template.len(), 320);
        assert_eq!(template[7], 172.0);
        assert!(template[250..].iter().filter(|&&v| v > 0.0).count() == 1);
    }

    #[test]
    fn loads_json_array() {
        let path = scratch_file("ok.json", "[1, 2.5, 0]");
        assert_eq!(load_template(&path).unwrap(), vec![1.0, 2.5, 0.0]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn empty_template_is_rejected() {
        let path = scratch_file("empty.json", "[]");
        let err = load_template(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::EmptyTemplate)
        ));
        fs::remove_file(path).ok();
    }

    #[test]
    fn malformed_template_reports_path() {
        let path = scratch_file("bad.json", "{\"rows\": 3}");
        let err = load_template(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse template"));
        fs::remove_file(path).ok();
    }
}
