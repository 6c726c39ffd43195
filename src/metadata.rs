use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_bytes: Option<u64>,
}

impl ImageMetadata {
    pub fn resolution_cell(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{w} x {h}"),
            _ => "N/A".to_string(),
        }
    }

    pub fn size_cell(&self) -> String {
        match self.file_bytes {
            Some(b) => format!("{:.0} KB", b as f64 / 1024.0),
            None => "N/A".to_string(),
        }
    }
}

/// Reads size and pixel dimensions. Missing facts stay `None`; this never fails.
pub fn read_metadata(path: &Path) -> ImageMetadata {
    let file_bytes = std::fs::metadata(path).ok().map(|m| m.len());
    let (width, height) = match image::image_dimensions(path) {
        Ok((w, h)) => (Some(w), Some(h)),
        Err(e) => {
            debug!("no dimensions for {}: {e}", path.display());
            (None, None)
        }
    };
    ImageMetadata {
        width,
        height,
        file_bytes,
    }
}
