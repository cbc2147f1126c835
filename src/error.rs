//! Error types for catalog loading, performance lookup, settings and export.

use std::io;
use thiserror::Error;

/// Errors raised while loading or validating a diffuser catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// An I/O error occurred while reading the catalog file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The catalog document is not valid JSON for the expected layout
    #[error("Invalid catalog document: {0}")]
    Json(#[from] serde_json::Error),

    /// A calibration table references a model that is not declared
    #[error("Table references unknown model '{0}'")]
    UnknownModel(String),

    /// A calibration table references a size that has no geometry entry
    #[error("Table for model '{model}' references unknown size '{size}'")]
    UnknownSize { model: String, size: String },

    /// A calibration table has no rows
    #[error("Calibration table {model}/{flow_type}/{size} is empty")]
    EmptyTable {
        model: String,
        flow_type: String,
        size: String,
    },

    /// Calibration rows must be ordered by ascending volume
    #[error("Calibration table {model}/{flow_type}/{size} is not sorted by volume")]
    UnsortedTable {
        model: String,
        flow_type: String,
        size: String,
    },

    /// Every row of a supply table needs a catalog throw
    #[error("Calibration table {model}/{flow_type}/{size} has rows without throw")]
    MissingThrow {
        model: String,
        flow_type: String,
        size: String,
    },
}

/// Reasons a (model, flow type, size) combination cannot be evaluated.
///
/// These are carried as data inside a performance result and rendered as an
/// "unavailable" overlay; they never abort a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerformanceError {
    #[error("Unknown nozzle size '{0}'")]
    UnknownSize(String),

    #[error("Model '{model}' is not manufactured in size {size}")]
    IncompatibleSize { model: String, size: String },

    #[error("No calibration data for {model} / {flow_type} / {size}")]
    NoCalibration {
        model: String,
        flow_type: String,
        size: String,
    },
}

/// Errors raised while reading or writing the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid settings document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while exporting a raster
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    /// Nothing to export, the velocity field has no cells
    #[error("Velocity field is empty")]
    EmptyField,

    /// Pixel buffer does not match the requested dimensions
    #[error("Raster buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PerformanceError::IncompatibleSize {
            model: "dpu-v".to_string(),
            size: "250".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Model 'dpu-v' is not manufactured in size 250"
        );

        let error = CatalogError::UnknownModel("xyz".to_string());
        assert_eq!(format!("{}", error), "Table references unknown model 'xyz'");
    }
}
