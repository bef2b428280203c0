//! Error types for the GSI DEM crate.

use thiserror::Error;

/// Errors that can occur when turning a GSI tile into a heightmap.
#[derive(Debug, Error)]
pub enum DemError {
    /// The payload does not match the fixed grid shape, or a cell is not a number.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// PNG decoding error.
    #[error("PNG decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The payload encoding does not match the provider configuration.
    #[error("Payload encoding mismatch: provider expects {expected}, got {actual}")]
    EncodingMismatch {
        /// Encoding the provider was configured for.
        expected: &'static str,
        /// Encoding of the payload that was handed in.
        actual: &'static str,
    },

    /// Invalid provider configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
