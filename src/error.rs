//! Error types for QR code II generation

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for link building and rendering
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading input or writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or missing identifier, serial or environment tag
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Key material or signature algorithm failure
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The URL cannot be represented as a QR code or raster image
    #[error("Failed to encode QR code: {0}")]
    Encoding(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in image
    #[error("No QR code found in image")]
    NoQrCodeFound,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure tagged with the pipeline stage that raised it
    #[error("{stage}: {source}")]
    Stage {
        /// Stage that was running
        stage: Stage,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

/// Failure classes callers can branch on without matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot read input or write output
    Io,
    /// Caller input problem
    InvalidParameter,
    /// Key or signature problem
    Signing,
    /// Barcode generation cannot represent the data
    Encoding,
    /// Rendered image could not be read back
    Decode,
    /// Configuration problem
    Config,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the content and computing its digest
    Digesting,
    /// Producing the signature over the link payload
    Signing,
    /// Validating parameters and assembling the link
    LinkBuilding,
    /// Encoding the link into an image
    Rendering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Digesting => "digesting",
            Stage::Signing => "signing",
            Stage::LinkBuilding => "link building",
            Stage::Rendering => "rendering",
        };
        f.write_str(label)
    }
}

impl Error {
    /// Classify this error, looking through stage wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Error::Signing(_) => ErrorKind::Signing,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::QrDecode(_) | Error::NoQrCodeFound => ErrorKind::Decode,
            Error::Config(_) => ErrorKind::Config,
            Error::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage the error was raised in, if it went through the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Wrap this error with the stage that produced it.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ Error::Stage { .. } => already,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

// Raster container encoding happens in memory, so any image error is a data problem.
impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(e: qrcode::types::QrError) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(format!("JSON error: {}", e))
    }
}
