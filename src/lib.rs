//! KSeF QR code II generator
//!
//! Builds the signed certificate verification link used by the Polish
//! national e-invoicing system (KSeF) for offline invoices and renders it as
//! a QR code image.
//!
//! # Features
//!
//! - **Digest**: SHA-256 over a file, standard input or placeholder content
//! - **Link building**: ordered, percent-encoded path segments signed through a
//!   pluggable [`Signer`]
//! - **Rendering**: one pixel grid written as PNG or BMP
//! - **Credentials**: encrypted PKCS#8 P-256 keys and X.509 certificate serials
//!
//! # Example
//!
//! ```no_run
//! use ksef_qr::{Environment, GenerationRequest, P256Signer, pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let pem = std::fs::read_to_string("offline.key")?;
//!     let signer = P256Signer::from_pem(&pem, Some("secret"))?;
//!
//!     let request = GenerationRequest::new(Environment::Test, "1111111111", "01F20A5D352AE590");
//!     let generated = pipeline::generate(&request, &signer)?;
//!
//!     println!("{}", generated.link);
//!     std::fs::write("qr.png", generated.image.as_bytes())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod credentials;
pub mod digest;
pub mod environment;
pub mod error;
pub mod link;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod qr;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result, Stage};

pub use config::{GenerationOptions, LogRotation, LoggingOptions, QrGenConfig};
pub use credentials::{P256Signer, certificate_serial};
pub use digest::{ContentDigest, DigestSource};
pub use environment::Environment;
pub use link::{ContextKind, Signer, VerificationLink, VerificationRequest};
pub use pipeline::{GeneratedCode, GenerationRequest};
pub use qr::{ImageFormat, PixelGrid, QrDecoder, QrRenderer, RenderedImage};
