//! End-to-end generation: digest, sign, build the link, render

use crate::digest::DigestSource;
use crate::environment::Environment;
use crate::error::{Error, ErrorKind, Result, Stage};
use crate::link::{ContextKind, Signer, VerificationLink, VerificationRequest};
use crate::qr::{ImageFormat, QrDecoder, QrRenderer, RenderedImage};
use serde::Serialize;
use tracing::{debug, info, info_span};

/// Everything needed to produce one QR code II
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Target environment
    pub environment: Environment,
    /// Kind of the context identifier
    pub context_kind: ContextKind,
    /// Context identifier (issuer NIP)
    pub context_id: String,
    /// Seller identifier; empty means same as `context_id`
    pub seller_id: String,
    /// Certificate serial number
    pub cert_serial: String,
    /// Content to attest
    pub source: DigestSource,
    /// Output image format
    pub format: ImageFormat,
}

impl GenerationRequest {
    /// Request with a NIP context, fallback content and PNG output
    pub fn new(environment: Environment, context_id: &str, cert_serial: &str) -> Self {
        Self {
            environment,
            context_kind: ContextKind::Nip,
            context_id: context_id.to_string(),
            seller_id: String::new(),
            cert_serial: cert_serial.to_string(),
            source: DigestSource::Fallback,
            format: ImageFormat::Png,
        }
    }

    /// Set a seller identifier different from the context
    pub fn seller(mut self, seller_id: &str) -> Self {
        self.seller_id = seller_id.to_string();
        self
    }

    /// Set the attested content
    pub fn source(mut self, source: DigestSource) -> Self {
        self.source = source;
        self
    }

    /// Set the output format
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    /// Validated link inputs
    pub request: VerificationRequest,
    /// Signed verification link
    pub link: VerificationLink,
    /// Rendered barcode
    pub image: RenderedImage,
}

/// Serializable summary of a generated code
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    /// Environment tag
    pub environment: Environment,
    /// Context identifier kind
    pub context_kind: String,
    /// Context identifier
    pub context_id: String,
    /// Seller identifier
    pub seller_id: String,
    /// Certificate serial
    pub cert_serial: String,
    /// Content digest, hex
    pub digest_hex: String,
    /// Verification link
    pub link: String,
    /// Image format
    pub format: ImageFormat,
    /// Encoded image size in bytes
    pub image_bytes: usize,
}

impl GeneratedCode {
    /// Line appended to the link log
    pub fn log_line(&self) -> String {
        format!(
            "context NIP {}, seller NIP {}, certificate serial {}, link: {}",
            self.request.context_id(),
            self.request.seller_id(),
            self.request.cert_serial(),
            self.link
        )
    }

    /// Decode the rendered image and check it carries the link.
    pub fn verify_rendered(&self) -> Result<()> {
        let decoded = QrDecoder::new()
            .decode_bytes(self.image.as_bytes())
            .map_err(|e| e.at(Stage::Rendering))?;
        if decoded != self.link.as_str() {
            return Err(Error::Encoding(format!(
                "rendered code decodes to '{decoded}' instead of the link"
            ))
            .at(Stage::Rendering));
        }
        debug!("Rendered code verified");
        Ok(())
    }

    /// Structured summary for JSON output
    pub fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            environment: self.request.environment(),
            context_kind: self.request.context_kind().to_string(),
            context_id: self.request.context_id().to_string(),
            seller_id: self.request.seller_id().to_string(),
            cert_serial: self.request.cert_serial().to_string(),
            digest_hex: self.request.digest().to_string(),
            link: self.link.to_string(),
            format: self.image.format,
            image_bytes: self.image.bytes.len(),
        }
    }
}

/// Run the whole pipeline. Failures carry the stage that raised them and
/// nothing is written to disk here.
pub fn generate<S: Signer + ?Sized>(request: &GenerationRequest, signer: &S) -> Result<GeneratedCode> {
    let span = info_span!(
        "generate",
        environment = request.environment.tag(),
        context = %request.context_id,
    );
    let _guard = span.enter();

    debug!(source = %request.source, "Computing content digest");
    let digest = request.source.digest().map_err(|e| e.at(Stage::Digesting))?;

    let verification = VerificationRequest::new(
        request.environment,
        request.context_kind,
        &request.context_id,
        &request.seller_id,
        &request.cert_serial,
        digest,
    )
    .map_err(|e| e.at(Stage::LinkBuilding))?;

    let link = verification.sign(signer).map_err(|e| {
        let stage = match e.kind() {
            ErrorKind::Signing => Stage::Signing,
            _ => Stage::LinkBuilding,
        };
        e.at(stage)
    })?;
    info!(
        seller = verification.seller_id(),
        serial = verification.cert_serial(),
        link = %link,
        "Verification link generated"
    );

    let image = QrRenderer::new()
        .render(link.as_str(), request.format)
        .map_err(|e| e.at(Stage::Rendering))?;
    debug!(format = %image.format, bytes = image.bytes.len(), "QR code rendered");

    Ok(GeneratedCode {
        request: verification,
        link,
        image,
    })
}
