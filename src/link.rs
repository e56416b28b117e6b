//! Certificate verification link (KSeF QR code II)
//!
//! A link has the shape
//!
//! ```text
//! {base}/certificate/{kind}/{context id}/{seller id}/{serial}/{digest}/{signature}
//! ```
//!
//! where `digest` and `signature` are Base64URL without padding and every
//! variable segment is percent-encoded as a URL path segment. The signature
//! covers the link up to and including the digest segment, without the
//! `https://` prefix.

use crate::digest::ContentDigest;
use crate::environment::Environment;
use crate::error::{Error, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use std::fmt;
use url::Url;

const CERTIFICATE_SEGMENT: &str = "certificate";

/// Kind of identifier anchoring the invoice context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContextKind {
    /// Polish tax identification number
    #[default]
    Nip,
    /// KSeF internal identifier
    InternalId,
    /// EU VAT number paired with a NIP
    NipVatUe,
    /// Peppol participant identifier
    PeppolId,
}

impl ContextKind {
    /// Literal marker carried in the link path
    pub fn tag(self) -> &'static str {
        match self {
            Self::Nip => "Nip",
            Self::InternalId => "InternalId",
            Self::NipVatUe => "NipVatUe",
            Self::PeppolId => "PeppolId",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Produces signatures over link payloads.
///
/// Implementations must be safe to call without external synchronisation.
pub trait Signer {
    /// Sign `payload`, returning the raw signature bytes.
    ///
    /// Failures should be reported as [`Error::Signing`].
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

impl<S: Signer + ?Sized> Signer for &S {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(payload)
    }
}

impl<S: Signer + ?Sized> Signer for Box<S> {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(payload)
    }
}

/// Validated inputs of a verification link, everything but the signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    environment: Environment,
    context_kind: ContextKind,
    context_id: String,
    seller_id: String,
    cert_serial: String,
    digest: ContentDigest,
}

impl VerificationRequest {
    /// Validate the parameters. An empty `seller_id` defaults to `context_id`.
    pub fn new(
        environment: Environment,
        context_kind: ContextKind,
        context_id: &str,
        seller_id: &str,
        cert_serial: &str,
        digest: ContentDigest,
    ) -> Result<Self> {
        let seller_id = if seller_id.is_empty() {
            context_id
        } else {
            seller_id
        };

        check_segment("context identifier", context_id)?;
        check_segment("seller identifier", seller_id)?;
        check_segment("certificate serial number", cert_serial)?;

        Ok(Self {
            environment,
            context_kind,
            context_id: context_id.to_string(),
            seller_id: seller_id.to_string(),
            cert_serial: cert_serial.to_string(),
            digest,
        })
    }

    /// Target environment
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Context identifier kind
    pub fn context_kind(&self) -> ContextKind {
        self.context_kind
    }

    /// Context identifier
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Resolved seller identifier
    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }

    /// Certificate serial number
    pub fn cert_serial(&self) -> &str {
        &self.cert_serial
    }

    /// Content digest
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    fn unsigned_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.environment.base_url())
            .map_err(|e| Error::InvalidParameter(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidParameter("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(CERTIFICATE_SEGMENT)
            .push(self.context_kind.tag())
            .push(&self.context_id)
            .push(&self.seller_id)
            .push(&self.cert_serial)
            .push(&self.digest.to_base64url());
        Ok(url)
    }

    /// Bytes the signature is computed over.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let url = self.unsigned_url()?;
        let without_scheme = url
            .as_str()
            .strip_prefix(url.scheme())
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| Error::InvalidParameter(format!("Unexpected base URL {url}")))?;
        Ok(without_scheme.as_bytes().to_vec())
    }

    /// Sign the payload and assemble the finished link.
    pub fn sign<S: Signer + ?Sized>(&self, signer: &S) -> Result<VerificationLink> {
        let payload = self.signing_payload()?;
        let signature = signer.sign(&payload)?;
        if signature.is_empty() {
            return Err(Error::Signing("signer returned an empty signature".to_string()));
        }
        tracing::debug!(
            payload_len = payload.len(),
            signature_len = signature.len(),
            "Signed verification payload"
        );

        let mut url = self.unsigned_url()?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidParameter("Base URL cannot carry a path".to_string()))?
            .push(&URL_SAFE_NO_PAD.encode(&signature));
        Ok(VerificationLink(url.into()))
    }
}

// URL path normalisation drops `.` and `..` segments, which would shift every
// following field into the wrong slot.
fn check_segment(field: &str, value: &str) -> Result<()> {
    match value {
        "" => Err(Error::InvalidParameter(format!("{field} must not be empty"))),
        "." | ".." => Err(Error::InvalidParameter(format!(
            "{field} '{value}' is not a valid path segment"
        ))),
        _ => Ok(()),
    }
}

/// Validate the inputs, sign them and return the verification link.
pub fn build<S: Signer + ?Sized>(
    environment: Environment,
    context_kind: ContextKind,
    context_id: &str,
    seller_id: &str,
    cert_serial: &str,
    digest: ContentDigest,
    signer: &S,
) -> Result<VerificationLink> {
    VerificationRequest::new(
        environment,
        context_kind,
        context_id,
        seller_id,
        cert_serial,
        digest,
    )?
    .sign(signer)
}

/// Finished verification URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationLink(String);

impl VerificationLink {
    /// The URL as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VerificationLink {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};

    struct StubSigner {
        signature: Vec<u8>,
        calls: Cell<usize>,
        last_payload: RefCell<Vec<u8>>,
    }

    impl StubSigner {
        fn new(signature: &[u8]) -> Self {
            Self {
                signature: signature.to_vec(),
                calls: Cell::new(0),
                last_payload: RefCell::new(Vec::new()),
            }
        }
    }

    impl Signer for StubSigner {
        fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            *self.last_payload.borrow_mut() = payload.to_vec();
            Ok(self.signature.clone())
        }
    }

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>> {
            Err(Error::Signing("key rejected".to_string()))
        }
    }

    fn zero_digest() -> ContentDigest {
        ContentDigest::from_bytes([0u8; 32])
    }

    #[test]
    fn builds_link_in_field_order() {
        let signer = StubSigner::new(&[0xDE, 0xAD]);
        let link = build(
            Environment::Test,
            ContextKind::Nip,
            "1111111111",
            "",
            "ABC123",
            zero_digest(),
            &signer,
        )
        .unwrap();

        let digest = "A".repeat(43);
        assert_eq!(
            link.as_str(),
            format!(
                "https://qr-test.ksef.mf.gov.pl/certificate/Nip/1111111111/1111111111/ABC123/{digest}/3q0"
            )
        );
        assert_eq!(signer.calls.get(), 1);
        assert_eq!(
            signer.last_payload.borrow().as_slice(),
            format!("qr-test.ksef.mf.gov.pl/certificate/Nip/1111111111/1111111111/ABC123/{digest}")
                .as_bytes()
        );
    }

    #[test]
    fn explicit_seller_is_kept() {
        let signer = StubSigner::new(&[1]);
        let link = build(
            Environment::Production,
            ContextKind::Nip,
            "1111111111",
            "2222222222",
            "ABC123",
            zero_digest(),
            &signer,
        )
        .unwrap();
        assert!(
            link.as_str()
                .starts_with("https://qr.ksef.mf.gov.pl/certificate/Nip/1111111111/2222222222/")
        );
    }

    #[test]
    fn variable_segments_are_percent_encoded() {
        let signer = StubSigner::new(&[1]);
        let link = build(
            Environment::Demo,
            ContextKind::PeppolId,
            "0192:a/b",
            "x y",
            "AB#1",
            zero_digest(),
            &signer,
        )
        .unwrap();
        assert!(link.as_str().contains("/PeppolId/0192:a%2Fb/x%20y/AB%231/"));
    }

    #[test]
    fn dot_segments_are_rejected_before_signing() {
        let signer = StubSigner::new(&[1]);
        for (context, seller, serial) in [
            ("1111111111", ".", "ABC123"),
            ("1111111111", "..", "ABC123"),
            (".", "", "ABC123"),
            ("1111111111", "", ".."),
        ] {
            let err = build(
                Environment::Test,
                ContextKind::Nip,
                context,
                seller,
                serial,
                zero_digest(),
                &signer,
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
        assert_eq!(signer.calls.get(), 0);
    }

    #[test]
    fn dots_inside_identifiers_keep_every_segment() {
        let signer = StubSigner::new(&[1]);
        let link = build(
            Environment::Test,
            ContextKind::PeppolId,
            "0192.x",
            "...",
            "ABC123",
            zero_digest(),
            &signer,
        )
        .unwrap();
        let path = link
            .as_str()
            .strip_prefix("https://qr-test.ksef.mf.gov.pl/")
            .unwrap();
        let segments: Vec<&str> = path.split('/').collect();
        assert_eq!(segments.len(), 8);
        assert_eq!(&segments[2..5], &["0192.x", "...", "ABC123"]);
    }

    #[test]
    fn whitespace_seller_is_used_unchanged() {
        let request = VerificationRequest::new(
            Environment::Test,
            ContextKind::Nip,
            "1111111111",
            " ",
            "ABC123",
            zero_digest(),
        )
        .unwrap();
        assert_eq!(request.seller_id(), " ");
    }

    #[test]
    fn empty_serial_is_rejected_before_signing() {
        let signer = StubSigner::new(&[1]);
        let err = build(
            Environment::Test,
            ContextKind::Nip,
            "1111111111",
            "",
            "",
            zero_digest(),
            &signer,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(signer.calls.get(), 0);
    }

    #[test]
    fn empty_context_is_rejected() {
        let err = VerificationRequest::new(
            Environment::Test,
            ContextKind::Nip,
            "",
            "",
            "ABC123",
            zero_digest(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn signing_failure_propagates() {
        let err = build(
            Environment::Test,
            ContextKind::Nip,
            "1111111111",
            "",
            "ABC123",
            zero_digest(),
            &FailingSigner,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Signing);
    }

    #[test]
    fn empty_signature_is_a_signing_failure() {
        let signer = StubSigner::new(&[]);
        let err = build(
            Environment::Test,
            ContextKind::Nip,
            "1111111111",
            "",
            "ABC123",
            zero_digest(),
            &signer,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Signing);
    }

    proptest! {
        #[test]
        fn seller_defaults_only_when_empty(
            context in "[0-9]{10}",
            seller in "[0-9]{0,10}",
        ) {
            let request = VerificationRequest::new(
                Environment::Test,
                ContextKind::Nip,
                &context,
                &seller,
                "ABC123",
                zero_digest(),
            ).unwrap();
            if seller.is_empty() {
                prop_assert_eq!(request.seller_id(), context.as_str());
            } else {
                prop_assert_eq!(request.seller_id(), seller.as_str());
            }
        }

        #[test]
        fn payload_is_a_pure_function_of_fields(
            context in "[0-9A-Za-z]{1,16}",
            serial in "[0-9A-F]{1,20}",
            digest in proptest::array::uniform32(any::<u8>()),
        ) {
            let make = || VerificationRequest::new(
                Environment::Demo,
                ContextKind::Nip,
                &context,
                "",
                &serial,
                ContentDigest::from_bytes(digest),
            ).unwrap();
            prop_assert_eq!(make().signing_payload().unwrap(), make().signing_payload().unwrap());
        }
    }
}
