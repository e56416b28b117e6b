use std::cell::Cell;
use std::fs;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use ksef_qr::output::{append_line, image_path, write_image};
use ksef_qr::{
    ContentDigest, ContextKind, DigestSource, Environment, Error, ErrorKind, GenerationRequest,
    ImageFormat, P256Signer, QrDecoder, Result, Signer, Stage, link, pipeline,
};

struct DeadSigner {
    calls: Cell<usize>,
}

impl DeadSigner {
    fn new() -> Self {
        Self {
            calls: Cell::new(0),
        }
    }
}

impl Signer for DeadSigner {
    fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![0xDE, 0xAD])
    }
}

fn p256_signer() -> (P256Signer, VerifyingKey) {
    let key = SigningKey::from_slice(&[42u8; 32]).expect("valid scalar");
    let verifying = VerifyingKey::from(&key);
    (P256Signer::new(key), verifying)
}

#[test]
fn test_environment_scenario_uses_fixed_field_order() {
    let signer = DeadSigner::new();
    let link = link::build(
        Environment::Test,
        ContextKind::Nip,
        "1111111111",
        "",
        "ABC123",
        ContentDigest::from_bytes([0u8; 32]),
        &signer,
    )
    .expect("link");

    let url = link.as_str();
    let base = Environment::Test.base_url();
    assert!(url.starts_with(base));

    let segments: Vec<&str> = url[base.len()..].trim_start_matches('/').split('/').collect();
    assert_eq!(
        segments,
        vec![
            "certificate",
            "Nip",
            "1111111111",
            "1111111111",
            "ABC123",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "3q0",
        ]
    );
    assert_eq!(signer.calls.get(), 1);
}

#[test]
fn unknown_environment_never_reaches_the_signer() {
    let signer = DeadSigner::new();
    let result: Result<_> = "staging".parse::<Environment>().and_then(|environment| {
        let request = GenerationRequest::new(environment, "1111111111", "ABC123");
        pipeline::generate(&request, &signer)
    });

    let err = result.expect_err("staging is not an environment");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(signer.calls.get(), 0);
}

#[test]
fn empty_serial_produces_no_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let signer = DeadSigner::new();
    let request = GenerationRequest::new(Environment::Test, "1111111111", "");

    let err = pipeline::generate(&request, &signer).expect_err("empty serial");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(err.stage(), Some(Stage::LinkBuilding));
    assert_eq!(signer.calls.get(), 0);
    assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 0);
}

#[test]
fn p256_signature_verifies_against_link_payload() {
    let (signer, verifying) = p256_signer();
    let request = GenerationRequest::new(Environment::Demo, "5265877635", "01F20A5D352AE590")
        .seller("7010002137");
    let generated = pipeline::generate(&request, &signer).expect("generate");

    let url = generated.link.as_str();
    let (unsigned, signature) = url.rsplit_once('/').expect("signature segment");
    let payload = unsigned.strip_prefix("https://").expect("https link");
    assert!(payload.starts_with("qr-demo.ksef.mf.gov.pl/certificate/Nip/5265877635/7010002137/"));

    let raw = URL_SAFE_NO_PAD.decode(signature).expect("base64url signature");
    assert_eq!(raw.len(), 64);
    let signature = Signature::from_slice(&raw).expect("p1363 signature");
    verifying
        .verify(payload.as_bytes(), &signature)
        .expect("signature over link payload");
}

#[test]
fn rendered_link_decodes_back_in_both_formats() {
    let (signer, _) = p256_signer();
    for format in [ImageFormat::Png, ImageFormat::Bmp] {
        let request =
            GenerationRequest::new(Environment::Production, "1111111111", "01F20A5D352AE590")
                .format(format);
        let generated = pipeline::generate(&request, &signer).expect("generate");

        let decoded = QrDecoder::new()
            .decode_bytes(generated.image.as_bytes())
            .expect("decode");
        assert_eq!(decoded, generated.link.as_str());
        generated.verify_rendered().expect("verify");
    }
}

#[test]
fn file_input_digest_is_embedded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let invoice = dir.path().join("invoice.xml");
    fs::write(&invoice, b"<Faktura/>").expect("write invoice");

    let request = GenerationRequest::new(Environment::Test, "1111111111", "ABC123")
        .source(DigestSource::File(invoice));
    let generated = pipeline::generate(&request, &DeadSigner::new()).expect("generate");

    let expected = ContentDigest::of(b"<Faktura/>").to_base64url();
    assert!(generated.link.as_str().contains(&format!("/{expected}/")));
}

#[test]
fn artifacts_are_written_after_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let request = GenerationRequest::new(Environment::Test, "1111111111", "ABC123")
        .format(ImageFormat::Bmp);
    let generated = pipeline::generate(&request, &DeadSigner::new()).expect("generate");

    let path = image_path(Some(dir.path()), "1111111111", ImageFormat::Bmp);
    write_image(&path, &generated.image).expect("write image");
    assert!(path.ends_with("1111111111_qr2.bmp"));
    assert_eq!(fs::read(&path).expect("read image"), generated.image.bytes);

    let log = dir.path().join("logs").join("links.txt");
    append_line(&log, &generated.log_line()).expect("append");
    append_line(&log, &generated.log_line()).expect("append");
    let contents = fs::read_to_string(&log).expect("read log");
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("certificate serial ABC123"));
}

#[test]
fn signing_failure_is_reported_with_stage() {
    struct Broken;
    impl Signer for Broken {
        fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>> {
            Err(Error::Signing("hardware token unplugged".to_string()))
        }
    }

    let request = GenerationRequest::new(Environment::Test, "1111111111", "ABC123");
    let err = pipeline::generate(&request, &Broken).expect_err("signing fails");
    assert_eq!(err.stage(), Some(Stage::Signing));
    assert_eq!(err.to_string(), "signing: Signing failed: hardware token unplugged");
}
