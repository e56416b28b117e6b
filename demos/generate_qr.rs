//! Generate a QR code II with a throwaway key and save it as PNG and BMP
//!
//! Usage: cargo run --example generate_qr

use ksef_qr::{DigestSource, Environment, GenerationRequest, ImageFormat, P256Signer, pipeline};
use p256::ecdsa::SigningKey;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // A real run loads the KSeF offline key; any P-256 key shows the flow
    let signer = P256Signer::new(SigningKey::from_slice(&[7u8; 32])?);

    for format in [ImageFormat::Png, ImageFormat::Bmp] {
        let request = GenerationRequest::new(Environment::Test, "1111111111", "01F20A5D352AE590")
            .source(DigestSource::Fallback)
            .format(format);
        let generated = pipeline::generate(&request, &signer)?;
        generated.verify_rendered()?;

        let path = format!("qr_code_ii.{}", format.extension());
        std::fs::write(&path, generated.image.as_bytes())?;
        println!("✓ QR code saved to {path}");
        println!("  Content: {}", generated.link);
    }

    Ok(())
}
