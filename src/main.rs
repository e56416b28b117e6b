//! ksef-qr command-line entrypoint

use clap::{ArgGroup, Parser};
use ksef_qr::output::{append_line, image_path, write_image};
use ksef_qr::{
    DigestSource, Environment, Error, GenerationRequest, ImageFormat, P256Signer, QrGenConfig,
    Result, certificate_serial, logging, pipeline,
};
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

const PASSWORD_ENV: &str = "KSEF_KEY_PASSWORD";

#[derive(Parser, Debug)]
#[command(
    name = "ksef-qr",
    version,
    about = "KSeF QR code II generator: signed certificate verification links as PNG/BMP"
)]
#[command(group(ArgGroup::new("serial").required(true).args(["cert", "cert_serial"])))]
struct Cli {
    /// KSeF offline certificate (PEM or DER)
    #[arg(short = 'c', long, value_name = "PATH")]
    cert: Option<PathBuf>,

    /// Certificate serial number, instead of reading it from --cert
    #[arg(long, value_name = "HEX")]
    cert_serial: Option<String>,

    /// PKCS#8 private key (PEM) matching the certificate
    #[arg(short = 'k', long, value_name = "PATH")]
    key: PathBuf,

    /// File holding the key password; defaults to $KSEF_KEY_PASSWORD
    #[arg(long, value_name = "PATH")]
    password_file: Option<PathBuf>,

    /// KSeF environment (test, demo, prod)
    #[arg(short = 'e', long, value_name = "ENV")]
    env: Option<String>,

    /// Invoice issuer NIP (KSeF context)
    #[arg(short = 'n', long, value_name = "NIP")]
    context_nip: String,

    /// Seller NIP, when different from the issuer
    #[arg(short = 's', long, value_name = "NIP", default_value = "")]
    seller_nip: String,

    /// Content to attest (e.g. invoice XML); '-' reads stdin, omitted uses placeholder content
    #[arg(short = 'i', long = "in", value_name = "PATH", default_value = "")]
    input: String,

    /// Directory for the generated image (current directory when omitted)
    #[arg(short = 'o', long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Append a line with each generated link to this file
    #[arg(short = 'r', long, value_name = "PATH")]
    redirect: Option<PathBuf>,

    /// Output image format (png or bmp)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    format: Option<String>,

    /// Optional configuration file (toml/yaml). Defaults to ksef-qr.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print a JSON summary instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Decode the rendered image and check it carries the link before writing it
    #[arg(long)]
    verify: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(kind = ?err.kind(), stage = ?err.stage(), "Generation failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = QrGenConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    // Resolve every caller-supplied setting before touching key material
    let environment = match cli.env.as_deref() {
        Some(tag) => tag.parse::<Environment>()?,
        None => config.generation.environment()?,
    };
    let format = match cli.format.as_deref() {
        Some(format) => format.parse::<ImageFormat>()?,
        None => config.generation.format,
    };
    let out_dir = cli.out.clone().or(config.generation.out_dir.clone());
    let link_log = cli.redirect.clone().or(config.generation.link_log.clone());

    let serial = match (&cli.cert_serial, &cli.cert) {
        (Some(serial), _) => serial.trim().to_string(),
        (None, Some(path)) => certificate_serial(&fs::read(path)?)?,
        (None, None) => {
            return Err(Error::InvalidParameter(
                "either --cert or --cert-serial is required".to_string(),
            ));
        }
    };

    let key_pem = fs::read_to_string(&cli.key)?;
    let password = resolve_password(
        cli.password_file.as_deref(),
        std::env::var(PASSWORD_ENV).ok(),
        P256Signer::is_encrypted_pem(&key_pem),
        || rpassword::prompt_password(format!("Password for {}: ", cli.key.display())),
    )?;
    let signer = P256Signer::from_pem(&key_pem, password.as_deref())?;

    let source = DigestSource::from_arg(&cli.input);
    if source == DigestSource::Fallback && !cli.json {
        println!("No input given, attesting placeholder content; the QR code is valid regardless");
    }

    let request = GenerationRequest::new(environment, &cli.context_nip, &serial)
        .seller(&cli.seller_nip)
        .source(source)
        .format(format);

    let generated = pipeline::generate(&request, &signer)?;
    if cli.verify {
        generated.verify_rendered()?;
    }

    let path = image_path(out_dir.as_deref(), generated.request.context_id(), format);
    write_image(&path, &generated.image)?;

    if let Some(log) = link_log {
        if let Err(err) = append_line(&log, &generated.log_line()) {
            warn!(path = %log.display(), error = %err, "Failed to append link log");
        }
    }

    if cli.json {
        let mut value = serde_json::to_value(generated.summary())?;
        value["image_path"] = json!(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Link generated for seller NIP {}, KSeF context (issuer) {}, environment: {}, certificate serial {}",
            generated.request.seller_id(),
            generated.request.context_id(),
            environment,
            generated.request.cert_serial()
        );
        println!("{}", generated.link);
        println!("QR code saved to {}", path.display());
    }
    info!(path = %path.display(), "Done");

    Ok(())
}

/// Pick the key password: `--password-file`, then `$KSEF_KEY_PASSWORD`, then an
/// interactive prompt. Plain keys never prompt.
fn resolve_password<F>(
    file: Option<&Path>,
    env_value: Option<String>,
    encrypted: bool,
    prompt: F,
) -> Result<Option<String>>
where
    F: FnOnce() -> io::Result<String>,
{
    if let Some(path) = file {
        let contents = fs::read_to_string(path)?;
        return Ok(Some(contents.trim_end_matches(['\r', '\n']).to_string()));
    }
    if let Some(password) = env_value.filter(|p| !p.is_empty()) {
        return Ok(Some(password));
    }
    if !encrypted {
        return Ok(None);
    }
    let password = prompt()?;
    Ok(Some(password))
}
