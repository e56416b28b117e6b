//! Writing generated artifacts: the image file and the append-only link log

use crate::error::Result;
use crate::qr::{ImageFormat, RenderedImage};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Image path for a context identifier: `{dir}/{context_id}_qr2.{ext}`.
pub fn image_path(dir: Option<&Path>, context_id: &str, format: ImageFormat) -> PathBuf {
    let file_name = format!("{context_id}_qr2.{}", format.extension());
    match dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Write a rendered image, creating the parent directory when missing.
pub fn write_image(path: &Path, image: &RenderedImage) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, image.as_bytes())?;
    tracing::info!(path = %path.display(), bytes = image.bytes.len(), format = %image.format, "Wrote QR code image");
    Ok(())
}

/// Append one line to `path`, creating it and its parent directories if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
