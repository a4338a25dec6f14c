//! Reference image validation
//!
//! Reference images must be local files under the input directory with an allowed
//! image extension. When a [`DimensionProbe`] is available the image must also
//! match the configured frame size exactly; otherwise the check is skipped with a
//! warning.

use std::path::{Path, PathBuf};

use crate::client::ReferenceUpload;
use crate::error::{Error, Result};
use crate::submit::ReferenceImage;
use crate::types::FrameSize;

/// Accepted reference image extensions (lowercase)
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Reads pixel dimensions of an image file
pub trait DimensionProbe: Send + Sync {
    /// Returns `(width, height)` of the image at `path`
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// [`DimensionProbe`] backed by the `image` crate (reads only the header)
#[cfg(feature = "image")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageProbe;

#[cfg(feature = "image")]
impl DimensionProbe for ImageProbe {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| {
            Error::ReferenceImage(format!("cannot read dimensions of {}: {e}", path.display()))
        })
    }
}

/// The probe compiled into this build, if any
pub fn default_probe() -> Option<Box<dyn DimensionProbe>> {
    #[cfg(feature = "image")]
    {
        Some(Box::new(ImageProbe))
    }
    #[cfg(not(feature = "image"))]
    {
        None
    }
}

/// Validates and loads reference images
pub struct ReferenceValidator<'a> {
    input_dir: &'a Path,
    frame_size: FrameSize,
    probe: Option<&'a dyn DimensionProbe>,
}

impl<'a> ReferenceValidator<'a> {
    /// Create a validator for images under `input_dir`
    pub fn new(
        input_dir: &'a Path,
        frame_size: FrameSize,
        probe: Option<&'a dyn DimensionProbe>,
    ) -> Self {
        Self {
            input_dir,
            frame_size,
            probe,
        }
    }

    /// Validate `raw` and read the image into an upload payload
    ///
    /// `raw` may be absolute, relative to the working directory, or relative to the
    /// input directory.
    pub async fn load(&self, raw: &str) -> Result<ReferenceImage> {
        if looks_like_url(raw) {
            return Err(Error::ReferenceImage(format!(
                "URLs are not supported, download the image into {} first: {raw}",
                self.input_dir.display()
            )));
        }

        let given = PathBuf::from(raw);
        let candidate = if given.is_absolute() || tokio::fs::try_exists(&given).await.unwrap_or(false) {
            given
        } else {
            self.input_dir.join(&given)
        };

        let input_dir = tokio::fs::canonicalize(self.input_dir).await.map_err(|e| {
            Error::ReferenceImage(format!(
                "input directory {} is not accessible: {e}",
                self.input_dir.display()
            ))
        })?;
        let resolved = tokio::fs::canonicalize(&candidate).await.map_err(|e| {
            Error::ReferenceImage(format!("{} is not accessible: {e}", candidate.display()))
        })?;

        if !resolved.starts_with(&input_dir) {
            return Err(Error::ReferenceImage(format!(
                "{} is outside the input directory {}",
                resolved.display(),
                input_dir.display()
            )));
        }

        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mime = mime_for_extension(&extension).ok_or_else(|| {
            Error::ReferenceImage(format!(
                "unsupported extension {extension:?}, expected one of {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        match self.probe {
            Some(probe) => {
                let (width, height) = probe.dimensions(&resolved)?;
                if (width, height) != (self.frame_size.width, self.frame_size.height) {
                    return Err(Error::ReferenceImage(format!(
                        "{} is {width}x{height}, expected {} (resize it to the frame size)",
                        resolved.display(),
                        self.frame_size
                    )));
                }
            }
            None => {
                tracing::warn!(
                    path = %resolved.display(),
                    "no image decoder available, skipping dimension check"
                );
            }
        }

        let bytes = tokio::fs::read(&resolved).await?;
        let file_name = resolved
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference")
            .to_string();

        tracing::info!(path = %resolved.display(), size_bytes = bytes.len(), "reference image accepted");
        Ok(ReferenceImage {
            path: resolved,
            upload: ReferenceUpload {
                file_name,
                mime,
                bytes,
            },
        })
    }
}

fn looks_like_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        // Single-letter schemes are Windows drive letters
        Ok(url) => url.scheme().len() > 1,
        Err(_) => raw.contains("://"),
    }
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
