use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use futures::{StreamExt, stream};
use image::{
    DynamicImage, GenericImageView, ImageFormat, ImageReader,
    codecs::{
        avif::AvifEncoder,
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilterType, PngEncoder},
        webp::WebPEncoder,
    },
    imageops::FilterType,
};
use tracing::{debug, warn};

use crate::{config::ImageSettings, utils::filename::decode_upload_name};

const COMPRESSED_SUFFIX: &str = "_Min";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetCodec {
    Png,
    Gif,
    WebP,
    Tiff,
    Avif,
    Heif,
    Jpeg,
}

impl TargetCodec {
    fn from_extension(extension: &str) -> Self {
        match extension {
            ".png" => TargetCodec::Png,
            ".gif" => TargetCodec::Gif,
            ".webp" => TargetCodec::WebP,
            ".tiff" | ".tif" => TargetCodec::Tiff,
            ".avif" => TargetCodec::Avif,
            ".heic" | ".heif" => TargetCodec::Heif,
            _ => TargetCodec::Jpeg,
        }
    }
}

/// One stored upload that should get a compressed sibling.
///
/// `file_name` is the name the upload was stored under; it must be unique
/// within a batch so compressed siblings never share a path.
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub stored_path: PathBuf,
    pub file_name: String,
}

/// Name of the compressed sibling: `{name}_Min{.ext}` with the extension lowercased.
pub fn compressed_file_name(file_name: &str) -> String {
    let extension = dotted_extension(file_name);
    let stem = &file_name[..file_name.len() - extension.len()];
    let stem = decode_upload_name(stem);
    let candidate = decode_upload_name(&format!(
        "{stem}{COMPRESSED_SUFFIX}{}",
        extension.to_ascii_lowercase()
    ));
    sanitize_filename::sanitize(candidate)
}

/// Shrinks and re-encodes the image at `file_path` into `output_dir`.
///
/// Returns the compressed file name, or `file_name` unchanged when the image
/// could not be processed. Never fails.
pub async fn create_compressed_image(
    settings: &ImageSettings,
    output_dir: &Path,
    file_path: &Path,
    file_name: &str,
) -> String {
    let compressed_name = compressed_file_name(file_name);
    let codec = TargetCodec::from_extension(&dotted_extension(file_name).to_ascii_lowercase());
    let source = file_path.to_path_buf();
    let destination = output_dir.join(&compressed_name);
    let settings = settings.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        compress_to_file(&settings, codec, &source, &destination)
    })
    .await
    .map_err(|err| anyhow!("compression task failed: {err}"))
    .and_then(|result| result);

    match outcome {
        Ok(()) => {
            debug!(file = %file_name, compressed = %compressed_name, "image compressed");
            compressed_name
        }
        Err(err) => {
            warn!(?err, file = %file_name, "压缩图片失败");
            file_name.to_string()
        }
    }
}

/// Compresses every job, at most `settings.max_concurrency` at a time, and
/// waits for all of them. Results keep the order of `jobs`.
pub async fn compress_batch(
    settings: &ImageSettings,
    output_dir: &Path,
    jobs: &[CompressionJob],
) -> Vec<String> {
    let limit = settings.max_concurrency.max(1);
    stream::iter(jobs.iter().cloned())
        .map(|job| {
            let settings = settings.clone();
            let output_dir = output_dir.to_path_buf();
            async move {
                create_compressed_image(&settings, &output_dir, &job.stored_path, &job.file_name)
                    .await
            }
        })
        .buffered(limit)
        .collect()
        .await
}

fn compress_to_file(
    settings: &ImageSettings,
    codec: TargetCodec,
    source: &Path,
    destination: &Path,
) -> Result<()> {
    let image = ImageReader::open(source)
        .with_context(|| format!("failed to open {}", source.display()))?
        .with_guessed_format()
        .context("failed to sniff image format")?
        .decode()
        .context("failed to decode image")?;

    let image = fit_within(image, settings.max_width);
    let bytes = encode(&image, codec, settings)?;

    std::fs::write(destination, bytes)
        .with_context(|| format!("failed to write {}", destination.display()))
}

/// Bounds the larger side by `max_side`, keeping the aspect ratio. Never upscales.
fn fit_within(image: DynamicImage, max_side: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width.max(height) <= max_side {
        return image;
    }
    image.resize(max_side, max_side, FilterType::Lanczos3)
}

fn encode(image: &DynamicImage, codec: TargetCodec, settings: &ImageSettings) -> Result<Vec<u8>> {
    let quality = &settings.quality;
    let mut buffer = Cursor::new(Vec::new());

    match codec {
        TargetCodec::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            image.write_with_encoder(encoder).context("png encoding failed")?;
        }
        TargetCodec::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut buffer, ImageFormat::Gif)
                .context("gif encoding failed")?;
        }
        TargetCodec::WebP => {
            // The bundled WebP encoder is lossless only.
            let encoder = WebPEncoder::new_lossless(&mut buffer);
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(encoder)
                .context("webp encoding failed")?;
        }
        TargetCodec::Tiff => {
            image
                .write_to(&mut buffer, ImageFormat::Tiff)
                .context("tiff encoding failed")?;
        }
        TargetCodec::Avif => {
            let speed = 10u8.saturating_sub(settings.effort).clamp(1, 10);
            let encoder =
                AvifEncoder::new_with_speed_quality(&mut buffer, speed, quality.avif.clamp(1, 100));
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(encoder)
                .context("avif encoding failed")?;
        }
        TargetCodec::Heif => {
            return Err(anyhow!("no HEIF encoder available"));
        }
        TargetCodec::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.jpeg.clamp(1, 100));
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .context("jpeg encoding failed")?;
        }
    }

    Ok(buffer.into_inner())
}

fn dotted_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
