//! Writing rendered images to PNG or JPEG.

use std::path::Path;

use image::{ImageBuffer, Rgba};
use zsweep_core::{Result, ZsweepError};

use crate::buffers::Rgba8Image;

/// Options for saving renders.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Keep the volume's alpha (PNG only). Otherwise the image is flattened
    /// over black.
    pub transparent_background: bool,
}

fn image_error(err: image::ImageError) -> ZsweepError {
    ZsweepError::Image(err.to_string())
}

/// Converts a bottom-up premultiplied render into a top-down image buffer.
fn to_buffer(
    render: &Rgba8Image,
    options: &ScreenshotOptions,
) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>> {
    let mut data = render.flipped_rows();
    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3];
        if !options.transparent_background {
            pixel[3] = 255;
        } else if alpha > 0 {
            for c in &mut pixel[..3] {
                #[allow(clippy::cast_possible_truncation)]
                let straight = (u32::from(*c) * 255 / u32::from(alpha)).min(255) as u8;
                *c = straight;
            }
        }
    }
    #[allow(clippy::cast_possible_truncation)]
    let (width, height) = (render.width as u32, render.height as u32);
    ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| ZsweepError::Image("pixel buffer does not match image size".to_string()))
}

/// Saves a render to `filename`; the format follows the extension
/// (`.png`, `.jpg`, `.jpeg`).
pub fn save_image(
    filename: impl AsRef<Path>,
    render: &Rgba8Image,
    options: &ScreenshotOptions,
) -> Result<()> {
    let path = filename.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img = to_buffer(render, options)?;
    match extension.as_str() {
        "png" => img
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(image_error)?,
        "jpg" | "jpeg" => {
            let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb.save_with_format(path, image::ImageFormat::Jpeg)
                .map_err(image_error)?;
        }
        _ => {
            return Err(ZsweepError::Image(format!(
                "unsupported image format: '{extension}'"
            )))
        }
    }
    log::info!("saved {}x{} render to {}", render.width, render.height, path.display());
    Ok(())
}

/// Encodes a render as PNG in memory.
pub fn save_to_buffer(render: &Rgba8Image, options: &ScreenshotOptions) -> Result<Vec<u8>> {
    let img = to_buffer(render, options)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(image_error)?;
    Ok(buffer.into_inner())
}
