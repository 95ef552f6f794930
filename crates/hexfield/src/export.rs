use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::{debug, info};

use crate::field::{shade_pixel, FieldParams};
use crate::types::MAX_SURFACE_DIMENSION;

/// Renders one frame of the field on the CPU at `time` seconds.
///
/// Zero dimensions are clamped to one pixel; dimensions above
/// [`MAX_SURFACE_DIMENSION`] are rejected before anything is allocated.
pub fn render_still(size: (u32, u32), time: f32) -> Result<RgbaImage> {
    let (width, height) = (size.0.max(1), size.1.max(1));
    if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
        bail!(
            "still size {width}x{height} exceeds the {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION} limit"
        );
    }
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .context("still frame buffer size overflows")?;
    debug!(width, height, bytes, "rendering still frame");

    let params = FieldParams::new((width, height), time);
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        Rgba(shade_pixel(x, y, &params).map(to_byte))
    }))
}

/// Renders a still and writes it to `path` as PNG.
pub fn export_png(path: &Path, size: (u32, u32), time: f32) -> Result<()> {
    let image = render_still(size, time)?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write still frame to {}", path.display()))?;
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        time,
        "still frame exported"
    );
    Ok(())
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}
