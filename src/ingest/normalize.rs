use std::borrow::Cow;

use anyhow::{anyhow, Result};

use crate::frame::{BufferDimensions, PixelFormat};

/// Convert frame bytes to packed RGB. RGB input is borrowed, not copied.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    dimensions: BufferDimensions,
    format: PixelFormat,
) -> Result<Cow<'_, [u8]>> {
    let expected = format
        .frame_len(dimensions)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    match format {
        PixelFormat::Rgb24 => Ok(Cow::Borrowed(pixels)),
        PixelFormat::Nv12 => Ok(Cow::Owned(nv12_to_rgb(pixels, dimensions))),
    }
}

// Full-range BT.601. Length is checked by the caller.
fn nv12_to_rgb(pixels: &[u8], dimensions: BufferDimensions) -> Vec<u8> {
    let w = dimensions.width as usize;
    let h = dimensions.height as usize;
    let y_plane = w * h;
    let chroma_stride = w.div_ceil(2) * 2;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * chroma_stride + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
