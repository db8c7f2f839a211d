// crop.rs — Derives fixed-size square thumbnails from normalized ROI
// centers. Pure: same frame and ROI list in, pixel-identical thumbnails out.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage};

use super::camera::Frame;
use crate::ai::Roi;

/// Default crop square side as a fraction of the frame's shorter dimension.
pub const CROP_FRACTION: f64 = 0.25;

/// Default output thumbnail resolution (square).
pub const THUMB_SIZE: u32 = 256;

pub const THUMB_JPEG_QUALITY: u8 = 80;

/// Compute the clamped source square for one ROI center.
///
/// Side = `fraction · min(w, h)`; the top-left corner is clamped so the
/// square stays fully inside the frame. Returns `(sx, sy, side)` in pixels.
pub fn crop_square(frame_w: u32, frame_h: u32, x_pct: f64, y_pct: f64, fraction: f64) -> (u32, u32, u32) {
    let w = frame_w as f64;
    let h = frame_h as f64;
    let side = (fraction * w.min(h)).round().clamp(1.0, w.min(h));

    let cx = x_pct / 100.0 * w;
    let cy = y_pct / 100.0 * h;
    let sx = (cx - side / 2.0).clamp(0.0, w - side);
    let sy = (cy - side / 2.0).clamp(0.0, h - side);

    (sx.round() as u32, sy.round() as u32, side as u32)
}

/// Populate each ROI's thumbnail from the frame it was detected in.
///
/// `fraction` sets the crop square's side relative to the frame's shorter
/// dimension and `thumb_size` the output resolution. Output ordering matches
/// input ordering; zero ROIs in, zero out. A thumbnail that was already set
/// is left untouched. Encoding failures leave that ROI's thumbnail absent
/// rather than failing the batch.
pub fn generate_thumbnails(
    frame: &Frame,
    rois: Vec<Roi>,
    fraction: f64,
    thumb_size: u32,
) -> Vec<Roi> {
    rois.into_iter()
        .map(|mut roi| {
            if roi.thumbnail.is_some() {
                return roi;
            }
            let (sx, sy, side) = crop_square(frame.width(), frame.height(), roi.x, roi.y, fraction);
            match encode_thumbnail(frame, sx, sy, side, thumb_size) {
                Ok(b64) => roi.thumbnail = Some(b64),
                Err(e) => log::error!("thumbnail crop failed for {:?}: {e}", roi.label),
            }
            roi
        })
        .collect()
}

fn encode_thumbnail(frame: &Frame, sx: u32, sy: u32, side: u32, thumb_size: u32) -> Result<String, String> {
    let region = imageops::crop_imm(frame.image(), sx, sy, side, side).to_image();
    let thumb = DynamicImage::ImageRgba8(region)
        .resize_exact(thumb_size, thumb_size, imageops::FilterType::Triangle)
        .to_rgb8();

    let mut jpeg_buf: Vec<u8> = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, THUMB_JPEG_QUALITY);
    encoder
        .encode(
            thumb.as_raw(),
            thumb_size,
            thumb_size,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| format!("jpeg encode: {e}"))?;

    Ok(BASE64.encode(&jpeg_buf))
}
