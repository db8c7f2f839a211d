// camera.rs — Video stream lifecycle: acquire/release the host camera,
// facing-mode switching, and frame snapshot to a raster buffer.
//
// The camera itself belongs to the host environment; this module owns the
// lifecycle around it and the JPEG/base64 encoding of captured frames.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;

use crate::error::PipelineError;

/// Settle delay between releasing one camera handle and acquiring the next.
/// Acquiring while the old handle is still winding down races the hardware
/// on many devices; the delay is a documented workaround, not a correctness
/// guarantee.
pub const SETTLE_DELAY: Duration = Duration::from_millis(800);

pub const IDEAL_WIDTH: u32 = 1920;
pub const IDEAL_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn toggled(self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Front => "FRONT",
            Facing::Back => "BACK",
        }
    }
}

/// Resolution hint passed to the host when acquiring the device.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionHints {
    pub width: u32,
    pub height: u32,
}

impl Default for ResolutionHints {
    fn default() -> Self {
        Self {
            width: IDEAL_WIDTH,
            height: IDEAL_HEIGHT,
        }
    }
}

/// One captured raster buffer. Created per capture, owned by the
/// orchestrator for the duration of one analysis cycle, discarded after
/// crop generation.
pub struct Frame {
    image: RgbaImage,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Host-supplied camera device. Implementations wrap whatever the platform
/// provides (a browser media stream bridge, V4L2, AVFoundation, a test
/// double).
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Acquire a live handle for the given facing mode.
    /// Fails with [`PipelineError::Device`] when unavailable or denied.
    async fn acquire(
        &self,
        facing: Facing,
        hints: ResolutionHints,
    ) -> Result<Box<dyn CameraHandle>, PipelineError>;
}

/// A live camera stream handle. Exclusively owned by the controller.
#[async_trait]
pub trait CameraHandle: Send {
    /// Snapshot the current frame.
    /// Fails with [`PipelineError::NotReady`] before the device delivers data.
    async fn snapshot(&mut self) -> Result<Frame, PipelineError>;

    /// Stop all tracks and detach. Must complete before a re-acquire.
    async fn release(&mut self);
}

/// Owns at most one camera handle and serializes every lifecycle operation.
///
/// Facing switches are an explicit two-phase operation: fully release the
/// old handle, wait out [`SETTLE_DELAY`], then acquire the new one. The
/// handle mutex is held across the whole sequence so a snapshot can never
/// interleave with a half-finished switch.
pub struct CameraController {
    device: Box<dyn CameraDevice>,
    handle: TokioMutex<Option<Box<dyn CameraHandle>>>,
    facing: Mutex<Facing>,
    hints: ResolutionHints,
    settle: Duration,
}

impl CameraController {
    pub fn new(device: Box<dyn CameraDevice>, facing: Facing) -> Self {
        Self::with_settle(device, facing, SETTLE_DELAY)
    }

    pub fn with_settle(device: Box<dyn CameraDevice>, facing: Facing, settle: Duration) -> Self {
        Self {
            device,
            handle: TokioMutex::new(None),
            facing: Mutex::new(facing),
            hints: ResolutionHints::default(),
            settle,
        }
    }

    pub fn facing(&self) -> Facing {
        *self.facing.lock().unwrap()
    }

    /// Snapshot the current frame, acquiring the device first if needed.
    pub async fn snapshot(&self) -> Result<Frame, PipelineError> {
        let mut guard = self.handle.lock().await;
        if guard.is_none() {
            let facing = self.facing();
            log::info!("Acquiring camera ({})", facing.as_str());
            *guard = Some(self.device.acquire(facing, self.hints).await?);
        }
        guard
            .as_mut()
            .expect("handle acquired above")
            .snapshot()
            .await
    }

    /// Switch facing mode: release → settle → acquire, fully serialized.
    /// Returns the facing mode now active.
    pub async fn switch_facing(&self) -> Result<Facing, PipelineError> {
        let mut guard = self.handle.lock().await;
        if let Some(mut old) = guard.take() {
            old.release().await;
            log::debug!("Old camera handle released, settling for {:?}", self.settle);
            tokio::time::sleep(self.settle).await;
        }

        let next = self.facing().toggled();
        let new_handle = self.device.acquire(next, self.hints).await?;
        *guard = Some(new_handle);
        *self.facing.lock().unwrap() = next;
        log::info!("Camera switched to {}", next.as_str());
        Ok(next)
    }

    /// Release the handle without re-acquiring.
    pub async fn release(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(mut handle) = guard.take() {
            handle.release().await;
            log::info!("Camera released");
        }
    }
}

/// JPEG-encode a frame and base64-encode the result for the wire.
pub fn encode_frame(frame: &Frame, jpeg_quality: u8) -> Result<String, PipelineError> {
    let mut jpeg_buf: Vec<u8> = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, jpeg_quality);
        let rgb = image::DynamicImage::ImageRgba8(frame.image().clone()).to_rgb8();
        encoder
            .encode(
                rgb.as_raw(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PipelineError::Device(format!("jpeg encode: {e}")))?;
    }
    Ok(BASE64.encode(&jpeg_buf))
}
