//! Per-stage static configuration
//!
//! A [`StageConfig`] is built once before a run and handed to every stage's
//! Init call. The only mid-run mutation allowed is injecting the
//! [`DeviceHandle`] once the device stage has reported it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque identifier for the remote device context
///
/// Returned by device-stage Init and passed to every other stage's Init so
/// all stages operate against the same resource context. Immutable once
/// obtained; lives for the duration of the coordinator's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle(pub u64);

/// Pixel format of the raw frame side of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Planar 4:2:0, 3 planes, chroma half width and half height
    Yuv420p,
    /// Semi-planar 4:2:0 (luma plane + interleaved chroma)
    Nv12,
}

/// Codec of the compressed side of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// H.264 / AVC
    Avc,
    /// H.265 / HEVC
    Hevc,
}

/// One auxiliary name/value parameter forwarded verbatim to the remote stage
///
/// These are codec- and vendor-specific knobs (`low_latency`, `out_fmt`,
/// `bf`, ...) the coordinator never interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageParam {
    /// Parameter name as the remote stage expects it
    pub name: String,
    /// Integer value
    pub value: i64,
}

/// Static configuration for one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame rate numerator
    pub fps_num: u32,
    /// Frame rate denominator
    pub fps_den: u32,
    /// Bits per pixel component on the raw side
    #[serde(default = "default_bits_per_pixel")]
    pub bits_per_pixel: u32,
    /// Raw-side pixel format
    pub pixel_format: PixelFormat,
    /// Compressed-side codec, where the stage has one
    #[serde(default)]
    pub codec: Option<Codec>,
    /// Shared device context, injected after device Init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceHandle>,
    /// Auxiliary stage parameters, forwarded opaquely
    #[serde(default)]
    pub params: Vec<StageParam>,
}

fn default_bits_per_pixel() -> u32 {
    8
}

impl StageConfig {
    /// Build a configuration with the mandatory fields and defaults elsewhere
    pub fn new(width: u32, height: u32, fps_num: u32, fps_den: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            fps_num,
            fps_den,
            bits_per_pixel: default_bits_per_pixel(),
            pixel_format,
            codec: None,
            device: None,
            params: Vec::new(),
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StageConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the codec
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Append an auxiliary parameter
    pub fn with_param(mut self, name: impl Into<String>, value: i64) -> Self {
        self.params.push(StageParam {
            name: name.into(),
            value,
        });
        self
    }

    /// Inject the shared device handle (the one permitted mid-run mutation)
    pub fn with_device(mut self, device: DeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "resolution {}x{} is not valid",
                self.width, self.height
            )));
        }
        if self.fps_den == 0 {
            return Err(Error::Config("fps denominator must be non-zero".into()));
        }
        Ok(())
    }
}
