// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::ViewAxis;
use crate::constants::{frames, panorama, queue};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipelines::photo::CaptureMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Directory name under the user config dir
const CONFIG_DIR_NAME: &str = "capture-control";
/// Config file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Noise reduction variant
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum NrMode {
    #[default]
    Normal,
    /// Longer averaging burst for very dark scenes
    LowLight,
}

/// RAW output preference
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum RawPref {
    /// JPEG only
    #[default]
    JpegOnly,
    /// JPEG plus DNG
    JpegDng,
    /// DNG only (the JPEG is still captured for thumbnails)
    RawOnly,
}

/// Which noise reduction input frames to also save standalone
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum NrSave {
    #[default]
    No,
    Single,
    All,
}

/// Which panorama input frames to also save standalone
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PanoramaSave {
    #[default]
    No,
    All,
    /// All frames plus stitching debug artifacts
    AllPlusDebug,
}

/// Save queue sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Hard ceiling on in-flight cost units
    pub capacity: u32,
    /// Background worker count
    pub workers: usize,
    /// Cost of one JPEG
    pub jpeg_cost: u32,
    /// Cost of one RAW
    pub raw_cost: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: queue::DEFAULT_CAPACITY,
            workers: queue::DEFAULT_WORKERS,
            jpeg_cost: queue::JPEG_COST,
            raw_cost: queue::RAW_COST,
        }
    }
}

/// Preference snapshot consulted on every capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Active shooting mode
    pub mode: CaptureMode,
    /// Expo bracketing frame count (ignored for HDR)
    pub expo_bracketing_n_images: u32,
    /// Expo bracketing stop separation (ignored for HDR)
    pub expo_bracketing_stops: f64,
    /// Focus bracketing frame count
    pub focus_bracketing_n_images: u32,
    /// Fast burst frame count
    pub fast_burst_n_images: u32,
    /// Noise reduction variant
    pub nr_mode: NrMode,
    /// RAW output preference
    pub raw: RawPref,
    /// Allow RAW with expo bracketing and HDR
    pub allow_raw_for_expo_bracketing: bool,
    /// Allow RAW with focus bracketing
    pub allow_raw_for_focus_bracketing: bool,
    /// Save the HDR input exposures too
    pub hdr_save_expo: bool,
    /// Noise reduction input frames to keep
    pub nr_save: NrSave,
    /// Panorama input frames to keep
    pub panorama_save: PanoramaSave,
    /// Taking a still while recording video
    pub video_snapshot: bool,
    /// Capture requested by another application
    pub image_capture_intent: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            expo_bracketing_n_images: frames::DEFAULT_BRACKET_IMAGES,
            expo_bracketing_stops: frames::DEFAULT_BRACKET_STOPS,
            focus_bracketing_n_images: frames::DEFAULT_BRACKET_IMAGES,
            fast_burst_n_images: frames::DEFAULT_FAST_BURST_IMAGES,
            nr_mode: NrMode::default(),
            raw: RawPref::default(),
            allow_raw_for_expo_bracketing: true,
            allow_raw_for_focus_bracketing: true,
            hdr_save_expo: false,
            nr_save: NrSave::default(),
            panorama_save: PanoramaSave::default(),
            video_snapshot: false,
            image_capture_intent: false,
        }
    }
}

/// What the camera and device can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    pub supports_raw: bool,
    pub supports_burst_raw: bool,
    pub supports_noise_reduction: bool,
    pub supports_expo_bracketing: bool,
    pub supports_focus_bracketing: bool,
    pub supports_burst: bool,
    pub supports_panorama: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            supports_raw: true,
            supports_burst_raw: true,
            supports_noise_reduction: true,
            supports_expo_bracketing: true,
            supports_focus_bracketing: true,
            supports_burst: true,
            supports_panorama: true,
        }
    }
}

/// Panorama target acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanoramaSettings {
    /// Which field of view drives the angular step (vertical for portrait)
    pub view_axis: ViewAxis,
    pub target_angle_deg: f32,
    pub upright_tolerance_deg: f32,
    pub too_far_angle_deg: f32,
    pub pics_per_screen: f32,
    pub max_pics: u32,
}

impl Default for PanoramaSettings {
    fn default() -> Self {
        Self {
            view_axis: ViewAxis::Vertical,
            target_angle_deg: panorama::TARGET_ANGLE_DEG,
            upright_tolerance_deg: panorama::UPRIGHT_TOLERANCE_DEG,
            too_far_angle_deg: panorama::TOO_FAR_ANGLE_DEG,
            pics_per_screen: panorama::PICS_PER_SCREEN,
            max_pics: panorama::MAX_PICS,
        }
    }
}

impl PanoramaSettings {
    /// Replace values that would make targets unreachable with defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.pics_per_screen.is_finite() && self.pics_per_screen > 0.0) {
            warn!(
                pics_per_screen = self.pics_per_screen,
                "Invalid panorama pics_per_screen, using default"
            );
            self.pics_per_screen = defaults.pics_per_screen;
        }
        if self.max_pics == 0 {
            warn!("Invalid panorama max_pics, using default");
            self.max_pics = defaults.max_pics;
        }
        for (name, value, default) in [
            ("target_angle_deg", &mut self.target_angle_deg, defaults.target_angle_deg),
            ("upright_tolerance_deg", &mut self.upright_tolerance_deg, defaults.upright_tolerance_deg),
            ("too_far_angle_deg", &mut self.too_far_angle_deg, defaults.too_far_angle_deg),
        ] {
            if !(value.is_finite() && *value > 0.0) {
                warn!(setting = name, value = *value, "Invalid panorama tolerance, using default");
                *value = default;
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Save queue sizing
    pub queue: QueueSettings,
    /// Capture preferences
    pub capture: CaptureSettings,
    /// Device capabilities
    pub device: DeviceCapabilities,
    /// Panorama acquisition
    pub panorama: PanoramaSettings,
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> PipelineResult<()> {
        let path = Self::path()
            .ok_or_else(|| PipelineError::Config("no config directory available".into()))?;
        self.save_to(&path)
    }

    /// Load from an explicit path
    ///
    /// A missing file yields the defaults; a corrupt file is an error.
    pub fn load_from(path: &std::path::Path) -> PipelineResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&text)?;
        config.panorama = config.panorama.sanitized();
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &std::path::Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
