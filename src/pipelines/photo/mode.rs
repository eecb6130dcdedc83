// SPDX-License-Identifier: GPL-3.0-only

//! Shooting modes and per-capture plan resolution
//!
//! A [`CapturePlan`] is the answer to "what will the camera produce if the
//! shutter is pressed right now": how many JPEGs, how many RAWs, whether the
//! frames form a bracket, and how the processing engine should treat them.

use crate::config::{CaptureSettings, DeviceCapabilities, NrMode, NrSave, PanoramaSave, RawPref};
use crate::constants::frames;
use serde::{Deserialize, Serialize};

/// Mutually exclusive shooting modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    #[default]
    Standard,
    /// Single image dynamic range optimisation
    Dro,
    /// HDR merged from an exposure bracket
    Hdr,
    /// Exposure bracket saved as separate images
    ExpoBracketing,
    /// Focus bracket saved as separate images
    FocusBracketing,
    FastBurst,
    /// Multi-frame averaging
    NoiseReduction,
    Panorama,
    // Camera vendor extensions
    XAuto,
    XHdr,
    XNight,
    XBokeh,
    XBeauty,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 13] = [
        CaptureMode::Standard,
        CaptureMode::Dro,
        CaptureMode::Hdr,
        CaptureMode::ExpoBracketing,
        CaptureMode::FocusBracketing,
        CaptureMode::FastBurst,
        CaptureMode::NoiseReduction,
        CaptureMode::Panorama,
        CaptureMode::XAuto,
        CaptureMode::XHdr,
        CaptureMode::XNight,
        CaptureMode::XBokeh,
        CaptureMode::XBeauty,
    ];

    /// Whether this is a camera vendor extension mode
    pub fn is_vendor_extension(&self) -> bool {
        matches!(
            self,
            CaptureMode::XAuto
                | CaptureMode::XHdr
                | CaptureMode::XNight
                | CaptureMode::XBokeh
                | CaptureMode::XBeauty
        )
    }

    /// Modes whose frames arrive one at a time and are combined into one batch
    /// that is terminated explicitly
    pub fn is_incremental_batch(&self) -> bool {
        matches!(self, CaptureMode::NoiseReduction | CaptureMode::Panorama)
    }

    /// Modes whose frames arrive together in a single burst callback
    pub fn is_burst_delivered(&self) -> bool {
        matches!(
            self,
            CaptureMode::Hdr | CaptureMode::ExpoBracketing | CaptureMode::FocusBracketing
        )
    }

    /// Only one capture of these modes may be in flight system-wide
    pub fn is_exclusive(&self) -> bool {
        matches!(self, CaptureMode::FastBurst | CaptureMode::Panorama)
    }

    /// Whether the mode can ever carry RAW output
    pub fn permits_raw(&self) -> bool {
        !(self.is_vendor_extension()
            || matches!(self, CaptureMode::Panorama | CaptureMode::NoiseReduction))
    }

    /// Whether RAW is allowed for this mode under the given preferences
    ///
    /// This doesn't check that the camera supports RAW at all.
    pub fn raw_allowed(&self, settings: &CaptureSettings, device: &DeviceCapabilities) -> bool {
        if settings.image_capture_intent || settings.video_snapshot {
            return false;
        }
        match self {
            CaptureMode::Standard | CaptureMode::Dro => true,
            CaptureMode::ExpoBracketing => {
                settings.allow_raw_for_expo_bracketing && device.supports_burst_raw
            }
            // HDR output itself is never RAW; only the saved base exposures can be
            CaptureMode::Hdr => {
                settings.hdr_save_expo
                    && settings.allow_raw_for_expo_bracketing
                    && device.supports_burst_raw
            }
            CaptureMode::FocusBracketing => {
                settings.allow_raw_for_focus_bracketing && device.supports_burst_raw
            }
            _ => false,
        }
    }

    /// How the processing engine should treat this mode's output
    pub fn process_type(&self) -> ProcessType {
        match self {
            CaptureMode::Dro | CaptureMode::Hdr => ProcessType::Hdr,
            CaptureMode::NoiseReduction => ProcessType::Average,
            CaptureMode::Panorama => ProcessType::Panorama,
            CaptureMode::XNight => ProcessType::XNight,
            _ => ProcessType::Normal,
        }
    }

    /// Whether the device can shoot in this mode
    pub fn is_supported(&self, device: &DeviceCapabilities) -> bool {
        match self {
            CaptureMode::Hdr | CaptureMode::ExpoBracketing => device.supports_expo_bracketing,
            CaptureMode::FocusBracketing => device.supports_focus_bracketing,
            CaptureMode::FastBurst => device.supports_burst,
            CaptureMode::NoiseReduction => device.supports_noise_reduction,
            CaptureMode::Panorama => device.supports_panorama,
            _ => true,
        }
    }

    /// Display name for logs and the CLI
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureMode::Standard => "Standard",
            CaptureMode::Dro => "DRO",
            CaptureMode::Hdr => "HDR",
            CaptureMode::ExpoBracketing => "Expo Bracketing",
            CaptureMode::FocusBracketing => "Focus Bracketing",
            CaptureMode::FastBurst => "Fast Burst",
            CaptureMode::NoiseReduction => "Noise Reduction",
            CaptureMode::Panorama => "Panorama",
            CaptureMode::XAuto => "Auto (extension)",
            CaptureMode::XHdr => "HDR (extension)",
            CaptureMode::XNight => "Night (extension)",
            CaptureMode::XBokeh => "Bokeh (extension)",
            CaptureMode::XBeauty => "Beauty (extension)",
        }
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "standard" | "std" => Ok(CaptureMode::Standard),
            "dro" => Ok(CaptureMode::Dro),
            "hdr" => Ok(CaptureMode::Hdr),
            "expobracketing" | "expo" => Ok(CaptureMode::ExpoBracketing),
            "focusbracketing" | "focus" => Ok(CaptureMode::FocusBracketing),
            "fastburst" | "burst" => Ok(CaptureMode::FastBurst),
            "noisereduction" | "nr" => Ok(CaptureMode::NoiseReduction),
            "panorama" | "pano" => Ok(CaptureMode::Panorama),
            "xauto" => Ok(CaptureMode::XAuto),
            "xhdr" => Ok(CaptureMode::XHdr),
            "xnight" => Ok(CaptureMode::XNight),
            "xbokeh" => Ok(CaptureMode::XBokeh),
            "xbeauty" => Ok(CaptureMode::XBeauty),
            _ => Err(format!("unknown capture mode: {}", s)),
        }
    }
}

/// Processing the engine applies to a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessType {
    /// Save as-is
    Normal,
    /// HDR merge (or single-image DRO)
    Hdr,
    /// Noise reduction averaging
    Average,
    /// Panorama stitching
    Panorama,
    /// Vendor night extension
    XNight,
}

/// Which input frames to save standalone besides the combined output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveBase {
    #[default]
    None,
    /// Only the first input frame
    First,
    /// Every input frame
    All,
    /// Every input frame plus debug artifacts (panorama only)
    AllPlusDebug,
}

impl SaveBase {
    /// Save-base policy for a batching mode under the given preferences
    pub fn for_mode(mode: CaptureMode, settings: &CaptureSettings) -> Self {
        match mode {
            CaptureMode::NoiseReduction => match settings.nr_save {
                NrSave::No => SaveBase::None,
                NrSave::Single => SaveBase::First,
                NrSave::All => SaveBase::All,
            },
            CaptureMode::Panorama => match settings.panorama_save {
                PanoramaSave::No => SaveBase::None,
                PanoramaSave::All => SaveBase::All,
                PanoramaSave::AllPlusDebug => SaveBase::AllPlusDebug,
            },
            CaptureMode::Hdr if settings.hdr_save_expo => SaveBase::All,
            CaptureMode::Hdr => SaveBase::None,
            CaptureMode::ExpoBracketing | CaptureMode::FocusBracketing => SaveBase::All,
            _ => SaveBase::None,
        }
    }
}

/// An exposure or focus bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub n_images: u32,
    /// Exposure separation; `None` for focus brackets
    pub stops: Option<f64>,
}

/// What one shutter press will produce
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePlan {
    /// Effective mode (video snapshots always shoot Standard)
    pub mode: CaptureMode,
    pub jpeg_count: u32,
    pub raw_count: u32,
    pub bracket: Option<Bracket>,
    pub process_type: ProcessType,
}

impl CapturePlan {
    /// Resolve the plan for the current preferences
    pub fn resolve(settings: &CaptureSettings, device: &DeviceCapabilities) -> Self {
        if settings.video_snapshot {
            return Self {
                mode: CaptureMode::Standard,
                jpeg_count: 1,
                raw_count: 0,
                bracket: None,
                process_type: ProcessType::Normal,
            };
        }

        let mode = if settings.mode.is_supported(device) {
            settings.mode
        } else {
            CaptureMode::Standard
        };

        let bracket = match mode {
            CaptureMode::Hdr => Some(Bracket {
                n_images: frames::HDR_IMAGES,
                stops: Some(frames::HDR_STOPS),
            }),
            CaptureMode::ExpoBracketing => Some(Bracket {
                n_images: settings.expo_bracketing_n_images.max(1),
                stops: Some(settings.expo_bracketing_stops),
            }),
            CaptureMode::FocusBracketing => Some(Bracket {
                n_images: settings.focus_bracketing_n_images.max(1),
                stops: None,
            }),
            _ => None,
        };

        let jpeg_count = match (mode, bracket) {
            (_, Some(bracket)) => bracket.n_images,
            (CaptureMode::FastBurst, _) => settings.fast_burst_n_images.max(1),
            (CaptureMode::NoiseReduction, _) => match settings.nr_mode {
                NrMode::Normal => frames::NR_DARK,
                NrMode::LowLight => frames::NR_DARK_LOW_LIGHT,
            },
            _ => 1,
        };

        // RAW-only still captures the JPEG, so the RAW count mirrors it
        let raw_enabled = device.supports_raw
            && settings.raw != RawPref::JpegOnly
            && mode.raw_allowed(settings, device);
        let raw_count = if raw_enabled { jpeg_count } else { 0 };

        Self {
            mode,
            jpeg_count,
            raw_count,
            bracket,
            process_type: mode.process_type(),
        }
    }

    /// Whether RAW output is part of this capture
    pub fn has_raw(&self) -> bool {
        self.raw_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: CaptureMode) -> CaptureSettings {
        CaptureSettings {
            mode,
            ..Default::default()
        }
    }

    #[test]
    fn test_hdr_forces_three_frames_two_stops() {
        let mut s = settings(CaptureMode::Hdr);
        s.expo_bracketing_n_images = 7;
        s.expo_bracketing_stops = 1.0;
        let plan = CapturePlan::resolve(&s, &DeviceCapabilities::default());
        assert_eq!(plan.jpeg_count, 3);
        assert_eq!(
            plan.bracket,
            Some(Bracket {
                n_images: 3,
                stops: Some(2.0)
            })
        );
        assert_eq!(plan.process_type, ProcessType::Hdr);
    }

    #[test]
    fn test_noise_reduction_frame_counts() {
        let mut s = settings(CaptureMode::NoiseReduction);
        let device = DeviceCapabilities::default();
        assert_eq!(CapturePlan::resolve(&s, &device).jpeg_count, frames::NR_DARK);
        s.nr_mode = NrMode::LowLight;
        assert_eq!(
            CapturePlan::resolve(&s, &device).jpeg_count,
            frames::NR_DARK_LOW_LIGHT
        );
    }

    #[test]
    fn test_raw_disallowed_for_panorama_and_extensions() {
        let device = DeviceCapabilities::default();
        for mode in [
            CaptureMode::Panorama,
            CaptureMode::NoiseReduction,
            CaptureMode::XNight,
        ] {
            let mut s = settings(mode);
            s.raw = RawPref::JpegDng;
            assert_eq!(CapturePlan::resolve(&s, &device).raw_count, 0, "{:?}", mode);
        }
    }

    #[test]
    fn test_raw_mirrors_jpeg_count_for_brackets() {
        let mut s = settings(CaptureMode::ExpoBracketing);
        s.raw = RawPref::RawOnly;
        s.expo_bracketing_n_images = 5;
        let plan = CapturePlan::resolve(&s, &DeviceCapabilities::default());
        assert_eq!(plan.jpeg_count, 5);
        assert_eq!(plan.raw_count, 5);
    }

    #[test]
    fn test_hdr_raw_needs_saved_exposures() {
        let mut s = settings(CaptureMode::Hdr);
        s.raw = RawPref::JpegDng;
        let device = DeviceCapabilities::default();
        assert_eq!(CapturePlan::resolve(&s, &device).raw_count, 0);
        s.hdr_save_expo = true;
        assert_eq!(CapturePlan::resolve(&s, &device).raw_count, 3);
    }

    #[test]
    fn test_video_snapshot_is_single_standard() {
        let mut s = settings(CaptureMode::FastBurst);
        s.video_snapshot = true;
        s.raw = RawPref::JpegDng;
        let plan = CapturePlan::resolve(&s, &DeviceCapabilities::default());
        assert_eq!(plan.mode, CaptureMode::Standard);
        assert_eq!((plan.jpeg_count, plan.raw_count), (1, 0));
    }

    #[test]
    fn test_unsupported_mode_falls_back_to_standard() {
        let device = DeviceCapabilities {
            supports_burst: false,
            ..Default::default()
        };
        let plan = CapturePlan::resolve(&settings(CaptureMode::FastBurst), &device);
        assert_eq!(plan.mode, CaptureMode::Standard);
        assert_eq!(plan.jpeg_count, 1);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fast-burst".parse::<CaptureMode>(), Ok(CaptureMode::FastBurst));
        assert_eq!("NR".parse::<CaptureMode>(), Ok(CaptureMode::NoiseReduction));
        assert!("sepia".parse::<CaptureMode>().is_err());
    }
}
