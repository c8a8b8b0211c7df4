//! Capture configuration
//!
//! Settings are chosen by the embedding application before activation and
//! are not switched at runtime. They load from TOML through the [`Config`]
//! trait and normalize contradictory combinations with fixed precedence
//! rules rather than runtime errors.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// How the foreground layer is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One capture pass; the foreground is extracted in-pass against a
    /// previously copied background color and depth.
    Single,
    /// Two HDR capture passes with clip-plane foreground isolation and
    /// eye-adaptation sharing.
    #[default]
    Multi,
    /// Two LDR capture passes; simpler than `Multi`, with optional
    /// transparency.
    Combo,
}

/// Where in the post-processing chain compositing work is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPoint {
    /// Before any post-processing runs
    PrePostProcess,
    /// After the tone-mapping stage
    #[default]
    AfterTonemap,
    /// After the anti-aliasing stage
    AfterFxaa,
}

/// What the capture passes read from the scene pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Tone-mapped 8-bit output
    FinalColor,
    /// Linear HDR scene color before tone mapping
    SceneColorHdr,
}

/// A fixed transform used in place of device-driven clip-plane placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebugClipPlane {
    /// World position, host units
    pub position: Vec3,
    /// Euler rotation (roll, pitch, yaw), degrees
    pub rotation_euler: Vec3,
    /// Non-uniform scale
    pub scale: Vec3,
}

/// A fixed camera pose used in place of the device's requested pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebugCamera {
    /// World position, host units
    pub position: Vec3,
    /// Euler rotation (roll, pitch, yaw), degrees
    pub rotation_euler: Vec3,
    /// Vertical field of view, degrees
    pub vertical_fov: f32,
}

fn default_true() -> bool {
    true
}

fn default_clip_plane_scale() -> Vec3 {
    Vec3::new(1.0, 50.0, 50.0)
}

fn default_near_clip() -> f32 {
    10.0
}

fn default_far_clip() -> f32 {
    1000.0
}

/// Full capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Foreground production strategy
    pub strategy: Strategy,
    /// Post-process injection point
    pub injection_point: InjectionPoint,
    /// Skip the foreground entirely and submit background only
    pub background_only: bool,
    /// Carry scene alpha through to the consumer (`Combo` only)
    pub transparency: bool,
    /// Copy the background pass's computed exposure onto the foreground
    /// pass so the two layers match (`Multi` only, best effort)
    #[serde(default = "default_true")]
    pub share_eye_adaptation: bool,
    /// What the capture passes read from the scene pipeline
    pub capture_source: CaptureSource,
    /// Base scale applied to clip-plane geometry before the device
    /// matrix's own scale
    #[serde(default = "default_clip_plane_scale")]
    pub clip_plane_scale: Vec3,
    /// Near clip distance for override projections, host units
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,
    /// Far clip distance for override projections, host units
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
    /// Fixed clip-plane transform replacing the device-driven one
    pub debug_clip_plane: Option<DebugClipPlane>,
    /// Fixed camera pose replacing the device-requested one
    pub debug_camera: Option<DebugCamera>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            injection_point: InjectionPoint::default(),
            background_only: false,
            transparency: false,
            share_eye_adaptation: true,
            capture_source: CaptureSource::SceneColorHdr,
            clip_plane_scale: default_clip_plane_scale(),
            near_clip: default_near_clip(),
            far_clip: default_far_clip(),
            debug_clip_plane: None,
            debug_camera: None,
        }
    }
}

impl Config for CaptureSettings {}

impl CaptureSettings {
    /// Resolve contradictory flag combinations with fixed precedence.
    ///
    /// Background-only wins over transparency. Transparency and HDR
    /// capture are `Combo` features; other strategies drop them. Degenerate
    /// clip distances are clamped.
    pub fn normalize(mut self) -> Self {
        if self.background_only && self.transparency {
            log::warn!("transparency disabled: background-only capture is set");
            self.transparency = false;
        }
        if self.transparency && self.strategy != Strategy::Combo {
            log::warn!(
                "transparency disabled: only supported by the combo strategy"
            );
            self.transparency = false;
        }
        if self.strategy == Strategy::Combo
            && self.capture_source == CaptureSource::SceneColorHdr
        {
            self.capture_source = CaptureSource::FinalColor;
        }
        if self.share_eye_adaptation && self.strategy != Strategy::Multi {
            self.share_eye_adaptation = false;
        }
        if self.near_clip <= 0.0 {
            self.near_clip = default_near_clip();
        }
        if self.far_clip <= self.near_clip {
            self.far_clip = self.near_clip + default_far_clip();
        }
        self
    }

    /// Whether a separate foreground pass exists at all.
    pub fn wants_foreground(&self) -> bool {
        !self.background_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_only_wins_over_transparency() {
        let settings = CaptureSettings {
            strategy: Strategy::Combo,
            background_only: true,
            transparency: true,
            ..CaptureSettings::default()
        }
        .normalize();
        assert!(settings.background_only);
        assert!(!settings.transparency);
    }

    #[test]
    fn transparency_requires_combo() {
        let settings = CaptureSettings {
            strategy: Strategy::Multi,
            transparency: true,
            ..CaptureSettings::default()
        }
        .normalize();
        assert!(!settings.transparency);
    }

    #[test]
    fn eye_adaptation_sharing_is_multi_only() {
        let settings = CaptureSettings {
            strategy: Strategy::Single,
            share_eye_adaptation: true,
            ..CaptureSettings::default()
        }
        .normalize();
        assert!(!settings.share_eye_adaptation);
    }

    #[test]
    fn degenerate_clip_distances_are_clamped() {
        let settings = CaptureSettings {
            near_clip: -5.0,
            far_clip: 0.0,
            ..CaptureSettings::default()
        }
        .normalize();
        assert!(settings.near_clip > 0.0);
        assert!(settings.far_clip > settings.near_clip);
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = CaptureSettings {
            strategy: Strategy::Combo,
            injection_point: InjectionPoint::AfterFxaa,
            transparency: true,
            ..CaptureSettings::default()
        };
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: CaptureSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
