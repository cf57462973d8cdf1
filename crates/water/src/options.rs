//! Construction options for a [`Water`](crate::Water) surface.
//!
//! Every field is optional in a config file; missing ones take the defaults
//! below. Files are YAML (`.yaml`/`.yml`) or JSON (`.json`).

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use waterglass_common::Color;
use waterglass_reflect::{ReflectorConfig, TargetFormat};

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config extension {0:?} (expected yaml, yml or json)")]
    UnsupportedExtension(String),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which faces of the water mesh are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaterOptions {
    pub texture_width: u32,
    pub texture_height: u32,
    pub clip_bias: f32,
    pub format: TargetFormat,
    pub alpha: f32,
    /// Starting value of the time uniform.
    pub time: f32,
    /// World-space scale of the normal-noise lookup.
    pub size: f32,
    /// Carried to the uniform block; the output color does not read it.
    pub water_color: Color,
    pub eye: Vec3,
    pub distortion_scale: f32,
    pub side: Side,
    pub fog: bool,
    pub fx_distortion_factor: f32,
    pub fx_display_color_alpha: f32,
    pub fx_mix_color: Color,
}

impl Default for WaterOptions {
    fn default() -> Self {
        Self {
            texture_width: 512,
            texture_height: 512,
            clip_bias: 0.0,
            format: TargetFormat::Rgba16Float,
            alpha: 1.0,
            time: 0.0,
            size: 1.0,
            water_color: Color::from_hex(0x7f7f7f),
            eye: Vec3::ZERO,
            distortion_scale: 20.0,
            side: Side::Front,
            fog: true,
            fx_distortion_factor: 1.0,
            fx_display_color_alpha: 0.0,
            fx_mix_color: Color::BLACK,
        }
    }
}

impl WaterOptions {
    /// Load options from a YAML or JSON file, picked by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path)?;
        let options: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            _ => return Err(OptionsError::UnsupportedExtension(ext)),
        };
        options.validate()?;
        tracing::debug!(path = %path.display(), "water options loaded");
        Ok(options)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_yaml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_yaml_string(&self) -> Result<String, OptionsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.texture_width == 0 || self.texture_height == 0 {
            let field = if self.texture_width == 0 {
                "texture_width"
            } else {
                "texture_height"
            };
            return Err(invalid(
                field,
                format!(
                    "target must be at least 1x1, got {}x{}",
                    self.texture_width, self.texture_height
                ),
            ));
        }
        let scalars = [
            ("clip_bias", self.clip_bias),
            ("alpha", self.alpha),
            ("time", self.time),
            ("size", self.size),
            ("distortion_scale", self.distortion_scale),
            ("fx_distortion_factor", self.fx_distortion_factor),
            ("fx_display_color_alpha", self.fx_display_color_alpha),
        ];
        for (field, value) in scalars {
            if !value.is_finite() {
                return Err(invalid(field, format!("{value} is not finite")));
            }
        }
        if !self.eye.is_finite() {
            return Err(invalid("eye", format!("{} is not finite", self.eye)));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid("alpha", format!("{} is outside [0, 1]", self.alpha)));
        }
        Ok(())
    }

    /// The subset the reflection surface needs.
    pub fn reflector(&self) -> ReflectorConfig {
        ReflectorConfig {
            texture_width: self.texture_width,
            texture_height: self.texture_height,
            clip_bias: self.clip_bias,
            format: self.format,
        }
    }
}

fn invalid(field: &'static str, reason: String) -> OptionsError {
    OptionsError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_documented_values() {
        let o = WaterOptions::default();
        assert_eq!((o.texture_width, o.texture_height), (512, 512));
        assert_eq!(o.clip_bias, 0.0);
        assert_eq!(o.alpha, 1.0);
        assert_eq!(o.water_color.to_hex(), 0x7f7f7f);
        assert_eq!(o.distortion_scale, 20.0);
        assert_eq!(o.side, Side::Front);
        assert!(o.fog);
        assert_eq!(o.fx_distortion_factor, 1.0);
        assert_eq!(o.fx_display_color_alpha, 0.0);
        assert_eq!(o.fx_mix_color, Color::BLACK);
        assert_eq!(o.eye, Vec3::ZERO);
        assert_eq!(o.size, 1.0);
    }

    #[test]
    fn loads_partial_yaml_with_color_spellings() {
        let file = write_temp(
            ".yaml",
            "texture_width: 256\ntexture_height: 256\ndistortion_scale: 4\nwater_color: 0\nfx_mix_color: \"#ff0000\"\nside: double\n",
        );
        let o = WaterOptions::load(file.path()).unwrap();
        assert_eq!(o.texture_width, 256);
        assert_eq!(o.distortion_scale, 4.0);
        assert_eq!(o.water_color, Color::BLACK);
        assert_eq!(o.fx_mix_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(o.side, Side::Double);
        assert_eq!(o.alpha, 1.0);
    }

    #[test]
    fn loads_json() {
        let file = write_temp(".json", r#"{ "alpha": 0.5, "water_color": [0.1, 0.2, 0.3] }"#);
        let o = WaterOptions::load(file.path()).unwrap();
        assert_eq!(o.alpha, 0.5);
        assert_eq!(o.water_color, Color::rgb(0.1, 0.2, 0.3));
    }

    #[test]
    fn unknown_fields_and_extensions_are_rejected() {
        let file = write_temp(".yaml", "distortion: 3\n");
        assert!(matches!(WaterOptions::load(file.path()), Err(OptionsError::Yaml(_))));

        let file = write_temp(".toml", "alpha = 1.0\n");
        assert!(matches!(
            WaterOptions::load(file.path()),
            Err(OptionsError::UnsupportedExtension(ext)) if ext == "toml"
        ));
    }

    #[test]
    fn validation_catches_bad_values() {
        let err = WaterOptions::from_yaml_str("alpha: 1.5\n").unwrap_err();
        assert!(matches!(err, OptionsError::Invalid { field: "alpha", .. }));

        let err = WaterOptions::from_yaml_str("texture_height: 0\n").unwrap_err();
        assert!(matches!(err, OptionsError::Invalid { field: "texture_height", .. }));

        let bad = WaterOptions {
            distortion_scale: f32::NAN,
            ..WaterOptions::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(OptionsError::Invalid { field: "distortion_scale", .. })
        ));
    }

    #[test]
    fn yaml_output_loads_back() {
        let o = WaterOptions {
            distortion_scale: 4.0,
            fx_mix_color: Color::from_hex(0x00ff00),
            ..WaterOptions::default()
        };
        let text = o.to_yaml_string().unwrap();
        assert_eq!(WaterOptions::from_yaml_str(&text).unwrap(), o);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WaterOptions::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, OptionsError::Io(_)));
    }
}
