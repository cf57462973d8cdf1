use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("expected \"#rrggbb\", got {0:?}")]
    Malformed(String),
}

/// Linear RGB color with components in [0, 1].
///
/// Deserializes from a hex integer (`0x7f7f7f`), a `"#rrggbb"` string or an
/// `[r, g, b]` triple; serializes as the triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "[f32; 3]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Accepted on-disk spellings of a [`Color`].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ColorRepr {
    Hex(u32),
    Css(String),
    Rgb([f32; 3]),
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::rgb(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    pub fn parse(s: &str) -> Result<Self, ColorError> {
        let digits = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .ok_or_else(|| ColorError::Malformed(s.to_string()))?;
        if digits.len() != 6 {
            return Err(ColorError::Malformed(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Self::from_hex)
            .map_err(|_| ColorError::Malformed(s.to_string()))
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<u32> for Color {
    fn from(hex: u32) -> Self {
        Self::from_hex(hex)
    }
}

impl From<Color> for [f32; 3] {
    fn from(c: Color) -> Self {
        c.to_array()
    }
}

impl TryFrom<ColorRepr> for Color {
    type Error = ColorError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Hex(hex) => Ok(Self::from_hex(hex)),
            ColorRepr::Css(s) => Self::parse(&s),
            ColorRepr::Rgb([r, g, b]) => Ok(Self::rgb(r, g, b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_channels() {
        let c = Color::from_hex(0xff8000);
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.to_hex(), 0xff8000);
    }

    #[test]
    fn parse_css_and_reject_garbage() {
        assert_eq!(Color::parse("#7f7f7f").unwrap(), Color::from_hex(0x7f7f7f));
        assert_eq!(Color::parse("0x000000").unwrap(), Color::BLACK);
        assert!(matches!(Color::parse("7f7f7f"), Err(ColorError::Malformed(_))));
        assert!(Color::parse("#7f7f").is_err());
        assert!(Color::parse("#zzzzzz").is_err());
    }

    #[test]
    fn deserializes_every_representation() {
        let from_int: Color = serde_json::from_str("8355711").unwrap();
        let from_str: Color = serde_json::from_str("\"#7f7f7f\"").unwrap();
        let from_triple: Color = serde_json::from_str("[0.5, 0.25, 1.0]").unwrap();
        assert_eq!(from_int, Color::from_hex(0x7f7f7f));
        assert_eq!(from_str, from_int);
        assert_eq!(from_triple, Color::rgb(0.5, 0.25, 1.0));
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }

    #[test]
    fn serializes_as_triple() {
        let json = serde_json::to_string(&Color::WHITE).unwrap();
        assert_eq!(json, "[1.0,1.0,1.0]");
    }
}
