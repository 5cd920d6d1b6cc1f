//! Built-in color transfer functions for volume renders.
//!
//! A preset is a list of control points over `[0, 1]` plus the color space
//! they interpolate in. [`ColorTransferFunction::from_preset`] stretches the
//! points over a scalar range.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::transfer_function::{ColorSpace, ColorTransferFunction};

/// Named color ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorPreset {
    /// Perceptually uniform dark violet to yellow.
    Viridis,
    /// Diverging blue to red through light gray.
    CoolWarm,
    /// Black through red and yellow to white.
    BlackBody,
    /// Blue to red along the HSV hue circle.
    Rainbow,
    /// Black to white.
    Grayscale,
}

impl ColorPreset {
    /// Every preset, in declaration order.
    pub const ALL: [ColorPreset; 5] = [
        ColorPreset::Viridis,
        ColorPreset::CoolWarm,
        ColorPreset::BlackBody,
        ColorPreset::Rainbow,
        ColorPreset::Grayscale,
    ];

    /// Lowercase name of the preset.
    pub fn name(self) -> &'static str {
        match self {
            ColorPreset::Viridis => "viridis",
            ColorPreset::CoolWarm => "coolwarm",
            ColorPreset::BlackBody => "blackbody",
            ColorPreset::Rainbow => "rainbow",
            ColorPreset::Grayscale => "grayscale",
        }
    }

    /// Looks a preset up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    /// Control points `(t, [r, g, b])` with `t` ascending over `[0, 1]`.
    pub fn control_points(self) -> &'static [(f64, [f64; 3])] {
        match self {
            ColorPreset::Viridis => &[
                (0.0, [0.267, 0.005, 0.329]),
                (0.25, [0.229, 0.322, 0.546]),
                (0.5, [0.128, 0.567, 0.551]),
                (0.75, [0.369, 0.789, 0.383]),
                (1.0, [0.993, 0.906, 0.144]),
            ],
            ColorPreset::CoolWarm => &[
                (0.0, [0.230, 0.299, 0.754]),
                (0.5, [0.865, 0.865, 0.865]),
                (1.0, [0.706, 0.016, 0.150]),
            ],
            ColorPreset::BlackBody => &[
                (0.0, [0.0, 0.0, 0.0]),
                (0.39, [0.9, 0.2, 0.15]),
                (0.58, [0.9, 0.5, 0.1]),
                (0.84, [0.9, 0.9, 0.2]),
                (1.0, [1.0, 1.0, 1.0]),
            ],
            ColorPreset::Rainbow => &[(0.0, [0.0, 0.0, 1.0]), (1.0, [1.0, 0.0, 0.0])],
            ColorPreset::Grayscale => &[(0.0, [0.0, 0.0, 0.0]), (1.0, [1.0, 1.0, 1.0])],
        }
    }

    /// Color space the control points interpolate in.
    pub fn color_space(self) -> ColorSpace {
        match self {
            ColorPreset::Rainbow => ColorSpace::Hsv,
            _ => ColorSpace::Rgb,
        }
    }
}

impl ColorTransferFunction {
    /// Builds a function from `preset`, stretched over `range`.
    pub fn from_preset(preset: ColorPreset, range: (f64, f64)) -> Self {
        let mut function = Self::new().with_color_space(preset.color_space());
        for &(t, [r, g, b]) in preset.control_points() {
            function.add_rgb_point(range.0 + (range.1 - range.0) * t, DVec3::new(r, g, b));
        }
        function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for preset in ColorPreset::ALL {
            assert_eq!(ColorPreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(ColorPreset::from_name("CoolWarm"), Some(ColorPreset::CoolWarm));
        assert_eq!(ColorPreset::from_name("jet"), None);
    }

    #[test]
    fn test_control_points_span_unit_interval() {
        for preset in ColorPreset::ALL {
            let points = preset.control_points();
            assert_eq!(points.first().map(|p| p.0), Some(0.0));
            assert_eq!(points.last().map(|p| p.0), Some(1.0));
            assert!(points.windows(2).all(|w| w[0].0 < w[1].0), "{preset:?}");
        }
    }

    #[test]
    fn test_from_preset_stretches_range() {
        let f = ColorTransferFunction::from_preset(ColorPreset::Grayscale, (10.0, 20.0));
        assert_eq!(f.range(), Some((10.0, 20.0)));
        assert!((f.color(15.0) - DVec3::splat(0.5)).length() < 1e-12);

        let blackbody = ColorTransferFunction::from_preset(ColorPreset::BlackBody, (0.0, 100.0));
        assert_eq!(blackbody.nodes().len(), 5);
        assert!((blackbody.nodes()[1].x - 39.0).abs() < 1e-9);
    }

    #[test]
    fn test_rainbow_passes_through_green() {
        let f = ColorTransferFunction::from_preset(ColorPreset::Rainbow, (0.0, 1.0));
        assert_eq!(f.color_space(), ColorSpace::Hsv);
        let mid = f.color(0.5);
        assert!(mid.y > 0.99 && mid.x < 0.01 && mid.z < 0.01, "{mid:?}");
    }
}
