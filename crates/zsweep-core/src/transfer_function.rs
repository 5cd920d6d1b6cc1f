//! Scalar-to-opacity and scalar-to-color transfer functions.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::time_stamp::TimeStamp;

/// A control point of a [`PiecewiseFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseNode {
    pub x: f64,
    pub y: f64,
}

/// A piecewise-linear scalar function, clamped to its end values outside its range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiecewiseFunction {
    nodes: Vec<PiecewiseNode>,
    #[serde(skip)]
    mtime: TimeStamp,
}

impl PiecewiseFunction {
    /// Creates an empty function. An empty function evaluates to zero.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            mtime: TimeStamp::now(),
        }
    }

    /// Creates a function from `(x, y)` pairs in any order.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut function = Self::new();
        for (x, y) in points {
            function.add_point(x, y);
        }
        function
    }

    /// Adds a control point, replacing any point at the same abscissa.
    pub fn add_point(&mut self, x: f64, y: f64) {
        let node = PiecewiseNode { x, y };
        match self.nodes.binary_search_by(|n| n.x.total_cmp(&x)) {
            Ok(i) => self.nodes[i] = node,
            Err(i) => self.nodes.insert(i, node),
        }
        self.mtime.modified();
    }

    /// Removes the control point at `x`. Returns whether one was removed.
    pub fn remove_point(&mut self, x: f64) -> bool {
        if let Ok(i) = self.nodes.binary_search_by(|n| n.x.total_cmp(&x)) {
            self.nodes.remove(i);
            self.mtime.modified();
            true
        } else {
            false
        }
    }

    /// Removes all control points.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.mtime.modified();
    }

    /// Control points sorted by abscissa.
    pub fn nodes(&self) -> &[PiecewiseNode] {
        &self.nodes
    }

    /// Abscissa range covered by the control points.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.nodes.first()?.x, self.nodes.last()?.x))
    }

    /// Evaluates the function at `x`.
    pub fn value(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.nodes.first(), self.nodes.last()) else {
            return 0.0;
        };
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        let i = self.nodes.partition_point(|n| n.x <= x);
        let (a, b) = (self.nodes[i - 1], self.nodes[i]);
        let t = (x - a.x) / (b.x - a.x);
        a.y + (b.y - a.y) * t
    }

    /// Modification time.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

/// Color space in which a [`ColorTransferFunction`] interpolates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorSpace {
    /// Component-wise RGB interpolation.
    #[default]
    Rgb,
    /// HSV interpolation along the direct hue path.
    Hsv,
    /// HSV interpolation along the shorter hue path, crossing the red seam if needed.
    HsvWrap,
}

/// A control point of a [`ColorTransferFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorNode {
    pub x: f64,
    pub rgb: DVec3,
}

/// A piecewise scalar-to-RGB function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorTransferFunction {
    nodes: Vec<ColorNode>,
    color_space: ColorSpace,
    #[serde(skip)]
    mtime: TimeStamp,
}

impl ColorTransferFunction {
    /// Creates an empty function. An empty function evaluates to black.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            color_space: ColorSpace::Rgb,
            mtime: TimeStamp::now(),
        }
    }

    /// Adds an RGB control point, replacing any point at the same abscissa.
    pub fn add_rgb_point(&mut self, x: f64, rgb: DVec3) {
        let node = ColorNode { x, rgb };
        match self.nodes.binary_search_by(|n| n.x.total_cmp(&x)) {
            Ok(i) => self.nodes[i] = node,
            Err(i) => self.nodes.insert(i, node),
        }
        self.mtime.modified();
    }

    /// Adds an HSV control point (all channels in `[0, 1]`).
    pub fn add_hsv_point(&mut self, x: f64, hsv: DVec3) {
        self.add_rgb_point(x, hsv_to_rgb(hsv));
    }

    /// Removes all control points.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.mtime.modified();
    }

    /// Sets the interpolation color space.
    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space;
        self.mtime.modified();
    }

    /// Sets the interpolation color space.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.set_color_space(color_space);
        self
    }

    /// Interpolation color space.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Control points sorted by abscissa.
    pub fn nodes(&self) -> &[ColorNode] {
        &self.nodes
    }

    /// Abscissa range covered by the control points.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.nodes.first()?.x, self.nodes.last()?.x))
    }

    /// Evaluates the function at `x`.
    pub fn color(&self, x: f64) -> DVec3 {
        let (Some(first), Some(last)) = (self.nodes.first(), self.nodes.last()) else {
            return DVec3::ZERO;
        };
        if x <= first.x {
            return first.rgb;
        }
        if x >= last.x {
            return last.rgb;
        }
        let i = self.nodes.partition_point(|n| n.x <= x);
        let (a, b) = (self.nodes[i - 1], self.nodes[i]);
        let t = (x - a.x) / (b.x - a.x);
        match self.hue_path(i - 1) {
            None => a.rgb.lerp(b.rgb, t),
            Some((h0, h1)) => {
                let hsv0 = rgb_to_hsv(a.rgb);
                let hsv1 = rgb_to_hsv(b.rgb);
                let h = (h0 + (h1 - h0) * t).rem_euclid(1.0);
                let s = hsv0.y + (hsv1.y - hsv0.y) * t;
                let v = hsv0.z + (hsv1.z - hsv0.z) * t;
                hsv_to_rgb(DVec3::new(h, s, v))
            }
        }
    }

    /// Hues at both ends of the segment between nodes `segment` and
    /// `segment + 1`, for HSV color spaces.
    ///
    /// The second hue is unwrapped so that linear interpolation between the
    /// two follows the path the function takes; it may leave `[0, 1]`.
    /// Returns `None` in RGB space or for an out-of-range segment.
    pub fn hue_path(&self, segment: usize) -> Option<(f64, f64)> {
        if self.color_space == ColorSpace::Rgb || segment + 1 >= self.nodes.len() {
            return None;
        }
        let hsv0 = rgb_to_hsv(self.nodes[segment].rgb);
        let hsv1 = rgb_to_hsv(self.nodes[segment + 1].rgb);
        let (mut h0, mut h1) = (hsv0.x, hsv1.x);
        // Achromatic ends have no hue of their own.
        if hsv0.y == 0.0 {
            h0 = h1;
        }
        if hsv1.y == 0.0 {
            h1 = h0;
        }
        if self.color_space == ColorSpace::HsvWrap {
            if h1 - h0 > 0.5 {
                h1 -= 1.0;
            } else if h0 - h1 > 0.5 {
                h1 += 1.0;
            }
        }
        Some((h0, h1))
    }

    /// Modification time.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

/// Converts RGB to HSV, all channels in `[0, 1]`.
pub fn rgb_to_hsv(rgb: DVec3) -> DVec3 {
    let max = rgb.max_element();
    let min = rgb.min_element();
    let delta = max - min;
    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    if delta <= 0.0 {
        return DVec3::new(0.0, s, v);
    }
    let h = if rgb.x == max {
        (rgb.y - rgb.z) / delta
    } else if rgb.y == max {
        2.0 + (rgb.z - rgb.x) / delta
    } else {
        4.0 + (rgb.x - rgb.y) / delta
    };
    DVec3::new((h / 6.0).rem_euclid(1.0), s, v)
}

/// Converts HSV to RGB, all channels in `[0, 1]`.
pub fn hsv_to_rgb(hsv: DVec3) -> DVec3 {
    let (h, s, v) = (hsv.x.rem_euclid(1.0) * 6.0, hsv.y, hsv.z);
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = h.floor() as u32 % 6;
    match sector {
        0 => DVec3::new(v, t, p),
        1 => DVec3::new(q, v, p),
        2 => DVec3::new(p, v, t),
        3 => DVec3::new(p, q, v),
        4 => DVec3::new(t, p, v),
        _ => DVec3::new(v, p, q),
    }
}
