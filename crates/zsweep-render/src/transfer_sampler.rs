//! Piecewise-linear sampling of a component's transfer functions.
//!
//! Integrators work on a flat table of control points carrying
//! `[r, g, b, attenuation]`, with attenuation already divided by the unit
//! distance. Between control points everything varies linearly in the scalar,
//! which is what lets the linear integrators split a segment only where it
//! crosses a control point.

use zsweep_core::{ComponentColor, ComponentProperty, TimeStamp, VolumeProperty, MAX_COMPONENTS};
use zsweep_structures::ScalarInfo;

/// Sampled transfer functions of one component.
#[derive(Debug, Clone, Default)]
pub struct SampledFunction {
    positions: Vec<f64>,
    values: Vec<[f64; 4]>,
}

impl SampledFunction {
    /// Samples `component` at the union of its control points.
    ///
    /// Extra points are inserted where an HSV color function crosses a hue
    /// sector or the hue seam. When the functions have fewer than two points,
    /// the ends of `range` are used; an empty range is widened to width 1.
    pub fn build(component: &ComponentProperty, range: (f64, f64)) -> Self {
        let mut positions: Vec<f64> = component
            .scalar_opacity
            .nodes()
            .iter()
            .map(|n| n.x)
            .chain(component.color.node_positions())
            .collect();
        if let ComponentColor::Rgb(color) = &component.color {
            let nodes = color.nodes();
            for segment in 0..nodes.len().saturating_sub(1) {
                let Some((h0, h1)) = color.hue_path(segment) else {
                    continue;
                };
                let (x0, x1) = (nodes[segment].x, nodes[segment + 1].x);
                positions.extend(
                    hue_boundaries(h0, h1).map(|t| x0 + (x1 - x0) * t),
                );
            }
        }
        positions.retain(|x| x.is_finite());
        positions.sort_by(f64::total_cmp);
        positions.dedup();
        if positions.len() < 2 {
            let (lo, hi) = widen(range);
            positions.push(lo);
            positions.push(hi);
            positions.sort_by(f64::total_cmp);
            positions.dedup();
        }

        let unit_distance = component.unit_distance();
        let values = positions
            .iter()
            .map(|&x| {
                let rgb = component.color.rgb(x);
                let attenuation = component.scalar_opacity.value(x).max(0.0) / unit_distance;
                [rgb.x, rgb.y, rgb.z, attenuation]
            })
            .collect();
        Self { positions, values }
    }

    /// Control point abscissas, ascending.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// `[r, g, b, attenuation]` at `x`, clamped to the end points outside the table.
    pub fn sample(&self, x: f64) -> [f64; 4] {
        let (Some(&first), Some(&last)) = (self.positions.first(), self.positions.last()) else {
            return [0.0; 4];
        };
        if x <= first {
            return self.values[0];
        }
        if x >= last {
            return self.values[self.values.len() - 1];
        }
        let i = self.positions.partition_point(|&p| p <= x);
        let t = (x - self.positions[i - 1]) / (self.positions[i] - self.positions[i - 1]);
        let (a, b) = (self.values[i - 1], self.values[i]);
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
            a[3] + (b[3] - a[3]) * t,
        ]
    }

    /// Control points strictly between `a` and `b`, in either order.
    pub fn positions_between(&self, a: f64, b: f64) -> impl Iterator<Item = f64> + '_ {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let start = self.positions.partition_point(|&p| p <= lo);
        self.positions[start..]
            .iter()
            .copied()
            .take_while(move |&p| p < hi)
    }
}

/// Widens an empty (or inverted) range to width 1.
pub fn widen(range: (f64, f64)) -> (f64, f64) {
    if range.1 > range.0 {
        range
    } else {
        (range.0, range.0 + 1.0)
    }
}

/// Parameters in `(0, 1)` where a hue path `h0 -> h1` crosses a multiple of 1/6.
fn hue_boundaries(h0: f64, h1: f64) -> impl Iterator<Item = f64> {
    let (lo, hi) = if h0 <= h1 { (h0, h1) } else { (h1, h0) };
    #[allow(clippy::cast_possible_truncation)]
    let (first, last) = ((lo * 6.0).floor() as i64 + 1, (hi * 6.0).ceil() as i64 - 1);
    (first..=last).filter_map(move |k| {
        let t = (k as f64 / 6.0 - h0) / (h1 - h0);
        (t > 0.0 && t < 1.0).then_some(t)
    })
}

/// Per-component sampled functions, rebuilt only when their inputs change.
#[derive(Debug, Clone, Default)]
pub struct TransferSampler {
    functions: Vec<SampledFunction>,
    built_from: Option<(TimeStamp, ScalarInfo)>,
}

impl TransferSampler {
    /// Creates an empty sampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resamples `property` for the components described by `scalars` unless
    /// the cached tables were built from the same inputs. Returns whether it
    /// rebuilt.
    pub fn update(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> bool {
        if let Some((mtime, info)) = &self.built_from {
            if *mtime == property.mtime() && info == scalars {
                return false;
            }
        }
        let components = scalars.num_components().clamp(1, MAX_COMPONENTS);
        self.functions = (0..components)
            .map(|c| SampledFunction::build(property.component(c), scalars.range(c)))
            .collect();
        self.built_from = Some((property.mtime(), scalars.clone()));
        log::debug!("transfer functions sampled for {components} component(s)");
        true
    }

    /// Sampled functions of `component`.
    pub fn function(&self, component: usize) -> &SampledFunction {
        &self.functions[component.min(self.functions.len().saturating_sub(1))]
    }

    /// Number of sampled components.
    pub fn num_components(&self) -> usize {
        self.functions.len()
    }
}
