//! Ray segment integrators.
//!
//! An integrator turns a batch of segments, each described by its length and
//! the scalars at its near and far ends, into color and opacity, compositing
//! each segment under the color accumulated so far. Opacity follows
//! `1 - exp(-attenuation * length)` with attenuation already divided by the
//! unit distance.

mod homogeneous;
mod linear;
mod partial;
mod preintegration;
pub mod psi;

pub use homogeneous::HomogeneousIntegrator;
pub use linear::LinearIntegrator;
pub use partial::{PartialPreIntegrator, PsiTable, PSI_TABLE_SIZE};
pub use preintegration::PreIntegrator;

use zsweep_core::{IntegratorKind, PreIntegrationConfig, Result, VolumeProperty};
use zsweep_structures::ScalarInfo;

use crate::transfer_sampler::TransferSampler;

/// Computes the color of ray segments through a volume.
pub trait RayIntegrator: Send {
    /// Prepares tables for `property` and scalars described by `scalars`.
    ///
    /// Cheap when neither changed since the last call.
    fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> Result<()>;

    /// Integrates `lengths.len()` segments in order, compositing each under
    /// `color`. `near` and `far` hold one tuple per segment.
    fn integrate(&self, lengths: &[f64], near: &[f64], far: &[f64], color: &mut [f32; 4]);

    /// Longest segment `integrate` will be handed, in world units. Only
    /// table-driven integrators care; call before `initialize`.
    fn set_max_segment_length(&mut self, _length: f64) {}

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Composites `segment` under `color`: `color += (1 - color.a) * segment`.
pub fn composite_under(color: &mut [f32; 4], segment: [f64; 4]) {
    let remaining = 1.0 - f64::from(color[3]);
    for (c, s) in color.iter_mut().zip(segment) {
        #[allow(clippy::cast_possible_truncation)]
        let blended = (f64::from(*c) + remaining * s) as f32;
        *c = blended;
    }
}

/// Composites `segment` over `color`: `color = segment + (1 - segment.a) * color`.
pub fn composite_over(color: &mut [f32; 4], segment: [f64; 4]) {
    let remaining = 1.0 - segment[3];
    for (c, s) in color.iter_mut().zip(segment) {
        #[allow(clippy::cast_possible_truncation)]
        let blended = (s + remaining * f64::from(*c)) as f32;
        *c = blended;
    }
}

/// Picks the integrator for [`IntegratorKind::Auto`]: cell scalars are
/// constant per cell, independent components favor the full table, anything
/// else the partial one.
pub fn resolve_kind(kind: IntegratorKind, cell_scalars: bool, independent: bool) -> IntegratorKind {
    match kind {
        IntegratorKind::Auto if cell_scalars => IntegratorKind::Homogeneous,
        IntegratorKind::Auto if independent => IntegratorKind::PreIntegration,
        IntegratorKind::Auto => IntegratorKind::PartialPreIntegration,
        explicit => explicit,
    }
}

/// Creates an integrator of a resolved kind.
pub fn create_integrator(kind: IntegratorKind, config: PreIntegrationConfig) -> Box<dyn RayIntegrator> {
    match kind {
        IntegratorKind::Linear => Box::new(LinearIntegrator::new()),
        IntegratorKind::PreIntegration => Box::new(PreIntegrator::with_config(config)),
        IntegratorKind::Homogeneous => Box::new(HomogeneousIntegrator::new()),
        IntegratorKind::Auto | IntegratorKind::PartialPreIntegration => {
            Box::new(PartialPreIntegrator::new())
        }
    }
}

/// How the tuples handed to an integrator map to color and attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TupleLayout {
    /// Each component goes through its own transfer functions.
    Independent(usize),
    /// `(intensity, opacity)` pairs.
    IntensityOpacity,
    /// `(r, g, b, opacity)` quadruples.
    Rgba,
}

impl TupleLayout {
    pub(crate) fn of(property: &VolumeProperty, scalars: &ScalarInfo) -> Self {
        match (property.independent_components(), scalars.num_components()) {
            (false, 2) => TupleLayout::IntensityOpacity,
            (false, 4) => TupleLayout::Rgba,
            (_, n) => TupleLayout::Independent(n.max(1)),
        }
    }

    pub(crate) fn tuple_size(self) -> usize {
        match self {
            TupleLayout::Independent(n) => n,
            TupleLayout::IntensityOpacity => 2,
            TupleLayout::Rgba => 4,
        }
    }
}

/// Shared state of the integrators that split segments at control points.
#[derive(Debug, Clone)]
pub(crate) struct PiecewiseCore {
    pub(crate) sampler: TransferSampler,
    pub(crate) layout: TupleLayout,
    unit_distance: f64,
}

impl Default for PiecewiseCore {
    fn default() -> Self {
        Self {
            sampler: TransferSampler::new(),
            layout: TupleLayout::Independent(1),
            unit_distance: 1.0,
        }
    }
}

impl PiecewiseCore {
    pub(crate) fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) {
        self.layout = TupleLayout::of(property, scalars);
        self.unit_distance = property.component(0).unit_distance();
        self.sampler.update(property, scalars);
    }

    /// Attenuation-weighted mix of every component at parameter `t` of a
    /// segment running from `front` to `back`.
    pub(crate) fn mix(&self, front: &[f64], back: &[f64], t: f64) -> [f64; 4] {
        let mut rgb = [0.0; 3];
        let mut plain = [0.0; 3];
        let mut tau = 0.0;
        for (c, (&f, &b)) in front.iter().zip(back).enumerate() {
            let v = self.sampler.function(c).sample(f + (b - f) * t);
            for i in 0..3 {
                rgb[i] += v[3] * v[i];
                plain[i] += v[i];
            }
            tau += v[3];
        }
        if front.len() == 1 {
            return [plain[0], plain[1], plain[2], tau];
        }
        if tau > 0.0 {
            [rgb[0] / tau, rgb[1] / tau, rgb[2] / tau, tau]
        } else {
            let n = front.len() as f64;
            [plain[0] / n, plain[1] / n, plain[2] / n, 0.0]
        }
    }

    pub(crate) fn literal(&self, tuple: &[f64]) -> [f64; 4] {
        match self.layout {
            TupleLayout::IntensityOpacity => [
                tuple[0],
                tuple[0],
                tuple[0],
                tuple[1].max(0.0) / self.unit_distance,
            ],
            _ => [
                tuple[0],
                tuple[1],
                tuple[2],
                tuple[3].max(0.0) / self.unit_distance,
            ],
        }
    }

    /// Integrates segments, splitting each where any component crosses a
    /// control point and evaluating `psi_of(length, tau_front, tau_back)` per piece.
    pub(crate) fn integrate<P>(
        &self,
        psi_of: P,
        lengths: &[f64],
        near: &[f64],
        far: &[f64],
        color: &mut [f32; 4],
    ) where
        P: Fn(f64, f64, f64) -> f64,
    {
        let n = self.layout.tuple_size();
        let mut cuts: Vec<f64> = Vec::with_capacity(16);
        for (i, &length) in lengths.iter().enumerate() {
            let front = &near[i * n..(i + 1) * n];
            let back = &far[i * n..(i + 1) * n];

            if !matches!(self.layout, TupleLayout::Independent(_)) {
                let (f, b) = (self.literal(front), self.literal(back));
                let segment = psi::integrate_linear_segment(length, f, b, psi_of(length, f[3], b[3]));
                composite_under(color, segment);
                continue;
            }

            cuts.clear();
            cuts.push(0.0);
            for (c, (&s0, &s1)) in front.iter().zip(back).enumerate() {
                if s0 != s1 {
                    cuts.extend(
                        self.sampler
                            .function(c)
                            .positions_between(s0, s1)
                            .map(|x| (x - s0) / (s1 - s0)),
                    );
                }
            }
            cuts.push(1.0);
            cuts.sort_by(f64::total_cmp);
            cuts.dedup();

            let mut previous = self.mix(front, back, 0.0);
            for pair in cuts.windows(2) {
                let next = self.mix(front, back, pair[1]);
                let piece = length * (pair[1] - pair[0]);
                if piece > 0.0 {
                    let segment = psi::integrate_linear_segment(
                        piece,
                        previous,
                        next,
                        psi_of(piece, previous[3], next[3]),
                    );
                    composite_under(color, segment);
                }
                previous = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use proptest::prelude::*;
    use zsweep_core::{ColorTransferFunction, PiecewiseFunction};

    fn transparent_property() -> VolumeProperty {
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::new(0.1, 0.2, 0.9));
        color.add_rgb_point(1.0, DVec3::new(1.0, 0.6, 0.0));
        VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, 0.0), (0.5, 0.0), (1.0, 0.0)]),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn zero_opacity_leaves_color_untouched(
            segments in prop::collection::vec((0.0f64..4.0, -0.5f64..1.5, -0.5f64..1.5), 1..6),
            start in prop::array::uniform4(0.0f32..1.0),
        ) {
            let property = transparent_property();
            let info = ScalarInfo::new(vec![(0.0, 1.0)]);
            let lengths: Vec<f64> = segments.iter().map(|s| s.0).collect();
            let near: Vec<f64> = segments.iter().map(|s| s.1).collect();
            let far: Vec<f64> = segments.iter().map(|s| s.2).collect();
            let config = PreIntegrationConfig::default().with_resolution(16, 16);

            for kind in [
                IntegratorKind::Linear,
                IntegratorKind::PartialPreIntegration,
                IntegratorKind::PreIntegration,
                IntegratorKind::Homogeneous,
            ] {
                let mut integrator = create_integrator(kind, config);
                integrator.set_max_segment_length(1.5);
                integrator.initialize(&property, &info).unwrap();
                let mut color = start;
                integrator.integrate(&lengths, &near, &far, &mut color);
                prop_assert_eq!(
                    color.map(f32::to_bits),
                    start.map(f32::to_bits),
                    "{}", integrator.name()
                );
            }
        }
    }

    #[test]
    fn test_composite_under_and_over() {
        let mut under = [0.5f32, 0.0, 0.0, 0.5];
        composite_under(&mut under, [0.0, 0.4, 0.0, 0.4]);
        assert_eq!(under, [0.5, 0.2, 0.0, 0.7]);

        let mut over = [0.0f32, 0.4, 0.0, 0.4];
        composite_over(&mut over, [0.5, 0.0, 0.0, 0.5]);
        assert_eq!(over, [0.5, 0.2, 0.0, 0.7]);
    }

    #[test]
    fn test_resolve_kind() {
        assert_eq!(
            resolve_kind(IntegratorKind::Auto, true, true),
            IntegratorKind::Homogeneous
        );
        assert_eq!(
            resolve_kind(IntegratorKind::Auto, false, true),
            IntegratorKind::PreIntegration
        );
        assert_eq!(
            resolve_kind(IntegratorKind::Auto, false, false),
            IntegratorKind::PartialPreIntegration
        );
        assert_eq!(
            resolve_kind(IntegratorKind::Linear, true, true),
            IntegratorKind::Linear
        );
    }

    #[test]
    fn test_create_integrator_names() {
        let config = PreIntegrationConfig::default();
        assert_eq!(create_integrator(IntegratorKind::Linear, config).name(), "linear");
        assert_eq!(
            create_integrator(IntegratorKind::PartialPreIntegration, config).name(),
            "partial pre-integration"
        );
        assert_eq!(
            create_integrator(IntegratorKind::PreIntegration, config).name(),
            "pre-integration"
        );
        assert_eq!(
            create_integrator(IntegratorKind::Homogeneous, config).name(),
            "homogeneous"
        );
    }

    #[test]
    fn test_tuple_layout() {
        let mut property = VolumeProperty::new();
        let two = ScalarInfo::new(vec![(0.0, 1.0); 2]);
        let four = ScalarInfo::new(vec![(0.0, 1.0); 4]);
        assert_eq!(TupleLayout::of(&property, &two), TupleLayout::Independent(2));
        property.set_independent_components(false);
        assert_eq!(TupleLayout::of(&property, &two), TupleLayout::IntensityOpacity);
        assert_eq!(TupleLayout::of(&property, &four), TupleLayout::Rgba);
        let three = ScalarInfo::new(vec![(0.0, 1.0); 3]);
        assert_eq!(TupleLayout::of(&property, &three), TupleLayout::Independent(3));
    }
}
