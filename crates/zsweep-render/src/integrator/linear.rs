//! Exact integration for piecewise-linear transfer functions.

use zsweep_core::{Result, VolumeProperty};
use zsweep_structures::ScalarInfo;

use super::{psi, PiecewiseCore, RayIntegrator};

/// Integrates each segment exactly, assuming scalars vary linearly along it.
///
/// Segments are split wherever a scalar crosses a transfer-function control
/// point; within a piece color and attenuation are linear, and the closed
/// form in [`psi`](super::psi) applies.
#[derive(Debug, Clone, Default)]
pub struct LinearIntegrator {
    core: PiecewiseCore,
}

impl LinearIntegrator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RayIntegrator for LinearIntegrator {
    fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> Result<()> {
        self.core.initialize(property, scalars);
        Ok(())
    }

    fn integrate(&self, lengths: &[f64], near: &[f64], far: &[f64], color: &mut [f32; 4]) {
        self.core.integrate(psi::psi, lengths, near, far, color);
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use proptest::prelude::*;
    use zsweep_core::{ColorTransferFunction, PiecewiseFunction};

    fn ramp_property() -> VolumeProperty {
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::new(1.0, 0.0, 0.0));
        color.add_rgb_point(0.5, DVec3::new(0.0, 1.0, 0.0));
        color.add_rgb_point(1.0, DVec3::new(0.0, 0.0, 1.0));
        VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, 0.2), (0.5, 2.0), (1.0, 0.5)]),
        )
    }

    fn integrator(property: &VolumeProperty) -> LinearIntegrator {
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(property, &ScalarInfo::new(vec![(0.0, 1.0)]))
            .unwrap();
        integrator
    }

    #[test]
    fn test_uniform_segment_matches_beer_lambert() {
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::new(0.3, 0.6, 0.9));
        let mut property = VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, 0.7)]),
        );
        property.set_scalar_opacity_unit_distance(0, 0.5);
        let integrator = integrator(&property);
        let mut out = [0.0f32; 4];
        integrator.integrate(&[0.4], &[0.25], &[0.25], &mut out);
        let alpha = 1.0 - (-0.7f64 / 0.5 * 0.4).exp();
        assert!((f64::from(out[3]) - alpha).abs() < 1e-6);
        assert!((f64::from(out[0]) - 0.3 * alpha).abs() < 1e-6);
        assert!((f64::from(out[2]) - 0.9 * alpha).abs() < 1e-6);
    }

    #[test]
    fn test_zero_length_is_identity() {
        let integrator = integrator(&ramp_property());
        let mut out = [0.1f32, 0.2, 0.3, 0.4];
        integrator.integrate(&[0.0], &[0.0], &[1.0], &mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_split_equals_two_halves() {
        // The control point at 0.5 is crossed; integrating the halves
        // separately must give the same result.
        let integrator = integrator(&ramp_property());
        let mut whole = [0.0f32; 4];
        integrator.integrate(&[1.0], &[0.2], &[0.8], &mut whole);
        let mut halves = [0.0f32; 4];
        integrator.integrate(&[0.5, 0.5], &[0.2, 0.5], &[0.5, 0.8], &mut halves);
        for i in 0..4 {
            assert!((whole[i] - halves[i]).abs() < 1e-6, "{whole:?} vs {halves:?}");
        }
    }

    #[test]
    fn test_direction_matters() {
        let integrator = integrator(&ramp_property());
        let mut forward = [0.0f32; 4];
        integrator.integrate(&[2.0], &[0.0], &[1.0], &mut forward);
        let mut backward = [0.0f32; 4];
        integrator.integrate(&[2.0], &[1.0], &[0.0], &mut backward);
        // Same opacity either way, different color weighting.
        assert!((forward[3] - backward[3]).abs() < 1e-6);
        assert!((forward[0] - backward[0]).abs() > 1e-3);
    }

    #[test]
    fn test_independent_components_mix() {
        let mut property = VolumeProperty::new();
        let mut red = ColorTransferFunction::new();
        red.add_rgb_point(0.0, DVec3::X);
        let mut blue = ColorTransferFunction::new();
        blue.add_rgb_point(0.0, DVec3::Z);
        property.set_color(0, red);
        property.set_color(1, blue);
        property.set_scalar_opacity(0, PiecewiseFunction::from_points([(0.0, 1.0)]));
        property.set_scalar_opacity(1, PiecewiseFunction::from_points([(0.0, 3.0)]));
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0), (0.0, 1.0)]))
            .unwrap();
        let mut out = [0.0f32; 4];
        integrator.integrate(&[1.0], &[0.5, 0.5], &[0.5, 0.5], &mut out);
        let alpha = 1.0 - (-4.0f64).exp();
        assert!((f64::from(out[3]) - alpha).abs() < 1e-6);
        assert!((f64::from(out[0]) - 0.25 * alpha).abs() < 1e-6);
        assert!((f64::from(out[2]) - 0.75 * alpha).abs() < 1e-6);
    }

    #[test]
    fn test_dependent_rgba_bypasses_functions() {
        let mut property = VolumeProperty::new();
        property.set_independent_components(false);
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0); 4]))
            .unwrap();
        let mut out = [0.0f32; 4];
        let tuple = [0.0, 1.0, 0.0, 2.0];
        integrator.integrate(&[0.5], &tuple, &tuple, &mut out);
        let alpha = 1.0 - (-1.0f64).exp();
        assert!((f64::from(out[1]) - alpha).abs() < 1e-6);
        assert!(out[0].abs() < 1e-7);
        assert!((f64::from(out[3]) - alpha).abs() < 1e-6);
    }

    #[test]
    fn test_dependent_intensity_opacity() {
        let mut property = VolumeProperty::new();
        property.set_independent_components(false);
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0); 2]))
            .unwrap();
        let mut out = [0.0f32; 4];
        integrator.integrate(&[1.0], &[0.5, 1.0], &[0.5, 1.0], &mut out);
        let alpha = 1.0 - (-1.0f64).exp();
        assert!((f64::from(out[0]) - 0.5 * alpha).abs() < 1e-6);
        assert_eq!(out[0], out[2]);
    }

    proptest! {
        #[test]
        fn prop_alpha_monotone_and_bounded(
            segments in prop::collection::vec((0.0f64..3.0, 0.0f64..1.0, 0.0f64..1.0), 1..12)
        ) {
            let integrator = integrator(&ramp_property());
            let mut color = [0.0f32; 4];
            let mut previous = 0.0f32;
            for (length, s0, s1) in segments {
                integrator.integrate(&[length], &[s0], &[s1], &mut color);
                prop_assert!(color[3] >= previous - 1e-6);
                prop_assert!(color[3] <= 1.0 + 1e-6);
                for c in &color[..3] {
                    prop_assert!(*c >= -1e-6);
                    prop_assert!(*c <= color[3] + 1e-5);
                }
                previous = color[3];
            }
        }
    }
}
