//! Integration for scalars that are constant along each segment.

use zsweep_core::{Result, VolumeProperty};
use zsweep_structures::ScalarInfo;

use super::{composite_under, PiecewiseCore, RayIntegrator, TupleLayout};

/// Treats each segment as homogeneous, using the scalar at its near end.
///
/// This is exact for cell-associated scalars, where both ends of a segment
/// carry the scalar of the cell it crosses.
#[derive(Debug, Clone, Default)]
pub struct HomogeneousIntegrator {
    core: PiecewiseCore,
}

impl HomogeneousIntegrator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RayIntegrator for HomogeneousIntegrator {
    fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> Result<()> {
        self.core.initialize(property, scalars);
        Ok(())
    }

    fn integrate(&self, lengths: &[f64], near: &[f64], _far: &[f64], color: &mut [f32; 4]) {
        let n = self.core.layout.tuple_size();
        for (i, &length) in lengths.iter().enumerate() {
            let tuple = &near[i * n..(i + 1) * n];
            let value = match self.core.layout {
                TupleLayout::Independent(_) => self.core.mix(tuple, tuple, 0.0),
                _ => self.core.literal(tuple),
            };
            let alpha = -(-value[3] * length).exp_m1();
            composite_under(
                color,
                [value[0] * alpha, value[1] * alpha, value[2] * alpha, alpha],
            );
        }
    }

    fn name(&self) -> &'static str {
        "homogeneous"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use zsweep_core::{ColorTransferFunction, PiecewiseFunction};

    #[test]
    fn test_constant_cell() {
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::ZERO);
        color.add_rgb_point(10.0, DVec3::new(1.0, 0.5, 0.0));
        let property = VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, 0.0), (10.0, 2.0)]),
        );
        let mut integrator = HomogeneousIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 10.0)]))
            .unwrap();
        let mut out = [0.0f32; 4];
        integrator.integrate(&[0.5], &[5.0], &[5.0], &mut out);
        let alpha = 1.0 - (-1.0f64 * 0.5).exp();
        assert!((f64::from(out[3]) - alpha).abs() < 1e-6);
        assert!((f64::from(out[0]) - 0.5 * alpha).abs() < 1e-6);
        assert!((f64::from(out[1]) - 0.25 * alpha).abs() < 1e-6);
    }

    #[test]
    fn test_far_scalar_ignored() {
        let property = VolumeProperty::new();
        let mut integrator = HomogeneousIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0)]))
            .unwrap();
        let mut a = [0.0f32; 4];
        integrator.integrate(&[1.0], &[0.5], &[0.5], &mut a);
        let mut b = [0.0f32; 4];
        integrator.integrate(&[1.0], &[0.5], &[1.0], &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_segments_accumulate() {
        let property = VolumeProperty::new();
        let mut integrator = HomogeneousIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0)]))
            .unwrap();
        let mut split = [0.0f32; 4];
        integrator.integrate(&[0.5, 0.5], &[1.0, 1.0], &[1.0, 1.0], &mut split);
        let mut whole = [0.0f32; 4];
        integrator.integrate(&[1.0], &[1.0], &[1.0], &mut whole);
        for i in 0..4 {
            assert!((split[i] - whole[i]).abs() < 1e-6);
        }
    }
}
