//! Linear integration with a tabulated `psi`.

use std::sync::OnceLock;

use zsweep_core::{Result, VolumeProperty};
use zsweep_structures::ScalarInfo;

use super::{psi, PiecewiseCore, RayIntegrator};

/// Samples per axis of the shared `psi` table.
pub const PSI_TABLE_SIZE: usize = 512;

static PSI_TABLE: OnceLock<PsiTable> = OnceLock::new();

/// `psi` tabulated over `gamma = tau D / (1 + tau D)` for the front and back
/// optical depths, so the whole of `[0, inf)` maps onto `[0, 1]`.
///
/// The table is built once per process and shared by every integrator.
#[derive(Debug)]
pub struct PsiTable {
    values: Vec<f64>,
}

impl PsiTable {
    /// The process-wide table, built on first use.
    pub fn get() -> &'static PsiTable {
        PSI_TABLE.get_or_init(Self::build)
    }

    fn build() -> Self {
        let last = PSI_TABLE_SIZE - 1;
        let depth = |i: usize| {
            let gamma = i as f64 / last as f64;
            gamma / (1.0 - gamma)
        };
        let mut values = Vec::with_capacity(PSI_TABLE_SIZE * PSI_TABLE_SIZE);
        for front in 0..PSI_TABLE_SIZE {
            for back in 0..PSI_TABLE_SIZE {
                // An infinite optical depth at either end leaves nothing to see.
                let value = if front == last || back == last {
                    0.0
                } else {
                    psi::psi(1.0, depth(front), depth(back))
                };
                values.push(value);
            }
        }
        log::debug!("psi table built ({PSI_TABLE_SIZE}x{PSI_TABLE_SIZE})");
        Self { values }
    }

    /// Bilinear lookup by front and back optical depth (attenuation times length).
    pub fn lookup(&self, depth_front: f64, depth_back: f64) -> f64 {
        let last = (PSI_TABLE_SIZE - 1) as f64;
        let coordinate = |depth: f64| {
            let depth = depth.max(0.0);
            let gamma = if depth.is_finite() { depth / (1.0 + depth) } else { 1.0 };
            let x = gamma * last;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let i = (x.floor() as usize).min(PSI_TABLE_SIZE - 2);
            (i, x - i as f64)
        };
        let (fi, ft) = coordinate(depth_front);
        let (bi, bt) = coordinate(depth_back);
        let at = |f: usize, b: usize| self.values[f * PSI_TABLE_SIZE + b];
        let top = at(fi, bi) * (1.0 - bt) + at(fi, bi + 1) * bt;
        let bottom = at(fi + 1, bi) * (1.0 - bt) + at(fi + 1, bi + 1) * bt;
        top * (1.0 - ft) + bottom * ft
    }
}

/// Same splitting as [`LinearIntegrator`](super::LinearIntegrator) with
/// `psi` read from [`PsiTable`] instead of evaluated.
#[derive(Debug, Clone, Default)]
pub struct PartialPreIntegrator {
    core: PiecewiseCore,
}

impl PartialPreIntegrator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RayIntegrator for PartialPreIntegrator {
    fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> Result<()> {
        PsiTable::get();
        self.core.initialize(property, scalars);
        Ok(())
    }

    fn integrate(&self, lengths: &[f64], near: &[f64], far: &[f64], color: &mut [f32; 4]) {
        let table = PsiTable::get();
        self.core.integrate(
            |length, tau_front, tau_back| table.lookup(tau_front * length, tau_back * length),
            lengths,
            near,
            far,
            color,
        );
    }

    fn name(&self) -> &'static str {
        "partial pre-integration"
    }
}
