//! Full pre-integration: a lookup table indexed by front scalar, back scalar
//! and segment length.
//!
//! Entries are filled by a sub-integrator. With incremental building only the
//! shortest length is integrated directly; a segment of length `l` is the
//! composite of its front half and its back half, meeting at the scalar
//! interpolated at the split.

use zsweep_core::{PreIntegrationConfig, Result, TimeStamp, VolumeProperty, ZsweepError};
use zsweep_structures::ScalarInfo;

use super::{composite_under, PartialPreIntegrator, RayIntegrator, TupleLayout};
use crate::transfer_sampler::widen;

/// Segment length covered by the table when none was set.
const DEFAULT_MAX_LENGTH: f64 = 1.0;

/// Table for one component.
#[derive(Debug, Clone)]
struct IntegrationTable {
    scalar_min: f64,
    scalar_scale: f64,
    length_scale: f64,
    scalar_resolution: usize,
    length_resolution: usize,
    entries: Vec<[f32; 4]>,
}

impl IntegrationTable {
    fn index(&self, front: usize, back: usize, length: usize) -> usize {
        (front * self.scalar_resolution + back) * self.length_resolution + length
    }

    fn scalar_bin(&self, scalar: f64) -> usize {
        let bin = ((scalar - self.scalar_min) * self.scalar_scale).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bin = bin.clamp(0.0, (self.scalar_resolution - 1) as f64) as usize;
        bin
    }

    fn lookup(&self, front: f64, back: f64, length: f64) -> [f32; 4] {
        let l = (length * self.length_scale).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let l = l.clamp(0.0, (self.length_resolution - 1) as f64) as usize;
        self.entries[self.index(self.scalar_bin(front), self.scalar_bin(back), l)]
    }
}

/// Number of entries of a `scalar * scalar * length` table, or `None` when
/// it overflows or exceeds `budget`.
fn entry_count(scalar: usize, length: usize, budget: usize) -> Option<usize> {
    scalar
        .checked_mul(scalar)
        .and_then(|n| n.checked_mul(length))
        .filter(|&n| n <= budget)
}

/// Allocates zeroed storage for a `scalar * scalar * length` table, halving
/// both resolutions while the table is over `budget` or the allocation fails.
fn allocate_entries(
    mut scalar: usize,
    mut length: usize,
    budget: usize,
) -> Result<(Vec<[f32; 4]>, usize, usize)> {
    loop {
        if let Some(count) = entry_count(scalar, length, budget) {
            let mut entries: Vec<[f32; 4]> = Vec::new();
            if entries.try_reserve_exact(count).is_ok() {
                entries.resize(count, [0.0; 4]);
                return Ok((entries, scalar, length));
            }
        }
        if scalar <= 2 && length <= 2 {
            return Err(ZsweepError::TableAllocation {
                requested: scalar.saturating_mul(scalar).saturating_mul(length),
            });
        }
        log::warn!("could not allocate a {scalar}x{scalar}x{length} pre-integration table; halving it");
        scalar = (scalar / 2).max(2);
        length = (length / 2).max(2);
    }
}

/// Integrator backed by a per-component `(front, back, length)` table.
///
/// Segments longer than the table's maximum length are cut into equal pieces
/// that fit. Tuples with dependent components cannot be tabulated per
/// component and go straight to the sub-integrator.
pub struct PreIntegrator {
    config: PreIntegrationConfig,
    sub: Box<dyn RayIntegrator>,
    tables: Vec<IntegrationTable>,
    max_length: f64,
    delegate: bool,
    built_from: Option<(TimeStamp, ScalarInfo, f64)>,
}

impl std::fmt::Debug for PreIntegrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreIntegrator")
            .field("config", &self.config)
            .field("sub", &self.sub.name())
            .field("tables", &self.tables.len())
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl Default for PreIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PreIntegrator {
    /// Creates an integrator with the default table layout.
    pub fn new() -> Self {
        Self::with_config(PreIntegrationConfig::default())
    }

    /// Creates an integrator with `config`, filled by partial pre-integration.
    pub fn with_config(config: PreIntegrationConfig) -> Self {
        Self {
            config,
            sub: Box::new(PartialPreIntegrator::new()),
            tables: Vec::new(),
            max_length: DEFAULT_MAX_LENGTH,
            delegate: false,
            built_from: None,
        }
    }

    /// Replaces the integrator used to fill the table.
    pub fn with_sub_integrator(mut self, sub: Box<dyn RayIntegrator>) -> Self {
        self.sub = sub;
        self.built_from = None;
        self
    }

    /// Table layout.
    pub fn config(&self) -> PreIntegrationConfig {
        self.config
    }

    /// Longest segment a single table lookup covers.
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    /// Sets the longest segment a lookup covers, typically the longest cell
    /// diagonal. Non-positive lengths fall back to 1.
    pub fn set_max_length(&mut self, length: f64) {
        self.max_length = if length > 0.0 && length.is_finite() {
            length
        } else {
            DEFAULT_MAX_LENGTH
        };
    }

    /// Resolutions actually allocated for `component`, which may be smaller
    /// than configured when memory ran short.
    pub fn resolution(&self, component: usize) -> Option<(usize, usize)> {
        self.tables
            .get(component)
            .map(|t| (t.scalar_resolution, t.length_resolution))
    }

    fn build_table(&mut self, property: &VolumeProperty, component: usize, range: (f64, f64)) -> Result<IntegrationTable> {
        let single = property.single_component(component);
        self.sub.initialize(&single, &ScalarInfo::new(vec![range]))?;

        let (entries, scalar_resolution, length_resolution) = allocate_entries(
            self.config.scalar_resolution.max(2),
            self.config.length_resolution.max(2),
            self.config.max_table_entries,
        )?;
        let (lo, hi) = widen(range);
        let scalar_step = (hi - lo) / (scalar_resolution - 1) as f64;
        let length_step = self.max_length / (length_resolution - 1) as f64;
        let mut table = IntegrationTable {
            scalar_min: lo,
            scalar_scale: 1.0 / scalar_step,
            length_scale: 1.0 / length_step,
            scalar_resolution,
            length_resolution,
            entries,
        };

        let scalar_at = |bin: usize| lo + bin as f64 * scalar_step;
        let sub = &self.sub;
        let direct = |front: usize, back: usize, l: usize| {
            let mut color = [0.0f32; 4];
            sub.integrate(&[l as f64 * length_step], &[scalar_at(front)], &[scalar_at(back)], &mut color);
            color
        };

        for l in 1..length_resolution {
            for front in 0..scalar_resolution {
                for back in 0..scalar_resolution {
                    let entry = if l == 1 || !self.config.incremental {
                        direct(front, back, l)
                    } else {
                        let front_length = l / 2;
                        let back_length = l - front_length;
                        let offset = (back as f64 - front as f64) * front_length as f64 / l as f64;
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let middle = (front as f64 + offset).round() as usize;
                        let near = table.entries[table.index(front, middle, front_length)];
                        let far = table.entries[table.index(middle, back, back_length)];
                        let remaining = 1.0 - near[3];
                        [
                            near[0] + remaining * far[0],
                            near[1] + remaining * far[1],
                            near[2] + remaining * far[2],
                            near[3] + remaining * far[3],
                        ]
                    };
                    let index = table.index(front, back, l);
                    table.entries[index] = entry;
                }
            }
        }
        Ok(table)
    }
}

impl RayIntegrator for PreIntegrator {
    fn initialize(&mut self, property: &VolumeProperty, scalars: &ScalarInfo) -> Result<()> {
        if let Some((mtime, info, length)) = &self.built_from {
            if *mtime == property.mtime() && info == scalars && *length == self.max_length {
                return Ok(());
            }
        }
        self.tables.clear();
        self.delegate = !matches!(TupleLayout::of(property, scalars), TupleLayout::Independent(_));
        if self.delegate {
            self.sub.initialize(property, scalars)?;
        } else {
            let components = scalars.num_components().clamp(1, zsweep_core::MAX_COMPONENTS);
            for c in 0..components {
                let table = self.build_table(property, c, scalars.range(c))?;
                self.tables.push(table);
            }
            log::debug!(
                "pre-integration tables built for {components} component(s), max length {}",
                self.max_length
            );
        }
        self.built_from = Some((property.mtime(), scalars.clone(), self.max_length));
        Ok(())
    }

    fn integrate(&self, lengths: &[f64], near: &[f64], far: &[f64], color: &mut [f32; 4]) {
        if self.delegate {
            self.sub.integrate(lengths, near, far, color);
            return;
        }
        let n = self.tables.len();
        if n == 0 {
            return;
        }
        for (i, &length) in lengths.iter().enumerate() {
            if length <= 0.0 {
                continue;
            }
            let front = &near[i * n..(i + 1) * n];
            let back = &far[i * n..(i + 1) * n];
            let pieces = (length / self.max_length).ceil().max(1.0);
            let piece_length = length / pieces;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = pieces as usize;
            for p in 0..count {
                let t0 = p as f64 / pieces;
                let t1 = (p + 1) as f64 / pieces;
                let mut mixed = [0.0f32; 4];
                for (c, table) in self.tables.iter().enumerate() {
                    let s0 = front[c] + (back[c] - front[c]) * t0;
                    let s1 = front[c] + (back[c] - front[c]) * t1;
                    let value = table.lookup(s0, s1, piece_length);
                    if c == 0 {
                        mixed = value;
                    } else {
                        let keep = 1.0 - 0.5 * value[3];
                        let add = 1.0 - 0.5 * mixed[3];
                        for k in 0..4 {
                            mixed[k] = mixed[k] * keep + value[k] * add;
                        }
                    }
                }
                composite_under(color, mixed.map(f64::from));
            }
        }
    }

    fn set_max_segment_length(&mut self, length: f64) {
        self.set_max_length(length);
    }

    fn name(&self) -> &'static str {
        "pre-integration"
    }
}
