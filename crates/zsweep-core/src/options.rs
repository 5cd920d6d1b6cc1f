//! Configuration options for the Z-sweep renderer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZsweepError};

/// Smallest and largest image sample distance accepted by any setter.
pub const SAMPLE_DISTANCE_LIMITS: (f64, f64) = (0.1, 100.0);

/// Smallest accepted maximum pixel-list size.
pub const MIN_PIXEL_LIST_SIZE: usize = 2;

/// Options controlling a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Distance in screen pixels between two rays (1.0 = one ray per pixel).
    pub image_sample_distance: f64,

    /// Lower bound used when the sample distance is adjusted automatically.
    pub minimum_image_sample_distance: f64,

    /// Upper bound used when the sample distance is adjusted automatically.
    pub maximum_image_sample_distance: f64,

    /// Whether to adapt the sample distance to the allocated render time.
    pub auto_adjust_sample_distances: bool,

    /// Longest fragment list a pixel may hold before compositing is forced.
    pub max_pixel_list_size: usize,

    /// Ray integrator used for segments.
    pub integrator: IntegratorKind,

    /// Order in which the sweep visits depths.
    pub sweep_direction: SweepDirection,

    /// Whether opaque geometry from an external depth buffer occludes the volume.
    pub intermix_intersecting_geometry: bool,

    /// Name of the scalar field to render; the first field when unset.
    pub scalar_array: Option<String>,

    /// Table layout of the full pre-integration integrator.
    pub pre_integration: PreIntegrationConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_sample_distance: 1.0,
            minimum_image_sample_distance: 1.0,
            maximum_image_sample_distance: 10.0,
            auto_adjust_sample_distances: true,
            max_pixel_list_size: 64,
            integrator: IntegratorKind::Auto,
            sweep_direction: SweepDirection::FrontToBack,
            intermix_intersecting_geometry: false,
            scalar_array: None,
            pre_integration: PreIntegrationConfig::default(),
        }
    }
}

fn clamp_sample_distance(distance: f64) -> f64 {
    distance.clamp(SAMPLE_DISTANCE_LIMITS.0, SAMPLE_DISTANCE_LIMITS.1)
}

impl RenderOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image sample distance, clamped to [`SAMPLE_DISTANCE_LIMITS`].
    pub fn set_image_sample_distance(&mut self, distance: f64) -> f64 {
        self.image_sample_distance = clamp_sample_distance(distance);
        self.image_sample_distance
    }

    /// Sets the lower auto-adjust bound, clamped to [`SAMPLE_DISTANCE_LIMITS`].
    pub fn set_minimum_image_sample_distance(&mut self, distance: f64) -> f64 {
        self.minimum_image_sample_distance = clamp_sample_distance(distance);
        self.minimum_image_sample_distance
    }

    /// Sets the upper auto-adjust bound, clamped to [`SAMPLE_DISTANCE_LIMITS`].
    pub fn set_maximum_image_sample_distance(&mut self, distance: f64) -> f64 {
        self.maximum_image_sample_distance = clamp_sample_distance(distance);
        self.maximum_image_sample_distance
    }

    /// Sets the maximum pixel-list size; values below [`MIN_PIXEL_LIST_SIZE`] are raised.
    pub fn set_max_pixel_list_size(&mut self, size: usize) -> usize {
        self.max_pixel_list_size = size.max(MIN_PIXEL_LIST_SIZE);
        self.max_pixel_list_size
    }

    /// Sets the image sample distance.
    pub fn with_image_sample_distance(mut self, distance: f64) -> Self {
        self.set_image_sample_distance(distance);
        self
    }

    /// Sets the auto-adjust bounds.
    pub fn with_sample_distance_bounds(mut self, minimum: f64, maximum: f64) -> Self {
        self.set_minimum_image_sample_distance(minimum);
        self.set_maximum_image_sample_distance(maximum);
        self
    }

    /// Enables or disables automatic sample-distance adjustment.
    pub fn with_auto_adjust(mut self, enabled: bool) -> Self {
        self.auto_adjust_sample_distances = enabled;
        self
    }

    /// Sets the maximum pixel-list size.
    pub fn with_max_pixel_list_size(mut self, size: usize) -> Self {
        self.set_max_pixel_list_size(size);
        self
    }

    /// Sets the ray integrator.
    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    /// Sets the sweep direction.
    pub fn with_sweep_direction(mut self, direction: SweepDirection) -> Self {
        self.sweep_direction = direction;
        self
    }

    /// Enables or disables depth-buffer intermixing.
    pub fn with_intermix_intersecting_geometry(mut self, enabled: bool) -> Self {
        self.intermix_intersecting_geometry = enabled;
        self
    }

    /// Selects the scalar field by name.
    pub fn with_scalar_array(mut self, name: impl Into<String>) -> Self {
        self.scalar_array = Some(name.into());
        self
    }

    /// Sets the pre-integration table layout.
    pub fn with_pre_integration(mut self, config: PreIntegrationConfig) -> Self {
        self.pre_integration = config;
        self
    }

    /// Checks values that cannot be repaired by clamping.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_image_sample_distance > self.maximum_image_sample_distance {
            return Err(ZsweepError::InvalidOption(format!(
                "minimum image sample distance {} exceeds maximum {}",
                self.minimum_image_sample_distance, self.maximum_image_sample_distance
            )));
        }
        if !self.image_sample_distance.is_finite() || self.image_sample_distance <= 0.0 {
            return Err(ZsweepError::InvalidOption(format!(
                "image sample distance {} must be positive",
                self.image_sample_distance
            )));
        }
        if self.max_pixel_list_size < MIN_PIXEL_LIST_SIZE {
            return Err(ZsweepError::InvalidOption(format!(
                "max pixel list size {} is below {MIN_PIXEL_LIST_SIZE}",
                self.max_pixel_list_size
            )));
        }
        Ok(())
    }

    /// Parses options from JSON. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let options = Self::from_json_str(&text)?;
        log::debug!("loaded render options from {}", path.display());
        Ok(options)
    }

    /// Writes options to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// Which ray integrator composites segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntegratorKind {
    /// Choose from the data: cell scalars use `Homogeneous`, independent
    /// components use `PreIntegration`, anything else `PartialPreIntegration`.
    #[default]
    Auto,
    /// Exact piecewise-linear integration.
    Linear,
    /// Linear integration with a tabulated attenuation integral.
    PartialPreIntegration,
    /// Full lookup table indexed by front scalar, back scalar and length.
    PreIntegration,
    /// Constant scalar per segment.
    Homogeneous,
}

/// Order in which the sweep visits depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SweepDirection {
    /// Nearest depth first; segments are composited under the accumulated color.
    #[default]
    FrontToBack,
    /// Farthest depth first; segments are composited over the accumulated color.
    BackToFront,
}

impl SweepDirection {
    /// Returns true when depth `a` is reached strictly before depth `b`.
    pub fn precedes(self, a: f64, b: f64) -> bool {
        match self {
            SweepDirection::FrontToBack => a < b,
            SweepDirection::BackToFront => a > b,
        }
    }

    /// Returns whichever depth is reached later.
    pub fn later(self, a: f64, b: f64) -> f64 {
        if self.precedes(a, b) {
            b
        } else {
            a
        }
    }

    /// Depth target beyond every projected depth, used by the final flush.
    pub fn flush_target(self) -> f64 {
        match self {
            SweepDirection::FrontToBack => f64::INFINITY,
            SweepDirection::BackToFront => f64::NEG_INFINITY,
        }
    }
}

/// Largest pre-integration table, in entries, tried by default (1 GiB of RGBA floats).
pub const DEFAULT_MAX_TABLE_ENTRIES: usize = 1 << 26;

/// Layout of the full pre-integration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreIntegrationConfig {
    /// Number of scalar bins per axis.
    pub scalar_resolution: usize,
    /// Number of length bins.
    pub length_resolution: usize,
    /// Build long entries by splicing shorter ones instead of integrating each.
    pub incremental: bool,
    /// Entry budget of one table; larger layouts are halved until they fit.
    pub max_table_entries: usize,
}

impl Default for PreIntegrationConfig {
    fn default() -> Self {
        Self {
            scalar_resolution: 128,
            length_resolution: 128,
            incremental: true,
            max_table_entries: DEFAULT_MAX_TABLE_ENTRIES,
        }
    }
}

impl PreIntegrationConfig {
    /// Sets both resolutions; each is raised to at least 2.
    pub fn with_resolution(mut self, scalar: usize, length: usize) -> Self {
        self.scalar_resolution = scalar.max(2);
        self.length_resolution = length.max(2);
        self
    }

    /// Sets the entry budget of one table.
    pub fn with_max_table_entries(mut self, entries: usize) -> Self {
        self.max_table_entries = entries;
        self
    }

    /// Enables or disables incremental building.
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = RenderOptions::default();
        assert_eq!(options.image_sample_distance, 1.0);
        assert_eq!(options.minimum_image_sample_distance, 1.0);
        assert_eq!(options.maximum_image_sample_distance, 10.0);
        assert!(options.auto_adjust_sample_distances);
        assert_eq!(options.max_pixel_list_size, 64);
        assert_eq!(options.integrator, IntegratorKind::Auto);
        assert_eq!(options.sweep_direction, SweepDirection::FrontToBack);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_setters_clamp() {
        let mut options = RenderOptions::new();
        assert_eq!(options.set_image_sample_distance(0.0), 0.1);
        assert_eq!(options.set_image_sample_distance(500.0), 100.0);
        assert_eq!(options.set_max_pixel_list_size(0), MIN_PIXEL_LIST_SIZE);
        assert_eq!(options.set_minimum_image_sample_distance(-3.0), 0.1);
    }

    #[test]
    fn test_builder() {
        let options = RenderOptions::new()
            .with_image_sample_distance(2.0)
            .with_integrator(IntegratorKind::Linear)
            .with_sweep_direction(SweepDirection::BackToFront)
            .with_scalar_array("density");
        assert_eq!(options.image_sample_distance, 2.0);
        assert_eq!(options.integrator, IntegratorKind::Linear);
        assert_eq!(options.sweep_direction, SweepDirection::BackToFront);
        assert_eq!(options.scalar_array.as_deref(), Some("density"));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let options = RenderOptions::new().with_sample_distance_bounds(5.0, 2.0);
        assert!(matches!(
            options.validate(),
            Err(ZsweepError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let options = RenderOptions::new()
            .with_max_pixel_list_size(16)
            .with_pre_integration(PreIntegrationConfig::default().with_resolution(32, 16));
        let json = options.to_json_string().unwrap();
        let parsed = RenderOptions::from_json_str(&json).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_json_missing_fields_use_defaults() {
        let parsed = RenderOptions::from_json_str(r#"{ "max_pixel_list_size": 8 }"#).unwrap();
        assert_eq!(parsed.max_pixel_list_size, 8);
        assert_eq!(parsed.image_sample_distance, 1.0);
        assert_eq!(parsed.pre_integration.scalar_resolution, 128);
    }

    #[test]
    fn test_sweep_direction_ordering() {
        let ftb = SweepDirection::FrontToBack;
        let btf = SweepDirection::BackToFront;
        assert!(ftb.precedes(0.2, 0.4));
        assert!(btf.precedes(0.4, 0.2));
        assert_eq!(ftb.later(0.2, 0.4), 0.4);
        assert_eq!(btf.later(0.2, 0.4), 0.2);
        assert!(ftb.precedes(1.0, ftb.flush_target()));
        assert!(btf.precedes(-1.0, btf.flush_target()));
    }
}
