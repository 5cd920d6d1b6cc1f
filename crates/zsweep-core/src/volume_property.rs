//! Per-component appearance of a volume.

use crate::time_stamp::TimeStamp;
use crate::transfer_function::{ColorTransferFunction, PiecewiseFunction};

/// Largest number of scalar components a property describes.
pub const MAX_COMPONENTS: usize = 4;

/// Smallest accepted scalar opacity unit distance.
pub const MIN_UNIT_DISTANCE: f64 = 1e-5;

/// How a component maps scalars to color.
#[derive(Debug, Clone)]
pub enum ComponentColor {
    /// Intensity replicated to all three channels.
    Gray(PiecewiseFunction),
    /// Full color.
    Rgb(ColorTransferFunction),
}

impl ComponentColor {
    /// Evaluates the color at `x`.
    pub fn rgb(&self, x: f64) -> glam::DVec3 {
        match self {
            ComponentColor::Gray(f) => glam::DVec3::splat(f.value(x)),
            ComponentColor::Rgb(f) => f.color(x),
        }
    }

    /// Abscissas of the function's control points.
    pub fn node_positions(&self) -> Vec<f64> {
        match self {
            ComponentColor::Gray(f) => f.nodes().iter().map(|n| n.x).collect(),
            ComponentColor::Rgb(f) => f.nodes().iter().map(|n| n.x).collect(),
        }
    }
}

/// Transfer functions of one scalar component.
#[derive(Debug, Clone)]
pub struct ComponentProperty {
    /// Scalar-to-color mapping.
    pub color: ComponentColor,
    /// Scalar-to-opacity mapping, opacity per unit distance.
    pub scalar_opacity: PiecewiseFunction,
    unit_distance: f64,
}

impl Default for ComponentProperty {
    fn default() -> Self {
        Self {
            color: ComponentColor::Gray(PiecewiseFunction::from_points([(0.0, 0.0), (1.0, 1.0)])),
            scalar_opacity: PiecewiseFunction::from_points([(0.0, 0.0), (1.0, 1.0)]),
            unit_distance: 1.0,
        }
    }
}

impl ComponentProperty {
    /// World distance over which the opacity function's values apply.
    pub fn unit_distance(&self) -> f64 {
        self.unit_distance
    }
}

/// Appearance of a volume: transfer functions for up to [`MAX_COMPONENTS`] components.
#[derive(Debug, Clone)]
pub struct VolumeProperty {
    components: Vec<ComponentProperty>,
    independent_components: bool,
    mtime: TimeStamp,
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            components: vec![ComponentProperty::default(); MAX_COMPONENTS],
            independent_components: true,
            mtime: TimeStamp::now(),
        }
    }
}

impl VolumeProperty {
    /// Creates a property with gray ramps over `[0, 1]` for every component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a property whose first component uses the given functions.
    pub fn with_functions(color: ColorTransferFunction, opacity: PiecewiseFunction) -> Self {
        let mut property = Self::new();
        property.set_color(0, color);
        property.set_scalar_opacity(0, opacity);
        property
    }

    /// Transfer functions of `component` (clamped to the last component).
    pub fn component(&self, component: usize) -> &ComponentProperty {
        &self.components[component.min(MAX_COMPONENTS - 1)]
    }

    /// Mutable access to a component; marks the property modified.
    pub fn component_mut(&mut self, component: usize) -> &mut ComponentProperty {
        self.mtime.modified();
        &mut self.components[component.min(MAX_COMPONENTS - 1)]
    }

    /// Sets a color transfer function.
    pub fn set_color(&mut self, component: usize, color: ColorTransferFunction) {
        self.component_mut(component).color = ComponentColor::Rgb(color);
    }

    /// Sets a gray-level transfer function.
    pub fn set_gray(&mut self, component: usize, gray: PiecewiseFunction) {
        self.component_mut(component).color = ComponentColor::Gray(gray);
    }

    /// Sets the scalar opacity function.
    pub fn set_scalar_opacity(&mut self, component: usize, opacity: PiecewiseFunction) {
        self.component_mut(component).scalar_opacity = opacity;
    }

    /// Sets the scalar opacity unit distance, raised to at least
    /// [`MIN_UNIT_DISTANCE`]. Returns the stored value.
    pub fn set_scalar_opacity_unit_distance(&mut self, component: usize, distance: f64) -> f64 {
        let distance = if distance.is_finite() {
            distance.max(MIN_UNIT_DISTANCE)
        } else {
            1.0
        };
        self.component_mut(component).unit_distance = distance;
        distance
    }

    /// Whether each scalar component has its own transfer functions.
    ///
    /// When false, two-component scalars are read as (intensity, opacity)
    /// and four-component scalars as RGBA.
    pub fn independent_components(&self) -> bool {
        self.independent_components
    }

    /// Sets whether components are independent.
    pub fn set_independent_components(&mut self, independent: bool) {
        self.independent_components = independent;
        self.mtime.modified();
    }

    /// Copy holding only `component`, moved to slot 0.
    pub fn single_component(&self, component: usize) -> Self {
        let mut property = Self::new();
        property.components[0] = self.component(component).clone();
        property
    }

    /// Modification time.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}
