//! Scalar fields attached to mesh points or cells.

use zsweep_core::{Result, TimeStamp, ZsweepError};

/// Where the values of a field live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAssociation {
    /// One tuple per mesh point.
    Points,
    /// One tuple per mesh cell.
    Cells,
}

/// A named field of `num_components`-tuples.
#[derive(Debug, Clone)]
pub struct ScalarField {
    name: String,
    association: FieldAssociation,
    values: Vec<f64>,
    num_components: usize,
    mtime: TimeStamp,
}

impl ScalarField {
    /// Creates a field from flat values, `num_components` per tuple.
    pub fn new(
        name: impl Into<String>,
        association: FieldAssociation,
        values: Vec<f64>,
        num_components: usize,
    ) -> Result<Self> {
        if num_components == 0 {
            return Err(ZsweepError::InvalidOption(
                "a scalar field needs at least one component".to_string(),
            ));
        }
        if values.len() % num_components != 0 {
            return Err(ZsweepError::SizeMismatch {
                expected: values.len().next_multiple_of(num_components),
                actual: values.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            association,
            values,
            num_components,
            mtime: TimeStamp::now(),
        })
    }

    /// Creates a single-component point field.
    pub fn points(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            association: FieldAssociation::Points,
            values,
            num_components: 1,
            mtime: TimeStamp::now(),
        }
    }

    /// Creates a single-component cell field.
    pub fn cells(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            association: FieldAssociation::Cells,
            ..Self::points(name, values)
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the values live.
    pub fn association(&self) -> FieldAssociation {
        self.association
    }

    /// Number of components per tuple.
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Number of tuples.
    pub fn num_tuples(&self) -> usize {
        self.values.len() / self.num_components
    }

    /// Flat values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Replaces the values, keeping the component count.
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() % self.num_components != 0 {
            return Err(ZsweepError::SizeMismatch {
                expected: values.len().next_multiple_of(self.num_components),
                actual: values.len(),
            });
        }
        self.values = values;
        self.mtime.modified();
        Ok(())
    }

    /// Tuple `i`.
    pub fn tuple(&self, i: usize) -> &[f64] {
        let start = i * self.num_components;
        &self.values[start..start + self.num_components]
    }

    /// Value of tuple `i` for rendering: the component itself, or the
    /// Euclidean norm of a multi-component tuple.
    pub fn magnitude(&self, i: usize) -> f64 {
        let tuple = self.tuple(i);
        if tuple.len() == 1 {
            tuple[0]
        } else {
            tuple.iter().map(|v| v * v).sum::<f64>().sqrt()
        }
    }

    /// Range of one component over all tuples.
    pub fn component_range(&self, component: usize) -> (f64, f64) {
        range_of(
            self.values
                .iter()
                .skip(component)
                .step_by(self.num_components)
                .copied(),
        )
    }

    /// Range of [`magnitude`](Self::magnitude) over all tuples.
    pub fn magnitude_range(&self) -> (f64, f64) {
        range_of((0..self.num_tuples()).map(|i| self.magnitude(i)))
    }

    /// Descriptor of this field for integrator setup.
    pub fn info(&self) -> ScalarInfo {
        ScalarInfo {
            ranges: (0..self.num_components)
                .map(|c| self.component_range(c))
                .collect(),
            mtime: self.mtime,
        }
    }

    /// Modification time.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

fn range_of(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// What an integrator needs to know about the scalars it will integrate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarInfo {
    ranges: Vec<(f64, f64)>,
    mtime: TimeStamp,
}

impl ScalarInfo {
    /// Creates a descriptor from per-component ranges.
    pub fn new(ranges: Vec<(f64, f64)>) -> Self {
        Self {
            ranges,
            mtime: TimeStamp::now(),
        }
    }

    /// Single-component descriptor of the magnitudes of `field`, which is what
    /// the sweep hands to integrators.
    pub fn magnitude_of(field: &ScalarField) -> Self {
        Self {
            ranges: vec![field.magnitude_range()],
            mtime: field.mtime(),
        }
    }

    /// Number of components.
    pub fn num_components(&self) -> usize {
        self.ranges.len()
    }

    /// Range of `component`.
    pub fn range(&self, component: usize) -> (f64, f64) {
        self.ranges.get(component).copied().unwrap_or((0.0, 0.0))
    }

    /// Modification time of the field this describes.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}
