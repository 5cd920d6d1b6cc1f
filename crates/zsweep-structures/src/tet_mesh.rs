//! Unstructured volume mesh.
//!
//! # Overview
//!
//! `TetMesh` stores cells as arrays of 8 vertex indices; unused slots hold
//! `u32::MAX`. Only tetrahedra (4 used slots) are rendered. Pyramids, wedges
//! and hexahedra can be stored but are skipped by the renderer, which expects
//! them to be tetrahedralized beforehand.
//!
//! # Example
//!
//! ```rust
//! use glam::DVec3;
//! use zsweep_structures::TetMesh;
//!
//! let points = vec![
//!     DVec3::new(0.0, 0.0, 0.0),
//!     DVec3::new(1.0, 0.0, 0.0),
//!     DVec3::new(0.0, 1.0, 0.0),
//!     DVec3::new(0.0, 0.0, 1.0),
//! ];
//! let mut mesh = TetMesh::from_tets("tet", points, vec![[0, 1, 2, 3]]).unwrap();
//! mesh.add_point_scalars("temperature", vec![0.0, 0.5, 1.0, 0.25]).unwrap();
//! ```

use glam::{DMat4, DVec3};
use zsweep_core::{Result, TimeStamp, ZsweepError};

use crate::scalar_field::{FieldAssociation, ScalarField};

/// Unused slot marker in a cell's index array.
pub const UNUSED: u32 = u32::MAX;

/// Cell type, from the number of used index slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// 4 vertices.
    Tet,
    /// 5 vertices.
    Pyramid,
    /// 6 vertices.
    Wedge,
    /// 8 vertices.
    Hex,
    /// Any other vertex count.
    Other(usize),
}

/// A volume mesh of (mostly) tetrahedral cells with scalar fields.
#[derive(Debug, Clone)]
pub struct TetMesh {
    name: String,
    points: Vec<DVec3>,
    cells: Vec<[u32; 8]>,
    model: DMat4,
    fields: Vec<ScalarField>,
    mtime: TimeStamp,
}

impl TetMesh {
    /// Creates a mesh from points and 8-slot cells.
    ///
    /// Fails when a used slot references a point that does not exist.
    pub fn new(name: impl Into<String>, points: Vec<DVec3>, cells: Vec<[u32; 8]>) -> Result<Self> {
        validate_cells(&cells, points.len())?;
        Ok(Self {
            name: name.into(),
            points,
            cells,
            model: DMat4::IDENTITY,
            fields: Vec::new(),
            mtime: TimeStamp::now(),
        })
    }

    /// Creates a purely tetrahedral mesh.
    pub fn from_tets(
        name: impl Into<String>,
        points: Vec<DVec3>,
        tets: Vec<[u32; 4]>,
    ) -> Result<Self> {
        let cells = tets
            .into_iter()
            .map(|[a, b, c, d]| [a, b, c, d, UNUSED, UNUSED, UNUSED, UNUSED])
            .collect();
        Self::new(name, points, cells)
    }

    /// Mesh name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells of any kind.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Point positions in model coordinates.
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// Replaces the point positions; the count must not change.
    pub fn set_points(&mut self, points: Vec<DVec3>) -> Result<()> {
        if points.len() != self.points.len() {
            return Err(ZsweepError::SizeMismatch {
                expected: self.points.len(),
                actual: points.len(),
            });
        }
        self.points = points;
        self.mtime.modified();
        Ok(())
    }

    /// Cells as 8-slot index arrays.
    pub fn cells(&self) -> &[[u32; 8]] {
        &self.cells
    }

    /// Type of cell `cell`.
    pub fn cell_kind(&self, cell: usize) -> CellKind {
        match self.cells[cell].iter().take_while(|&&i| i != UNUSED).count() {
            4 => CellKind::Tet,
            5 => CellKind::Pyramid,
            6 => CellKind::Wedge,
            8 => CellKind::Hex,
            n => CellKind::Other(n),
        }
    }

    /// Vertex ids of cell `cell` if it is a tetrahedron.
    pub fn tet(&self, cell: usize) -> Option<[u32; 4]> {
        let c = &self.cells[cell];
        (self.cell_kind(cell) == CellKind::Tet).then_some([c[0], c[1], c[2], c[3]])
    }

    /// Iterates `(cell index, vertex ids)` over the tetrahedra.
    pub fn tets(&self) -> impl Iterator<Item = (usize, [u32; 4])> + '_ {
        (0..self.cells.len()).filter_map(|i| self.tet(i).map(|t| (i, t)))
    }

    /// Model-to-world transform.
    pub fn model_matrix(&self) -> DMat4 {
        self.model
    }

    /// Sets the model-to-world transform.
    pub fn set_model_matrix(&mut self, model: DMat4) {
        self.model = model;
        self.mtime.modified();
    }

    /// Position of point `i` in world coordinates.
    pub fn world_point(&self, i: usize) -> DVec3 {
        self.model.transform_point3(self.points[i])
    }

    /// World-space bounding box.
    pub fn bounding_box(&self) -> Option<(DVec3, DVec3)> {
        if self.points.is_empty() {
            return None;
        }
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for i in 0..self.points.len() {
            let p = self.world_point(i);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }

    /// Largest bounding-box diagonal of any tetrahedron, in world units.
    pub fn max_cell_length(&self) -> f64 {
        self.tets()
            .map(|(_, tet)| {
                let mut min = DVec3::splat(f64::MAX);
                let mut max = DVec3::splat(f64::MIN);
                for v in tet {
                    let p = self.world_point(v as usize);
                    min = min.min(p);
                    max = max.max(p);
                }
                (max - min).length()
            })
            .fold(0.0, f64::max)
    }

    /// Adds a field; its tuple count must match its association.
    pub fn add_field(&mut self, field: ScalarField) -> Result<&mut ScalarField> {
        let expected = match field.association() {
            FieldAssociation::Points => self.points.len(),
            FieldAssociation::Cells => self.cells.len(),
        };
        if field.num_tuples() != expected {
            return Err(ZsweepError::SizeMismatch {
                expected,
                actual: field.num_tuples(),
            });
        }
        self.fields.retain(|f| f.name() != field.name());
        self.fields.push(field);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Adds a single-component point field.
    pub fn add_point_scalars(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<&mut ScalarField> {
        self.add_field(ScalarField::points(name, values))
    }

    /// Adds a single-component cell field.
    pub fn add_cell_scalars(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<&mut ScalarField> {
        self.add_field(ScalarField::cells(name, values))
    }

    /// All fields, in insertion order.
    pub fn fields(&self) -> &[ScalarField] {
        &self.fields
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Mutable field by name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut ScalarField> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Field to render: the named one, or the first when `name` is `None`.
    pub fn select_field(&self, name: Option<&str>) -> Result<&ScalarField> {
        match name {
            Some(name) => self
                .field(name)
                .ok_or_else(|| ZsweepError::ScalarArrayNotFound(name.to_string())),
            None => self.fields.first().ok_or(ZsweepError::MissingScalars),
        }
    }

    /// Modification time of the geometry and topology.
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

fn validate_cells(cells: &[[u32; 8]], num_points: usize) -> Result<()> {
    for (cell, ids) in cells.iter().enumerate() {
        for &index in ids.iter().take_while(|&&i| i != UNUSED) {
            if index as usize >= num_points {
                return Err(ZsweepError::InvalidVertexIndex { cell, index });
            }
        }
    }
    Ok(())
}
