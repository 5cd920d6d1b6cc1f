//! Face topology for the sweep.
//!
//! Every distinct triangular face of the tetrahedra is stored once, keyed by
//! its ascending vertex ids. Each vertex owns a *use-set*: the faces it is a
//! corner of. Faces not shared by two tetrahedra are external, and remember
//! whether their canonical winding faces out of the mesh.

use std::collections::HashMap;

use zsweep_core::TimeStamp;

use crate::scalar_field::{FieldAssociation, ScalarField};
use crate::tet_mesh::TetMesh;

/// Face stencil for tetrahedra: outward winding for a positively oriented tet.
pub const TET_FACE_STENCIL: [[usize; 3]; 4] = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];

/// Whether a face lies on the mesh boundary, and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSide {
    /// Shared by two tetrahedra.
    NotExternal,
    /// Boundary face whose canonical winding points out of the mesh.
    FrontFace,
    /// Boundary face whose canonical winding points into the mesh.
    BackFace,
}

/// A triangular face.
#[derive(Debug, Clone)]
pub struct Face {
    ids: [u32; 3],
    external: ExternalSide,
    scalars: [f64; 2],
    rendered: bool,
}

impl Face {
    /// Vertex ids in ascending order.
    pub fn ids(&self) -> [u32; 3] {
        self.ids
    }

    /// Boundary classification.
    pub fn external_side(&self) -> ExternalSide {
        self.external
    }

    /// Whether the face lies on the mesh boundary.
    pub fn is_external(&self) -> bool {
        self.external != ExternalSide::NotExternal
    }

    /// Cell scalar of the adjacent cell on `side`.
    ///
    /// Side 0 is the cell the canonical winding points out of; side 1 the
    /// cell it points into.
    pub fn scalar(&self, side: usize) -> f64 {
        self.scalars[side & 1]
    }

    /// Whether the face was already scan-converted in the current render.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }
}

/// Sorts a triangle's ids ascending.
///
/// Returns the sorted ids and whether the sort reversed the winding.
pub fn canonical_triangle(a: u32, b: u32, c: u32) -> ([u32; 3], bool) {
    // Rotations keep the winding; only the final swap flips it.
    let rotated = if a <= b && a <= c {
        [a, b, c]
    } else if b <= a && b <= c {
        [b, c, a]
    } else {
        [c, a, b]
    };
    if rotated[1] > rotated[2] {
        ([rotated[0], rotated[2], rotated[1]], true)
    } else {
        (rotated, false)
    }
}

/// Six times the signed volume of a tetrahedron, positive when
/// [`TET_FACE_STENCIL`] winds outward.
pub fn tet_orientation(mesh: &TetMesh, tet: [u32; 4]) -> f64 {
    let p = mesh.points();
    let [a, b, c, d] = tet.map(|i| p[i as usize]);
    (b - a).cross(c - a).dot(d - a)
}

/// What a [`UseSets`] table was built from.
#[derive(Debug, Clone, PartialEq)]
struct BuildSource {
    mesh: TimeStamp,
    cell_field: Option<(String, TimeStamp)>,
}

impl BuildSource {
    fn of(mesh: &TetMesh, scalars: &ScalarField) -> Self {
        let cell_field = (scalars.association() == FieldAssociation::Cells)
            .then(|| (scalars.name().to_string(), scalars.mtime()));
        Self {
            mesh: mesh.mtime(),
            cell_field,
        }
    }
}

/// Face arena plus per-vertex use-sets.
#[derive(Debug, Clone)]
pub struct UseSets {
    faces: Vec<Face>,
    lookup: HashMap<[u32; 3], u32>,
    use_sets: Vec<Vec<u32>>,
    skipped_cells: usize,
    source: BuildSource,
}

impl UseSets {
    /// Builds the face table of `mesh`.
    ///
    /// When `scalars` is cell-attached, each face stores the scalar (or
    /// magnitude) of the cells on both of its sides.
    pub fn build(mesh: &TetMesh, scalars: &ScalarField) -> Self {
        log::debug!("building use sets for '{}'", mesh.name());
        let cell_scalars = scalars.association() == FieldAssociation::Cells;
        let mut sets = Self {
            faces: Vec::new(),
            lookup: HashMap::new(),
            use_sets: vec![Vec::new(); mesh.num_points()],
            skipped_cells: 0,
            source: BuildSource::of(mesh, scalars),
        };

        for cell in 0..mesh.num_cells() {
            let Some(tet) = mesh.tet(cell) else {
                sets.skipped_cells += 1;
                continue;
            };
            let inverted = tet_orientation(mesh, tet) < 0.0;
            let cell_value = if cell_scalars {
                scalars.magnitude(cell)
            } else {
                0.0
            };
            for [a, b, c] in TET_FACE_STENCIL {
                let (ids, flipped) = canonical_triangle(tet[a], tet[b], tet[c]);
                if ids[0] == ids[1] || ids[1] == ids[2] {
                    continue;
                }
                // Side 0 when the canonical winding points out of this cell.
                let side = usize::from(flipped != inverted);
                sets.insert_face(ids, side, cell_value);
            }
        }

        if sets.skipped_cells > 0 {
            log::warn!(
                "'{}': skipped {} non-tetrahedral cells; tetrahedralize the mesh to render them",
                mesh.name(),
                sets.skipped_cells
            );
        }
        log::debug!(
            "use sets built: {} faces, {} external",
            sets.faces.len(),
            sets.faces.iter().filter(|f| f.is_external()).count()
        );
        sets
    }

    fn insert_face(&mut self, ids: [u32; 3], side: usize, cell_value: f64) {
        if let Some(&existing) = self.lookup.get(&ids) {
            let face = &mut self.faces[existing as usize];
            face.external = ExternalSide::NotExternal;
            face.scalars[side] = cell_value;
            return;
        }
        let mut scalars = [0.0; 2];
        scalars[side] = cell_value;
        let external = if side == 0 {
            ExternalSide::FrontFace
        } else {
            ExternalSide::BackFace
        };
        #[allow(clippy::cast_possible_truncation)]
        let index = self.faces.len() as u32;
        self.faces.push(Face {
            ids,
            external,
            scalars,
            rendered: false,
        });
        self.lookup.insert(ids, index);
        for v in ids {
            self.use_sets[v as usize].push(index);
        }
    }

    /// Whether this table is still valid for `mesh` rendered with `scalars`.
    ///
    /// Point scalars do not enter the table, so only the geometry matters for
    /// them; cell scalars must also be the same, unmodified field.
    pub fn is_current(&self, mesh: &TetMesh, scalars: &ScalarField) -> bool {
        self.source == BuildSource::of(mesh, scalars)
    }

    /// All faces.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Face by index.
    pub fn face(&self, index: u32) -> &Face {
        &self.faces[index as usize]
    }

    /// Index of the face with the given (canonical) ids.
    pub fn find(&self, ids: [u32; 3]) -> Option<u32> {
        self.lookup.get(&ids).copied()
    }

    /// Faces incident to `vertex`.
    pub fn use_set(&self, vertex: u32) -> &[u32] {
        self.use_sets
            .get(vertex as usize)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Number of vertices with a use-set slot.
    pub fn num_vertices(&self) -> usize {
        self.use_sets.len()
    }

    /// Cells that were not tetrahedra.
    pub fn skipped_cells(&self) -> usize {
        self.skipped_cells
    }

    /// Clears every face's rendered flag.
    pub fn set_not_rendered(&mut self) {
        for face in &mut self.faces {
            face.rendered = false;
        }
    }

    /// Marks a face as scan-converted.
    pub fn mark_rendered(&mut self, index: u32) {
        self.faces[index as usize].rendered = true;
    }
}
