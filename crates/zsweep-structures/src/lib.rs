//! Structure implementations for zsweep-rs.
//!
//! - [`TetMesh`]: points, 8-slot cells and named scalar fields
//! - [`ScalarField`] and the [`ScalarInfo`] descriptor handed to integrators
//! - [`UseSets`]: the deduplicated face table and per-vertex use-sets

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod scalar_field;
pub mod tet_mesh;
pub mod use_set;

pub use scalar_field::{FieldAssociation, ScalarField, ScalarInfo};
pub use tet_mesh::{CellKind, TetMesh, UNUSED};
pub use use_set::{canonical_triangle, tet_orientation, ExternalSide, Face, UseSets, TET_FACE_STENCIL};
