//! zsweep-rs: a CPU volume renderer for unstructured tetrahedral meshes.
//!
//! The renderer sweeps a plane through the projected mesh vertex by vertex,
//! scan-converts the faces it meets into per-pixel fragment lists sorted by
//! depth, and composites ray segments between consecutive fragments as soon
//! as no face still to come can fall in front of them. It needs no
//! depth-sorted or cycle-free mesh, and its memory stays bounded by the
//! pixel-list size limit.
//!
//! # Quick Start
//!
//! ```no_run
//! use zsweep::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut mesh = TetMesh::from_tets(
//!         "tet",
//!         vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z],
//!         vec![[0, 1, 2, 3]],
//!     )?;
//!     mesh.add_point_scalars("density", vec![0.0, 0.3, 0.6, 1.0])?;
//!
//!     let mut property = VolumeProperty::new();
//!     property.set_color(0, ColorTransferFunction::from_preset(ColorPreset::Viridis, (0.0, 1.0)));
//!
//!     let mut camera = Camera::default();
//!     camera.look_at_box(DVec3::ZERO, DVec3::ONE);
//!     render_to_file("tet.png", &mesh, &property, &camera, 512, 512, RenderOptions::new())
//! }
//! ```
//!
//! # Integrators
//!
//! - [`LinearIntegrator`] - exact for piecewise-linear transfer functions
//! - [`PartialPreIntegrator`] - the same with a tabulated attenuation integral
//! - [`PreIntegrator`] - full lookup tables, fastest per segment
//! - [`HomogeneousIntegrator`] - constant scalar per cell
//!
//! [`IntegratorKind::Auto`] picks one from the data.

mod headless;
mod mapper;

pub use headless::{render_to_file, render_to_image};
pub use mapper::{RenderView, RenderedImage, ZSweepMapper};

// Re-export core types
pub use zsweep_core::{
    ColorPreset, ColorSpace, ColorTransferFunction, ComponentColor, ComponentProperty, DMat4,
    DVec3, DVec4, IntegratorKind, PiecewiseFunction, PreIntegrationConfig, RenderOptions, Result,
    SweepDirection, TimeStamp, VolumeProperty, ZsweepError,
};

// Re-export structures
pub use zsweep_structures::{
    CellKind, FieldAssociation, ScalarField, ScalarInfo, TetMesh, UseSets, UNUSED,
};

// Re-export render types
pub use zsweep_render::{
    save_image, save_to_buffer, AbortCheck, Camera, DepthBuffer, FloatImage, HomogeneousIntegrator,
    LinearIntegrator, NeverAbort, PartialPreIntegrator, PreIntegrator, ProjectionMode,
    RayIntegrator, Rgba8Image, ScreenshotOptions, SweepStats,
};

/// Initializes `env_logger` for the process. Repeated calls are harmless.
pub fn init_logging() {
    if env_logger::try_init().is_ok() {
        log::info!("zsweep-rs logging initialized");
    }
}
