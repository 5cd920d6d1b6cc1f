//! One-shot rendering to an image buffer or file.
//!
//! Each call builds a fresh [`ZSweepMapper`] with automatic sample-distance
//! adjustment off, so the image is rendered at full resolution. Keep a mapper
//! around instead when rendering many frames of the same mesh.

use std::path::Path;

use zsweep_core::{RenderOptions, Result, VolumeProperty};
use zsweep_render::{save_image, Camera, NeverAbort, ScreenshotOptions};
use zsweep_structures::TetMesh;

use crate::mapper::{RenderView, RenderedImage, ZSweepMapper};

/// Renders `mesh` through `camera` at `width` x `height`.
///
/// # Example
/// ```no_run
/// use zsweep::*;
///
/// let mut mesh = TetMesh::from_tets(
///     "tet",
///     vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z],
///     vec![[0, 1, 2, 3]],
/// )?;
/// mesh.add_point_scalars("density", vec![0.0, 0.3, 0.6, 1.0])?;
/// let mut camera = Camera::default();
/// camera.look_at_box(DVec3::ZERO, DVec3::ONE);
/// let image = render_to_image(&mesh, &VolumeProperty::new(), &camera, 320, 240, RenderOptions::new())?;
/// assert_eq!(image.in_use_size, [320, 240]);
/// # Ok::<(), ZsweepError>(())
/// ```
pub fn render_to_image(
    mesh: &TetMesh,
    property: &VolumeProperty,
    camera: &Camera,
    width: u32,
    height: u32,
    options: RenderOptions,
) -> Result<RenderedImage> {
    let mut mapper = ZSweepMapper::new(options.with_auto_adjust(false));
    let view = RenderView::from_camera(camera, [width, height]);
    mapper.render(mesh, property, &view, None, &mut NeverAbort)
}

/// Renders `mesh` and saves the result as PNG or JPEG, flattened over black.
pub fn render_to_file(
    filename: impl AsRef<Path>,
    mesh: &TetMesh,
    property: &VolumeProperty,
    camera: &Camera,
    width: u32,
    height: u32,
    options: RenderOptions,
) -> Result<()> {
    let image = render_to_image(mesh, property, camera, width, height, options)?;
    save_image(filename, &image.rgba, &ScreenshotOptions::default())
}
