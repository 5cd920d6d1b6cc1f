//! Renders a tetrahedralized cube holding a radial density field.
//!
//! Run with `RUST_LOG=info cargo run --example render_cube` to see the
//! renderer's progress messages.

use zsweep::*;

/// Splits an `n`x`n`x`n` grid of unit cubes into six tetrahedra each.
fn cube_grid(n: u32) -> Result<TetMesh> {
    let side = n + 1;
    let index = |x: u32, y: u32, z: u32| x + side * (y + side * z);

    let mut points = Vec::new();
    for z in 0..side {
        for y in 0..side {
            for x in 0..side {
                points.push(DVec3::new(f64::from(x), f64::from(y), f64::from(z)) / f64::from(n));
            }
        }
    }

    let mut tets = Vec::new();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let corner = |i: u32| index(x + (i & 1), y + ((i >> 1) & 1), z + ((i >> 2) & 1));
                for [a, b] in [[1, 3], [1, 5], [2, 3], [2, 6], [4, 5], [4, 6]] {
                    tets.push([corner(0), corner(a), corner(b), corner(7)]);
                }
            }
        }
    }
    TetMesh::from_tets("cube", points, tets)
}

fn main() -> Result<()> {
    init_logging();

    let mut mesh = cube_grid(8)?;
    let density = mesh
        .points()
        .iter()
        .map(|p| 1.0 - (p.distance(DVec3::splat(0.5)) / 0.87).min(1.0))
        .collect();
    mesh.add_point_scalars("density", density)?;

    let mut property = VolumeProperty::new();
    property.set_color(0, ColorTransferFunction::from_preset(ColorPreset::Viridis, (0.0, 1.0)));
    property.set_scalar_opacity(
        0,
        PiecewiseFunction::from_points([(0.0, 0.0), (0.4, 0.5), (1.0, 6.0)]),
    );

    let mut camera = Camera::default();
    camera.look_at_box(DVec3::ZERO, DVec3::ONE);

    let options = RenderOptions::new().with_integrator(IntegratorKind::PreIntegration);
    render_to_file("zsweep_cube.png", &mesh, &property, &camera, 512, 512, options)?;
    log::info!("wrote zsweep_cube.png");
    Ok(())
}
