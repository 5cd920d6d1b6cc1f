//! End-to-end renders of small meshes.

use std::time::Duration;

use proptest::prelude::*;
use zsweep::*;

const SIZE: u32 = 32;

/// Unit cube centered at the origin, split into six tetrahedra around the
/// main diagonal.
fn cube() -> TetMesh {
    let points = (0..8)
        .map(|i| {
            DVec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    let tets = vec![
        [0, 1, 3, 7],
        [0, 1, 5, 7],
        [0, 2, 3, 7],
        [0, 2, 6, 7],
        [0, 4, 5, 7],
        [0, 4, 6, 7],
    ];
    TetMesh::from_tets("cube", points, tets).unwrap()
}

fn uniform_property(opacity: f64) -> VolumeProperty {
    let mut color = ColorTransferFunction::new();
    color.add_rgb_point(0.0, DVec3::new(1.0, 0.5, 0.25));
    color.add_rgb_point(1.0, DVec3::new(1.0, 0.5, 0.25));
    VolumeProperty::with_functions(
        color,
        PiecewiseFunction::from_points([(0.0, opacity), (1.0, opacity)]),
    )
}

/// Looking down -Z; depth is `(1 - z) / 2`.
fn top_view() -> RenderView {
    RenderView::new(
        [SIZE, SIZE],
        DMat4::IDENTITY,
        DMat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0),
    )
}

fn options(integrator: IntegratorKind) -> RenderOptions {
    RenderOptions::new()
        .with_integrator(integrator)
        .with_auto_adjust(false)
}

fn render(mesh: &TetMesh, property: &VolumeProperty, options: RenderOptions) -> RenderedImage {
    ZSweepMapper::new(options)
        .render(mesh, property, &top_view(), None, &mut NeverAbort)
        .unwrap()
}

fn assert_images_close(a: &RenderedImage, b: &RenderedImage, tolerance: f32) {
    assert_eq!(a.in_use_size, b.in_use_size);
    for (i, (p, q)) in a.float_rgba.iter().zip(&b.float_rgba).enumerate() {
        for c in 0..4 {
            assert!(
                (p[c] - q[c]).abs() <= tolerance,
                "pixel {i}: {p:?} vs {q:?}"
            );
        }
    }
}

#[test]
fn uniform_cube_follows_beer_lambert() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let image = render(&mesh, &uniform_property(2.0), options(IntegratorKind::Linear));

    // Inside the silhouette every ray crosses one unit of material.
    let alpha = (1.0 - (-2.0f64).exp()) as f32;
    let inside = image.pixel(13, 18);
    assert!((inside[3] - alpha).abs() < 1e-4, "{inside:?}");
    assert!((inside[1] - 0.5 * alpha).abs() < 1e-4, "{inside:?}");
    assert_eq!(image.pixel(2, 2), [0.0; 4]);
    assert_eq!(image.pixel(30, 29), [0.0; 4]);
    assert!(image.float_rgba.iter().all(|p| (0.0..=1.0 + 1e-6).contains(&p[3])));

    let bytes = image.rgba.pixel(13, 18);
    assert_eq!(bytes[0], (inside[0].clamp(0.0, 1.0) * 255.0) as u8);
    assert_eq!(image.rgba.pixel(2, 2), [0, 0, 0, 0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn uniform_alpha_matches_any_opacity(opacity in 0.05f64..6.0) {
        let mut mesh = cube();
        mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
        let image = render(&mesh, &uniform_property(opacity), options(IntegratorKind::Linear));
        let expected = (1.0 - (-opacity).exp()) as f32;
        prop_assert!((image.pixel(13, 18)[3] - expected).abs() < 1e-4);
    }
}

#[test]
fn cell_scalars_match_point_scalars_on_uniform_data() {
    let mut points = cube();
    points.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let mut cells = cube();
    cells.add_cell_scalars("c", vec![0.5; 6]).unwrap();
    let property = uniform_property(1.5);

    let by_points = render(&points, &property, options(IntegratorKind::Linear));
    let mut mapper = ZSweepMapper::new(options(IntegratorKind::Auto));
    let by_cells = mapper
        .render(&cells, &property, &top_view(), None, &mut NeverAbort)
        .unwrap();
    assert_eq!(mapper.integrator_name(), Some("homogeneous"));
    assert_images_close(&by_points, &by_cells, 1e-4);
}

#[test]
fn sweep_directions_agree() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", (0..8).map(|i| f64::from(i) / 7.0).collect())
        .unwrap();
    let mut color = ColorTransferFunction::new();
    color.add_rgb_point(0.0, DVec3::new(0.0, 0.0, 1.0));
    color.add_rgb_point(1.0, DVec3::new(1.0, 0.0, 0.0));
    let property = VolumeProperty::with_functions(
        color,
        PiecewiseFunction::from_points([(0.0, 0.2), (1.0, 3.0)]),
    );

    let front = render(&mesh, &property, options(IntegratorKind::Linear));
    let back = render(
        &mesh,
        &property,
        options(IntegratorKind::Linear).with_sweep_direction(SweepDirection::BackToFront),
    );
    // The cube's sides are seen edge-on, so silhouette pixels hold exit
    // fragments halfway along the ray; the interior is unambiguous.
    for y in 9..24 {
        for x in 9..24 {
            let (a, b) = (front.pixel(x, y), back.pixel(x, y));
            for c in 0..4 {
                assert!((a[c] - b[c]).abs() < 1e-4, "({x}, {y}): {a:?} vs {b:?}");
            }
        }
    }
    assert!(front.pixel(13, 18)[3] > 0.1);
}

#[test]
fn pre_integration_tracks_linear() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", (0..8).map(|i| if i & 4 == 0 { 0.0 } else { 1.0 }).collect())
        .unwrap();
    let property = VolumeProperty::with_functions(
        {
            let mut color = ColorTransferFunction::new();
            color.add_rgb_point(0.0, DVec3::ONE);
            color.add_rgb_point(1.0, DVec3::ONE);
            color
        },
        PiecewiseFunction::from_points([(0.0, 0.0), (1.0, 2.0)]),
    );

    let linear = render(&mesh, &property, options(IntegratorKind::Linear));
    let table = render(
        &mesh,
        &property,
        options(IntegratorKind::PreIntegration)
            .with_pre_integration(PreIntegrationConfig::default().with_resolution(64, 64)),
    );
    let (a, b) = (linear.pixel(13, 18), table.pixel(13, 18));
    assert!(a[3] > 0.1);
    assert!((a[3] - b[3]).abs() < 0.05, "{a:?} vs {b:?}");
}

#[test]
fn depth_buffer_in_front_blocks_the_volume() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let property = uniform_property(1.0);
    let wall = DepthBuffer::filled(SIZE as usize, SIZE as usize, 0.0);

    let mut mapper = ZSweepMapper::new(
        options(IntegratorKind::Linear).with_intermix_intersecting_geometry(true),
    );
    let blocked = mapper
        .render(&mesh, &property, &top_view(), Some(&wall), &mut NeverAbort)
        .unwrap();
    assert!(blocked.float_rgba.iter().all(|p| p[3] == 0.0));
    assert!(blocked.min_bounds_depth.is_some());

    // Without intermixing the buffer is ignored.
    let mut mapper = ZSweepMapper::new(options(IntegratorKind::Linear));
    let open = mapper
        .render(&mesh, &property, &top_view(), Some(&wall), &mut NeverAbort)
        .unwrap();
    assert!(open.pixel(13, 18)[3] > 0.5);
}

#[test]
fn aborted_render_is_flagged_and_bounded() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let mut mapper = ZSweepMapper::new(options(IntegratorKind::Linear));
    let mut polls = 0;
    let image = mapper
        .render(&mesh, &uniform_property(4.0), &top_view(), None, &mut || {
            polls += 1;
            polls > 5
        })
        .unwrap();
    assert!(image.aborted);
    assert_eq!(image.stats.events, 5);
    assert!(image.float_rgba.iter().all(|p| (0.0..=1.0).contains(&p[3])));
    assert_eq!(mapper.fragment_pool().in_use(), 0);
    assert!(mapper.last_render_time().is_none());
}

#[test]
fn fragment_pool_is_reused_across_renders() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let property = uniform_property(1.0);
    let mut mapper = ZSweepMapper::new(options(IntegratorKind::Linear));

    mapper
        .render(&mesh, &property, &top_view(), None, &mut NeverAbort)
        .unwrap();
    let blocks = mapper.fragment_pool().blocks();
    let capacity = mapper.fragment_pool().capacity();
    assert!(blocks > 0);
    assert_eq!(mapper.fragment_pool().in_use(), 0);

    let second = mapper
        .render(&mesh, &property, &top_view(), None, &mut NeverAbort)
        .unwrap();
    assert_eq!(mapper.fragment_pool().blocks(), blocks);
    assert_eq!(mapper.fragment_pool().capacity(), capacity);
    assert!(second.stats.faces_rasterized > 0);
}

#[test]
fn non_tetrahedral_cells_are_skipped() {
    let mut points: Vec<DVec3> = cube().points().to_vec();
    points.push(DVec3::new(0.0, 0.0, 2.0));
    let hexahedron = [0, 1, 3, 2, 4, 5, 7, 6];
    let tet = [4, 5, 7, 8, UNUSED, UNUSED, UNUSED, UNUSED];
    let mut mesh = TetMesh::new("mixed", points, vec![hexahedron, tet]).unwrap();
    mesh.add_point_scalars("s", vec![0.5; 9]).unwrap();

    let mut mapper = ZSweepMapper::new(options(IntegratorKind::Linear));
    let image = mapper
        .render(&mesh, &uniform_property(1.0), &top_view(), None, &mut NeverAbort)
        .unwrap();
    let sets = mapper.use_sets().unwrap();
    assert_eq!(sets.skipped_cells(), 1);
    assert_eq!(sets.faces().len(), 4);
    assert!(!image.aborted);
}

#[test]
fn automatic_sample_distance_stays_within_bounds() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let mut mapper = ZSweepMapper::new(
        RenderOptions::new()
            .with_integrator(IntegratorKind::Linear)
            .with_sample_distance_bounds(1.0, 4.0),
    );
    let view = top_view().with_allocated_render_time(Duration::from_nanos(1));
    for _ in 0..3 {
        let image = mapper
            .render(&mesh, &uniform_property(1.0), &view, None, &mut NeverAbort)
            .unwrap();
        assert!((1.0..=4.0).contains(&image.image_sample_distance));
    }
    assert_eq!(mapper.image_sample_distance(), 4.0);
}

#[test]
fn headless_render_through_a_camera() {
    let mut mesh = cube();
    mesh.add_point_scalars("s", vec![0.5; 8]).unwrap();
    let mut camera = Camera::default();
    camera.look_at_box(DVec3::splat(-0.5), DVec3::splat(0.5));

    let image = render_to_image(
        &mesh,
        &uniform_property(1.0),
        &camera,
        48,
        32,
        options(IntegratorKind::PartialPreIntegration),
    )
    .unwrap();
    assert_eq!(image.in_use_size, [48, 32]);
    assert!(image.pixel(24, 16)[3] > 0.3);
    assert_eq!(image.pixel(0, 0), [0.0; 4]);

    let path = std::env::temp_dir().join(format!("zsweep-headless-{}.png", std::process::id()));
    render_to_file(
        &path,
        &mesh,
        &uniform_property(1.0),
        &camera,
        48,
        32,
        options(IntegratorKind::Linear),
    )
    .unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn options_load_from_json() {
    let options = RenderOptions::from_json_str(
        r#"{ "integrator": "Homogeneous", "sweep_direction": "BackToFront", "max_pixel_list_size": 4 }"#,
    )
    .unwrap();
    let mut mesh = cube();
    mesh.add_cell_scalars("c", vec![0.5; 6]).unwrap();
    let mut mapper = ZSweepMapper::new(options);
    let image = mapper
        .render(&mesh, &uniform_property(1.0), &top_view(), None, &mut NeverAbort)
        .unwrap();
    assert_eq!(mapper.integrator_name(), Some("homogeneous"));
    assert!(image.pixel(13, 18)[3] > 0.5);
}
