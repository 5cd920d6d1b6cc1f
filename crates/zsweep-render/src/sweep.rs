//! The Z-sweep: events pop in depth order, the faces around each vertex are
//! scan-converted into the pixel lists, and a depth target trailing the sweep
//! decides when the fragments in front of it can be composited.
//!
//! The target is the farthest depth reached by any face incident to the
//! vertices seen so far. Once the sweep passes it, no face still to come can
//! insert a fragment in front of it, so every segment ending before the
//! target is final.

use zsweep_core::SweepDirection;
use zsweep_structures::UseSets;

use crate::buffers::{DepthBuffer, FloatImage};
use crate::integrator::{composite_over, RayIntegrator};
use crate::pixel_list::{Fragment, PixelListStore};
use crate::projector::{EventQueue, ProjectedVertex, SCALAR_INDEX};
use crate::rasterizer::{PixelBounds, Rasterizer};

/// Polled once per event to let the caller interrupt a render.
pub trait AbortCheck {
    /// Returns true to stop the sweep.
    fn should_abort(&mut self) -> bool;
}

impl<F: FnMut() -> bool> AbortCheck for F {
    fn should_abort(&mut self) -> bool {
        self()
    }
}

/// Never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverAbort;

impl AbortCheck for NeverAbort {
    fn should_abort(&mut self) -> bool {
        false
    }
}

/// Counters of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Vertices popped from the event queue.
    pub events: usize,
    /// Faces scan-converted.
    pub faces_rasterized: usize,
    /// Compositing passes, including the final flush.
    pub composite_passes: usize,
    /// Passes forced by an overlong pixel list.
    pub forced_composites: usize,
    /// Segments handed to the integrator.
    pub segments: usize,
    /// Whether the sweep was interrupted.
    pub aborted: bool,
}

/// One sweep over a projected mesh.
pub struct Sweep<'a> {
    use_sets: &'a mut UseSets,
    vertices: &'a [ProjectedVertex],
    queue: &'a mut EventQueue,
    store: &'a mut PixelListStore,
    image: &'a mut FloatImage,
    integrator: &'a dyn RayIntegrator,
    rasterizer: Rasterizer,
    depth: Option<(&'a DepthBuffer, f64)>,
    direction: SweepDirection,
    cell_scalars: bool,
    stats: SweepStats,
}

impl<'a> Sweep<'a> {
    /// Prepares a sweep over the events in `queue`, rendering into the
    /// in-use part of `image` (the size of `store`).
    pub fn new(
        use_sets: &'a mut UseSets,
        vertices: &'a [ProjectedVertex],
        queue: &'a mut EventQueue,
        store: &'a mut PixelListStore,
        image: &'a mut FloatImage,
        integrator: &'a dyn RayIntegrator,
        cell_scalars: bool,
    ) -> Self {
        let direction = queue.direction();
        let rasterizer = Rasterizer::new(store.width(), store.height(), direction, cell_scalars);
        Self {
            use_sets,
            vertices,
            queue,
            store,
            image,
            integrator,
            rasterizer,
            depth: None,
            direction,
            cell_scalars,
            stats: SweepStats::default(),
        }
    }

    /// Drops segments not entirely in front of `depth`, sampled at
    /// `sample_distance` viewport pixels per image pixel.
    pub fn with_depth_buffer(mut self, depth: &'a DepthBuffer, sample_distance: f64) -> Self {
        self.depth = Some((depth, sample_distance));
        self
    }

    /// Runs the sweep to completion or until `abort` fires.
    ///
    /// On abort only the segments before the last reached target are
    /// composited. The pixel lists are empty afterwards either way.
    pub fn run(mut self, abort: &mut dyn AbortCheck) -> SweepStats {
        let Some(first) = self.queue.peek() else {
            return self.stats;
        };
        log::debug!(
            "sweep: {} events, {:?}",
            self.queue.len(),
            self.direction
        );
        self.use_sets.set_not_rendered();
        self.store.reset_max_size_reached();
        self.rasterizer.set_bounds(PixelBounds::EMPTY);

        let mut previous_target = first.z;
        let mut target = first.z;
        loop {
            if abort.should_abort() {
                self.stats.aborted = true;
                break;
            }
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.stats.events += 1;
            if self.use_sets.use_set(event.vertex).is_empty() {
                continue;
            }
            let current = event.z;

            if previous_target == current {
                target = self.extend_target(target, event.vertex);
            }
            if self.direction.precedes(target, current) {
                self.composite(target);
                previous_target = target;
                target = self.extend_target(target, event.vertex);
            } else if self.store.max_size_reached() {
                self.stats.forced_composites += 1;
                self.composite(current);
            }

            self.rasterize_use_set(event.vertex);
        }

        // Everything before `previous_target` is already composited, so an
        // aborted sweep only has to release its lists.
        if self.stats.aborted {
            log::debug!("sweep aborted after {} events", self.stats.events);
        } else {
            log::debug!("sweep: flushing");
            self.composite(self.direction.flush_target());
        }
        self.store.clear_all();
        log::debug!(
            "sweep done: {} faces, {} fragments, {} segments",
            self.stats.faces_rasterized,
            self.rasterizer.fragments_emitted(),
            self.stats.segments
        );
        self.stats
    }

    /// Latest of `target` and the depths of every face around `vertex`.
    fn extend_target(&self, mut target: f64, vertex: u32) -> f64 {
        for &index in self.use_sets.use_set(vertex) {
            for id in self.use_sets.face(index).ids() {
                let v = &self.vertices[id as usize];
                if v.visible {
                    target = self.direction.later(target, v.z);
                }
            }
        }
        target
    }

    fn rasterize_use_set(&mut self, vertex: u32) {
        let count = self.use_sets.use_set(vertex).len();
        for k in 0..count {
            let index = self.use_sets.use_set(vertex)[k];
            let face = self.use_sets.face(index);
            if face.is_rendered() {
                continue;
            }
            if self.rasterizer.rasterize_face(face, self.vertices, self.store) {
                self.stats.faces_rasterized += 1;
            }
            self.use_sets.mark_rendered(index);
        }
    }

    /// Integrates, in every touched pixel, the segments ending before
    /// `target`, then shrinks the touched box to pixels still holding a
    /// segment.
    fn composite(&mut self, target: f64) {
        self.stats.composite_passes += 1;
        let bounds = self.rasterizer.bounds();
        let mut remaining = PixelBounds::EMPTY;
        if !bounds.is_empty() {
            for y in bounds.min[1]..=bounds.max[1] {
                for x in bounds.min[0]..=bounds.max[0] {
                    #[allow(clippy::cast_sign_loss)]
                    let (px, py) = (x as usize, y as usize);
                    self.composite_pixel(px, py, target);
                    if self.store.len(px, py) >= 2 {
                        remaining.include(x, y);
                    }
                }
            }
        }
        self.rasterizer.set_bounds(remaining);
        self.store.reset_max_size_reached();
    }

    fn composite_pixel(&mut self, x: usize, y: usize, target: f64) {
        let (Some(&first), Some(&second)) = (self.store.front(x, y), self.store.second(x, y)) else {
            return;
        };
        let limit = self
            .depth
            .map_or(f64::INFINITY, |(buffer, isd)| buffer.sample(x, y, isd));
        let (mut current, mut next) = (first, second);
        let mut done = !self.direction.precedes(current.z, target)
            || !self.direction.precedes(next.z, target);
        while !done {
            if !current.exit && current.z < limit && next.z < limit && current.z != next.z {
                self.integrate_segment(x, y, &current, &next);
            }
            self.store.pop_front(x, y);
            match (self.store.front(x, y), self.store.second(x, y)) {
                (Some(&c), Some(&n)) => {
                    current = c;
                    next = n;
                    done = !self.direction.precedes(next.z, target);
                }
                _ => done = true,
            }
        }
    }

    fn integrate_segment(&mut self, x: usize, y: usize, current: &Fragment, next: &Fragment) {
        let length = (0..3)
            .map(|i| (next.values[i] - current.values[i]).powi(2))
            .sum::<f64>()
            .sqrt();
        if length == 0.0 {
            return;
        }
        let near = current.values[SCALAR_INDEX];
        // Cell scalars are constant across the cell the segment crosses.
        let far = if self.cell_scalars {
            near
        } else {
            next.values[SCALAR_INDEX]
        };
        let pixel = self.image.pixel_mut(x, y);
        match self.direction {
            SweepDirection::FrontToBack => {
                self.integrator.integrate(&[length], &[near], &[far], pixel);
            }
            SweepDirection::BackToFront => {
                // The ray runs towards the eye, from `next` to `current`.
                let mut segment = [0.0f32; 4];
                self.integrator.integrate(&[length], &[far], &[near], &mut segment);
                composite_over(pixel, segment.map(f64::from));
            }
        }
        self.stats.segments += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::LinearIntegrator;
    use crate::projector::{Projection, ScreenMapping};
    use glam::{DMat4, DVec3};
    use zsweep_core::{ColorTransferFunction, PiecewiseFunction, VolumeProperty};
    use zsweep_structures::{ScalarField, ScalarInfo, TetMesh};

    const SIZE: usize = 16;

    fn bipyramid() -> TetMesh {
        TetMesh::from_tets(
            "bipyramid",
            vec![
                DVec3::new(-0.5, -0.5, 0.5),
                DVec3::new(0.5, -0.5, 0.5),
                DVec3::new(0.0, 0.5, 0.5),
                DVec3::new(0.0, 0.0, 0.9),
                DVec3::new(0.0, 0.0, 0.1),
            ],
            vec![[0, 1, 2, 3], [0, 1, 2, 4]],
        )
        .unwrap()
    }

    fn white_integrator(opacity: f64) -> LinearIntegrator {
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::ONE);
        color.add_rgb_point(1.0, DVec3::ONE);
        let property = VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, opacity), (1.0, opacity)]),
        );
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0)]))
            .unwrap();
        integrator
    }

    struct Fixture {
        sets: UseSets,
        projection: Projection,
        queue: EventQueue,
        store: PixelListStore,
        image: FloatImage,
    }

    fn fixture(mesh: &TetMesh, field: &ScalarField, direction: SweepDirection, max_size: usize) -> Fixture {
        // Looking down -Z with depth (1 - z) / 2.
        let projection_matrix = DMat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        let mapping = ScreenMapping::new(mesh, projection_matrix, [SIZE as u32, SIZE as u32]);
        let mut queue = EventQueue::new(direction);
        let mut projection = Projection::new();
        projection.project(mesh, field, &mapping, &mut queue);
        let mut image = FloatImage::new();
        image.resize([SIZE, SIZE]);
        Fixture {
            sets: UseSets::build(mesh, field),
            projection,
            queue,
            store: PixelListStore::new(SIZE, SIZE, direction, max_size),
            image,
        }
    }

    fn run(f: &mut Fixture, integrator: &LinearIntegrator, cells: bool, depth: Option<&DepthBuffer>, abort: &mut dyn AbortCheck) -> SweepStats {
        let mut sweep = Sweep::new(
            &mut f.sets,
            f.projection.vertices(),
            &mut f.queue,
            &mut f.store,
            &mut f.image,
            integrator,
            cells,
        );
        if let Some(depth) = depth {
            sweep = sweep.with_depth_buffer(depth, 1.0);
        }
        sweep.run(abort)
    }

    fn expected_alpha(opacity: f64, length: f64) -> f32 {
        (1.0 - (-opacity * length).exp()) as f32
    }

    #[test]
    fn test_apex_pixel_integrates_full_thickness() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        let stats = run(&mut f, &integrator, false, None, &mut NeverAbort);

        assert_eq!(stats.events, 5);
        assert_eq!(stats.faces_rasterized, 7);
        assert!(!stats.aborted);
        let pixel = f.image.pixel(8, 8);
        // Apex to shared face to apex: 0.4 + 0.4 in world units.
        let alpha = expected_alpha(1.0, 0.8);
        assert!((pixel[3] - alpha).abs() < 1e-5, "{pixel:?}");
        assert!((pixel[0] - alpha).abs() < 1e-5);
        assert_eq!(f.store.pool().in_use(), 0);
    }

    #[test]
    fn test_back_to_front_matches_front_to_back() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(2.0);

        let mut ftb = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        run(&mut ftb, &integrator, false, None, &mut NeverAbort);
        let mut btf = fixture(&mesh, &field, SweepDirection::BackToFront, 64);
        run(&mut btf, &integrator, false, None, &mut NeverAbort);

        for y in 0..SIZE {
            for x in 0..SIZE {
                let (a, b) = (ftb.image.pixel(x, y), btf.image.pixel(x, y));
                for c in 0..4 {
                    assert!((a[c] - b[c]).abs() < 1e-5, "({x}, {y}): {a:?} vs {b:?}");
                }
            }
        }
        assert!((btf.image.pixel(8, 8)[3] - expected_alpha(2.0, 0.8)).abs() < 1e-5);
    }

    #[test]
    fn test_outside_pixels_stay_empty() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        run(&mut f, &integrator, false, None, &mut NeverAbort);
        assert_eq!(f.image.pixel(0, 0), [0.0; 4]);
        assert_eq!(f.image.pixel(15, 15), [0.0; 4]);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let a = f.image.pixel(x, y)[3];
                assert!((0.0..=1.0).contains(&a));
            }
        }
    }

    #[test]
    fn test_small_lists_force_compositing() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut reference = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        run(&mut reference, &integrator, false, None, &mut NeverAbort);

        let mut forced = fixture(&mesh, &field, SweepDirection::FrontToBack, 2);
        let stats = run(&mut forced, &integrator, false, None, &mut NeverAbort);
        assert!(stats.forced_composites > 0);
        let (a, b) = (reference.image.pixel(8, 8), forced.image.pixel(8, 8));
        assert!((a[3] - b[3]).abs() < 1e-5, "{a:?} vs {b:?}");
    }

    #[test]
    fn test_depth_buffer_in_front_blocks_everything() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        let depth = DepthBuffer::filled(SIZE, SIZE, 0.01);
        run(&mut f, &integrator, false, Some(&depth), &mut NeverAbort);
        assert!(f.image.pixels().iter().all(|p| p[3] == 0.0));
    }

    #[test]
    fn test_depth_buffer_behind_changes_nothing() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        let depth = DepthBuffer::filled(SIZE, SIZE, 1.0);
        run(&mut f, &integrator, false, Some(&depth), &mut NeverAbort);
        assert!((f.image.pixel(8, 8)[3] - expected_alpha(1.0, 0.8)).abs() < 1e-5);
    }

    #[test]
    fn test_abort_before_first_event() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        let stats = run(&mut f, &integrator, false, None, &mut || true);
        assert!(stats.aborted);
        assert_eq!(stats.events, 0);
        assert_eq!(stats.composite_passes, 0);
        assert!(f.image.pixels().iter().all(|p| p[3] == 0.0));
        assert_eq!(f.store.pool().in_use(), 0);
    }

    #[test]
    fn test_abort_midway_keeps_alpha_bounded() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(5.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        let mut polls = 0;
        let stats = run(&mut f, &integrator, false, None, &mut || {
            polls += 1;
            polls > 4
        });
        assert!(stats.aborted);
        assert_eq!(stats.events, 4);
        let full = expected_alpha(5.0, 0.8);
        for p in f.image.pixels() {
            assert!((0.0..=1.0).contains(&p[3]));
            assert!(p[3] <= full + 1e-5);
        }
        assert_eq!(f.store.pool().in_use(), 0);
    }

    #[test]
    fn test_cell_scalars_pick_the_crossed_cell() {
        let mesh = bipyramid();
        // Upper cell transparent, lower cell opaque-ish.
        let field = ScalarField::cells("c", vec![0.0, 1.0]);
        let mut color = ColorTransferFunction::new();
        color.add_rgb_point(0.0, DVec3::ONE);
        color.add_rgb_point(1.0, DVec3::ONE);
        let property = VolumeProperty::with_functions(
            color,
            PiecewiseFunction::from_points([(0.0, 0.0), (1.0, 1.0)]),
        );
        let mut integrator = LinearIntegrator::new();
        integrator
            .initialize(&property, &ScalarInfo::new(vec![(0.0, 1.0)]))
            .unwrap();

        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        run(&mut f, &integrator, true, None, &mut NeverAbort);
        let alpha = f.image.pixel(8, 8)[3];
        assert!((alpha - expected_alpha(1.0, 0.4)).abs() < 1e-5, "{alpha}");
    }

    #[test]
    fn test_empty_queue_does_nothing() {
        let mesh = bipyramid();
        let field = ScalarField::points("s", vec![0.5; 5]);
        let integrator = white_integrator(1.0);
        let mut f = fixture(&mesh, &field, SweepDirection::FrontToBack, 64);
        f.queue.reset(SweepDirection::FrontToBack);
        let stats = run(&mut f, &integrator, false, None, &mut NeverAbort);
        assert_eq!(stats, SweepStats::default());
    }
}
