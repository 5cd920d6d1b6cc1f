//! Scan conversion of faces into pixel-list fragments.
//!
//! A triangle is split at its middle vertex (in screen y) into a long edge
//! and two short edges. Every scan line interpolates the edges, and every
//! span the pixels between them, on `w`-divided values with a per-pixel
//! `1/w` correction so world positions and scalars stay perspective-correct.
//! Depth is screen-linear and interpolated directly.

use zsweep_core::SweepDirection;
use zsweep_structures::{ExternalSide, Face};

use crate::pixel_list::{Fragment, PixelListStore};
use crate::projector::{ProjectedVertex, SCALAR_INDEX};

/// Slack on span ends so pixel centers lying exactly on an edge are kept.
const SPAN_EPSILON: f64 = 1.0e-9;

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min: [i32; 2],
    pub max: [i32; 2],
}

impl PixelBounds {
    /// Bounds containing nothing.
    pub const EMPTY: Self = Self {
        min: [i32::MAX, i32::MAX],
        max: [i32::MIN, i32::MIN],
    };

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    pub fn include(&mut self, x: i32, y: i32) {
        self.min[0] = self.min[0].min(x);
        self.min[1] = self.min[1].min(y);
        self.max[0] = self.max[0].max(x);
        self.max[1] = self.max[1].max(y);
    }

    /// Intersection with `[0, width) x [0, height)`.
    pub fn clamped(self, width: i32, height: i32) -> Self {
        if self.is_empty() {
            return self;
        }
        Self {
            min: [self.min[0].max(0), self.min[1].max(0)],
            max: [self.max[0].min(width - 1), self.max[1].min(height - 1)],
        }
    }
}

/// A fragment under construction: `w`-divided values and `1/w`.
#[derive(Debug, Clone, Copy)]
struct Interpolant {
    divided: [f64; 4],
    inv_w: f64,
    z: f64,
}

impl Interpolant {
    fn of(vertex: &ProjectedVertex) -> Self {
        Self {
            divided: vertex.divided_values(),
            inv_w: vertex.inv_w,
            z: vertex.z,
        }
    }

    fn lerp(&self, other: &Self, t: f64) -> Self {
        let mut divided = [0.0; 4];
        for (i, d) in divided.iter_mut().enumerate() {
            *d = self.divided[i] + (other.divided[i] - self.divided[i]) * t;
        }
        Self {
            divided,
            inv_w: self.inv_w + (other.inv_w - self.inv_w) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    fn values(&self) -> [f64; 4] {
        self.divided.map(|d| d / self.inv_w)
    }
}

/// Scan-converts faces for one render.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    width: i32,
    height: i32,
    direction: SweepDirection,
    cell_scalars: bool,
    bounds: PixelBounds,
    fragments: usize,
}

/// How one face is emitted.
#[derive(Debug, Clone, Copy)]
struct FaceEmission {
    exit: bool,
    scalar: Option<f64>,
}

impl Rasterizer {
    /// Rasterizer for an image of `width` x `height` pixels.
    pub fn new(width: usize, height: usize, direction: SweepDirection, cell_scalars: bool) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let (width, height) = (width as i32, height as i32);
        Self {
            width,
            height,
            direction,
            cell_scalars,
            bounds: PixelBounds::EMPTY,
            fragments: 0,
        }
    }

    /// Pixels touched since the last compositing pass shrank them.
    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: PixelBounds) {
        self.bounds = bounds;
    }

    /// Fragments emitted so far.
    pub fn fragments_emitted(&self) -> usize {
        self.fragments
    }

    /// Scan-converts `face` into `store`. Returns false when a vertex of the
    /// face is behind the eye, in which case nothing is emitted.
    pub fn rasterize_face(
        &mut self,
        face: &Face,
        vertices: &[ProjectedVertex],
        store: &mut PixelListStore,
    ) -> bool {
        let [a, b, c] = face.ids().map(|i| &vertices[i as usize]);
        if !(a.visible && b.visible && c.visible) {
            return false;
        }

        let e0 = [b.screen[0] - a.screen[0], b.screen[1] - a.screen[1]];
        let e1 = [c.screen[0] - a.screen[0], c.screen[1] - a.screen[1]];
        let zcross = i64::from(e0[0]) * i64::from(e1[1]) - i64::from(e0[1]) * i64::from(e1[0]);

        let back_to_front = self.direction == SweepDirection::BackToFront;
        // Screen-clockwise means the canonical normal points away from the eye.
        let side = usize::from((zcross < 0) != back_to_front);
        let exit = match (face.external_side(), back_to_front) {
            (ExternalSide::NotExternal, _) => false,
            (ExternalSide::FrontFace, false) | (ExternalSide::BackFace, true) => zcross <= 0,
            (ExternalSide::BackFace, false) | (ExternalSide::FrontFace, true) => zcross >= 0,
        };
        let emission = FaceEmission {
            exit,
            scalar: self.cell_scalars.then(|| face.scalar(side)),
        };

        self.rasterize_triangle([a, b, c], emission, store);
        true
    }

    fn emit(&mut self, x: i32, y: i32, interpolant: &Interpolant, emission: FaceEmission, store: &mut PixelListStore) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let mut values = interpolant.values();
        if let Some(scalar) = emission.scalar {
            values[SCALAR_INDEX] = scalar;
        }
        #[allow(clippy::cast_sign_loss)]
        store.add_and_sort(
            x as usize,
            y as usize,
            Fragment {
                values,
                z: interpolant.z,
                exit: emission.exit,
            },
        );
        self.fragments += 1;
    }

    fn grow_bounds(&mut self, vertices: &[&ProjectedVertex; 3]) {
        let mut face = PixelBounds::EMPTY;
        for v in vertices {
            face.include(v.screen[0], v.screen[1]);
        }
        let face = face.clamped(self.width, self.height);
        if !face.is_empty() {
            self.bounds.include(face.min[0], face.min[1]);
            self.bounds.include(face.max[0], face.max[1]);
        }
    }

    fn rasterize_triangle(
        &mut self,
        mut v: [&ProjectedVertex; 3],
        emission: FaceEmission,
        store: &mut PixelListStore,
    ) {
        v.sort_by_key(|p| p.screen[1]);
        self.grow_bounds(&v);
        let [v0, v1, v2] = v;

        let dx10 = i64::from(v1.screen[0] - v0.screen[0]);
        let dy10 = i64::from(v1.screen[1] - v0.screen[1]);
        let dx20 = i64::from(v2.screen[0] - v0.screen[0]);
        let dy20 = i64::from(v2.screen[1] - v0.screen[1]);

        if dy20 * dx10 - dx20 * dy10 == 0 {
            if v0.screen == v1.screen && v0.screen == v2.screen {
                for p in v {
                    self.emit(p.screen[0], p.screen[1], &Interpolant::of(p), emission, store);
                }
            } else {
                self.rasterize_line(v0, v1, emission, store);
                self.rasterize_line(v1, v2, emission, store);
                self.rasterize_line(v0, v2, emission, store);
            }
            return;
        }

        let (i0, i1, i2) = (Interpolant::of(v0), Interpolant::of(v1), Interpolant::of(v2));
        let (y0, y1, y2) = (v0.screen[1], v1.screen[1], v2.screen[1]);
        let edge = |from: &Interpolant, to: &Interpolant, fy: i32, ty: i32, fx: i32, tx: i32, y: i32| {
            let t = f64::from(y - fy) / f64::from(ty - fy);
            (f64::from(fx) + f64::from(tx - fx) * t, from.lerp(to, t))
        };

        let first = y0.max(0);
        let last = y2.min(self.height - 1);
        for y in first..=last {
            let long = edge(&i0, &i2, y0, y2, v0.screen[0], v2.screen[0], y);
            // The upper short edge is horizontal when y1 == y2; its lower
            // neighbour then covers the last row.
            let short = if y < y1 || y1 == y2 {
                edge(&i0, &i1, y0, y1, v0.screen[0], v1.screen[0], y)
            } else {
                edge(&i1, &i2, y1, y2, v1.screen[0], v2.screen[0], y)
            };
            let (left, right) = if long.0 <= short.0 { (long, short) } else { (short, long) };
            self.rasterize_span(y, left, right, emission, store);
        }
    }

    fn rasterize_span(
        &mut self,
        y: i32,
        left: (f64, Interpolant),
        right: (f64, Interpolant),
        emission: FaceEmission,
        store: &mut PixelListStore,
    ) {
        let (xl, xr) = (left.0, right.0);
        #[allow(clippy::cast_possible_truncation)]
        let (start, end) = (
            ((xl - SPAN_EPSILON).ceil() as i32).max(0),
            ((xr + SPAN_EPSILON).floor() as i32).min(self.width - 1),
        );
        let width = xr - xl;
        for x in start..=end {
            let t = if width > 0.0 {
                ((f64::from(x) - xl) / width).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let interpolant = left.1.lerp(&right.1, t);
            self.emit(x, y, &interpolant, emission, store);
        }
    }

    /// Steps along the dominant axis from `from` to `to`, one fragment per
    /// pixel. A zero-length line emits both end points.
    fn rasterize_line(
        &mut self,
        from: &ProjectedVertex,
        to: &ProjectedVertex,
        emission: FaceEmission,
        store: &mut PixelListStore,
    ) {
        let (a, b) = (Interpolant::of(from), Interpolant::of(to));
        let dx = to.screen[0] - from.screen[0];
        let dy = to.screen[1] - from.screen[1];
        let steps = dx.abs().max(dy.abs());
        if steps == 0 {
            self.emit(from.screen[0], from.screen[1], &a, emission, store);
            self.emit(to.screen[0], to.screen[1], &b, emission, store);
            return;
        }
        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps);
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = (
                from.screen[0] + (f64::from(dx) * t).round() as i32,
                from.screen[1] + (f64::from(dy) * t).round() as i32,
            );
            self.emit(x, y, &a.lerp(&b, t), emission, store);
        }
    }
}
