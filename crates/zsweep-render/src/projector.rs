//! Vertex projection and the depth-ordered event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{DMat4, DVec4};
use zsweep_core::SweepDirection;
use zsweep_structures::{FieldAssociation, ScalarField, TetMesh};

/// Index of the scalar in [`ProjectedVertex::values`].
pub const SCALAR_INDEX: usize = 3;

/// Where the image lives on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    /// Model-view-projection matrix.
    pub model_view_projection: DMat4,
    /// Model (object to world) matrix.
    pub model: DMat4,
    /// Size of the viewport in image pixels.
    pub viewport: [u32; 2],
    /// Image pixel subtracted from every screen position.
    pub origin: [i32; 2],
}

impl ScreenMapping {
    /// Mapping with the model matrix taken from `mesh`.
    pub fn new(mesh: &TetMesh, view_projection: DMat4, viewport: [u32; 2]) -> Self {
        Self {
            model_view_projection: view_projection * mesh.model_matrix(),
            model: mesh.model_matrix(),
            viewport,
            origin: [0, 0],
        }
    }
}

/// A vertex in screen space, ready for rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProjectedVertex {
    /// Integer screen position, origin at the bottom left.
    pub screen: [i32; 2],
    /// Normalized device depth in `[0, 1]` for visible vertices.
    pub z: f64,
    /// `1 / w` of the clip-space position.
    pub inv_w: f64,
    /// World position and scalar.
    pub values: [f64; 4],
    /// False when the vertex lies behind the eye (`w <= 0`).
    pub visible: bool,
}

impl ProjectedVertex {
    /// Projects `position` (object space) carrying `scalar`.
    pub fn project(mapping: &ScreenMapping, position: glam::DVec3, scalar: f64) -> Self {
        let clip = mapping.model_view_projection * position.extend(1.0);
        let world = mapping.model.transform_point3(position);
        let values = [world.x, world.y, world.z, scalar];
        if clip.w <= 0.0 || !clip.w.is_finite() {
            return Self {
                values,
                ..Self::default()
            };
        }
        let inv_w = 1.0 / clip.w;
        let ndc = DVec4::new(clip.x * inv_w, clip.y * inv_w, clip.z * inv_w, 1.0);
        let to_screen = |n: f64, size: u32, origin: i32| {
            let pixel = ((n + 1.0) * 0.5 * f64::from(size)).floor();
            #[allow(clippy::cast_possible_truncation)]
            let pixel = pixel.clamp(f64::from(i32::MIN / 2), f64::from(i32::MAX / 2)) as i32;
            pixel - origin
        };
        Self {
            screen: [
                to_screen(ndc.x, mapping.viewport[0], mapping.origin[0]),
                to_screen(ndc.y, mapping.viewport[1], mapping.origin[1]),
            ],
            z: ndc.z,
            inv_w,
            values,
            visible: true,
        }
    }

    /// Values pre-divided by `w`, for perspective-correct interpolation.
    pub fn divided_values(&self) -> [f64; 4] {
        self.values.map(|v| v * self.inv_w)
    }
}

/// A vertex waiting to be swept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub vertex: u32,
    pub z: f64,
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    key: f64,
    event: Event,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Max-heap: the largest key pops first, lower vertex ids win ties.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| other.event.vertex.cmp(&self.event.vertex))
    }
}

/// Vertices ordered by depth in sweep order.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueueEntry>,
    direction: SweepDirection,
}

impl EventQueue {
    pub fn new(direction: SweepDirection) -> Self {
        Self {
            heap: BinaryHeap::new(),
            direction,
        }
    }

    pub fn direction(&self) -> SweepDirection {
        self.direction
    }

    /// Empties the queue and switches the sweep direction.
    pub fn reset(&mut self, direction: SweepDirection) {
        self.heap.clear();
        self.direction = direction;
    }

    pub fn push(&mut self, vertex: u32, z: f64) {
        let key = match self.direction {
            SweepDirection::FrontToBack => -z,
            SweepDirection::BackToFront => z,
        };
        self.heap.push(QueueEntry {
            key,
            event: Event { vertex, z },
        });
    }

    /// Removes the next vertex in sweep order.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|e| e.event)
    }

    pub fn peek(&self) -> Option<Event> {
        self.heap.peek().map(|e| e.event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Projected vertices of one render.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    vertices: Vec<ProjectedVertex>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects every point of `mesh` and queues the visible ones.
    ///
    /// Point scalars are interpolated as given (or as their magnitude for
    /// multi-component fields); cell scalars are assigned per face during
    /// rasterization, so vertices carry 0.
    pub fn project(
        &mut self,
        mesh: &TetMesh,
        scalars: &ScalarField,
        mapping: &ScreenMapping,
        queue: &mut EventQueue,
    ) {
        let point_scalars = scalars.association() == FieldAssociation::Points;
        self.vertices.clear();
        self.vertices.reserve(mesh.num_points());
        for (i, &position) in mesh.points().iter().enumerate() {
            let scalar = if point_scalars { scalars.magnitude(i) } else { 0.0 };
            let vertex = ProjectedVertex::project(mapping, position, scalar);
            if vertex.visible {
                #[allow(clippy::cast_possible_truncation)]
                queue.push(i as u32, vertex.z);
            }
            self.vertices.push(vertex);
        }
        log::debug!(
            "projected {} vertices, {} queued",
            self.vertices.len(),
            queue.len()
        );
    }

    pub fn vertices(&self) -> &[ProjectedVertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: u32) -> &ProjectedVertex {
        &self.vertices[index as usize]
    }
}
