//! The volume mapper: per-render setup around the sweep, and the state kept
//! between renders.

use std::time::{Duration, Instant};

use glam::{DMat4, DVec3};
use zsweep_core::{IntegratorKind, PreIntegrationConfig, RenderOptions, Result, VolumeProperty};
use zsweep_render::{
    create_integrator, resolve_kind, AbortCheck, Camera, DepthBuffer, EventQueue, FloatImage,
    FragmentPool, PixelListStore, Projection, RayIntegrator, Rgba8Image, ScreenMapping, Sweep,
    SweepStats,
};
use zsweep_structures::{FieldAssociation, ScalarInfo, TetMesh, UseSets};

/// Where and how a render is viewed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    /// Viewport size in screen pixels.
    pub viewport: [u32; 2],
    /// World to eye matrix.
    pub view: DMat4,
    /// Eye to clip matrix, mapping depth into `[0, 1]`.
    pub projection: DMat4,
    /// Time budget the next render should aim for when the sample distance
    /// is adjusted automatically.
    pub allocated_render_time: Option<Duration>,
}

impl RenderView {
    pub fn new(viewport: [u32; 2], view: DMat4, projection: DMat4) -> Self {
        Self {
            viewport,
            view,
            projection,
            allocated_render_time: None,
        }
    }

    /// View of `camera` on a viewport, with the aspect ratio taken from the
    /// viewport.
    pub fn from_camera(camera: &Camera, viewport: [u32; 2]) -> Self {
        let mut camera = camera.clone();
        camera.set_viewport(viewport[0], viewport[1]);
        Self::new(viewport, camera.view_matrix(), camera.projection_matrix())
    }

    pub fn with_allocated_render_time(mut self, time: Duration) -> Self {
        self.allocated_render_time = Some(time);
        self
    }

    pub fn view_projection(&self) -> DMat4 {
        self.projection * self.view
    }
}

/// Result of one render.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Allocated size of the float image.
    pub memory_size: [usize; 2],
    /// Rendered size: the viewport divided by the sample distance.
    pub in_use_size: [usize; 2],
    /// Viewport size in screen pixels.
    pub viewport_size: [u32; 2],
    /// Sample distance the image was rendered at.
    pub image_sample_distance: f64,
    /// Premultiplied float RGBA of the in-use part, rows bottom-up.
    pub float_rgba: Vec<[f32; 4]>,
    /// The same at 8 bits per channel.
    pub rgba: Rgba8Image,
    /// Wall time of the render.
    pub elapsed: Duration,
    /// Whether the render was interrupted.
    pub aborted: bool,
    /// Nearest depth of the mesh bounding box, when intermixing geometry.
    pub min_bounds_depth: Option<f64>,
    pub stats: SweepStats,
}

impl RenderedImage {
    /// Float pixel of the in-use image.
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.float_rgba[y * self.in_use_size[0] + x]
    }
}

struct EstablishedIntegrator {
    kind: IntegratorKind,
    config: PreIntegrationConfig,
    integrator: Box<dyn RayIntegrator>,
}

/// CPU Z-sweep volume mapper for tetrahedral meshes.
///
/// Keeps the face table, the integrator tables, the fragment pool and the
/// image allocation between renders, so rendering the same mesh again only
/// redoes the view-dependent work.
pub struct ZSweepMapper {
    options: RenderOptions,
    integrator: Option<EstablishedIntegrator>,
    use_sets: Option<UseSets>,
    projection: Projection,
    queue: EventQueue,
    store: PixelListStore,
    image: FloatImage,
    last_render_time: Option<Duration>,
}

impl Default for ZSweepMapper {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl std::fmt::Debug for ZSweepMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZSweepMapper")
            .field("options", &self.options)
            .field(
                "integrator",
                &self.integrator.as_ref().map(|e| e.integrator.name()),
            )
            .field("last_render_time", &self.last_render_time)
            .finish_non_exhaustive()
    }
}

impl ZSweepMapper {
    pub fn new(options: RenderOptions) -> Self {
        let direction = options.sweep_direction;
        Self {
            store: PixelListStore::new(0, 0, direction, options.max_pixel_list_size),
            options,
            integrator: None,
            use_sets: None,
            projection: Projection::new(),
            queue: EventQueue::new(direction),
            image: FloatImage::new(),
            last_render_time: None,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut RenderOptions {
        &mut self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// Current image sample distance, including automatic adjustments.
    pub fn image_sample_distance(&self) -> f64 {
        self.options.image_sample_distance
    }

    /// Duration of the last completed render.
    pub fn last_render_time(&self) -> Option<Duration> {
        self.last_render_time
    }

    /// Name of the integrator used by the last render.
    pub fn integrator_name(&self) -> Option<&'static str> {
        self.integrator.as_ref().map(|e| e.integrator.name())
    }

    /// The fragment pool, kept across renders.
    pub fn fragment_pool(&self) -> &FragmentPool {
        self.store.pool()
    }

    /// The face table of the last rendered mesh.
    pub fn use_sets(&self) -> Option<&UseSets> {
        self.use_sets.as_ref()
    }

    /// Renders `mesh` as seen through `view`.
    ///
    /// With intermixing enabled, segments not entirely in front of `depth`
    /// are dropped. `abort` is polled once per swept vertex; an interrupted
    /// render returns what was composited so far, flagged as aborted.
    pub fn render(
        &mut self,
        mesh: &TetMesh,
        property: &VolumeProperty,
        view: &RenderView,
        depth: Option<&DepthBuffer>,
        abort: &mut dyn AbortCheck,
    ) -> Result<RenderedImage> {
        self.options.validate()?;
        let field = mesh.select_field(self.options.scalar_array.as_deref())?;
        let cell_scalars = field.association() == FieldAssociation::Cells;
        let start = Instant::now();

        let previous_sample_distance = self.options.image_sample_distance;
        self.adjust_sample_distance(view.allocated_render_time);
        let sample_distance = self.options.image_sample_distance;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let in_use = view
            .viewport
            .map(|v| (f64::from(v) / sample_distance) as usize);
        self.image.resize(in_use);

        let kind = resolve_kind(
            self.options.integrator,
            cell_scalars,
            property.independent_components(),
        );
        self.establish_integrator(kind);
        if let Some(established) = self.integrator.as_mut() {
            let integrator = &mut established.integrator;
            integrator.set_max_segment_length(mesh.max_cell_length());
            integrator.initialize(property, &ScalarInfo::magnitude_of(field))?;
        }

        if !self
            .use_sets
            .as_ref()
            .is_some_and(|sets| sets.is_current(mesh, field))
        {
            self.use_sets = Some(UseSets::build(mesh, field));
        }

        let direction = self.options.sweep_direction;
        #[allow(clippy::cast_possible_truncation)]
        let mapping = ScreenMapping::new(mesh, view.view_projection(), in_use.map(|v| v as u32));
        self.queue.reset(direction);
        self.projection
            .project(mesh, field, &mapping, &mut self.queue);
        log::debug!("creating {}x{} pixel lists", in_use[0], in_use[1]);
        self.store
            .reset(in_use[0], in_use[1], direction, self.options.max_pixel_list_size);

        let depth = depth.filter(|_| self.options.intermix_intersecting_geometry);
        let stats = match (self.use_sets.as_mut(), self.integrator.as_ref()) {
            (Some(use_sets), Some(established)) => {
                let mut sweep = Sweep::new(
                    use_sets,
                    self.projection.vertices(),
                    &mut self.queue,
                    &mut self.store,
                    &mut self.image,
                    established.integrator.as_ref(),
                    cell_scalars,
                );
                if let Some(depth) = depth {
                    sweep = sweep.with_depth_buffer(depth, sample_distance);
                }
                sweep.run(abort)
            }
            _ => SweepStats::default(),
        };

        let min_bounds_depth = (self.options.intermix_intersecting_geometry && !stats.aborted)
            .then(|| min_bounds_depth(mesh, view.view_projection()))
            .flatten();
        let rgba = self.image.to_rgba8();
        let float_rgba = (0..in_use[1])
            .flat_map(|y| (0..in_use[0]).map(move |x| (x, y)))
            .map(|(x, y)| self.image.pixel(x, y))
            .collect();
        let elapsed = start.elapsed();

        if stats.aborted {
            self.options.image_sample_distance = previous_sample_distance;
            log::debug!("render aborted after {} events", stats.events);
        } else {
            self.last_render_time = Some(elapsed);
        }

        Ok(RenderedImage {
            memory_size: self.image.memory_size(),
            in_use_size: in_use,
            viewport_size: view.viewport,
            image_sample_distance: sample_distance,
            float_rgba,
            rgba,
            elapsed,
            aborted: stats.aborted,
            min_bounds_depth,
            stats,
        })
    }

    /// Makes sure the integrator of `kind` exists, replacing it when the
    /// kind or the table layout changed.
    fn establish_integrator(&mut self, kind: IntegratorKind) {
        let config = self.options.pre_integration;
        match &mut self.integrator {
            Some(established) if established.kind == kind && established.config == config => {}
            slot => {
                let integrator = create_integrator(kind, config);
                log::debug!("using the {} integrator", integrator.name());
                *slot = Some(EstablishedIntegrator {
                    kind,
                    config,
                    integrator,
                });
            }
        }
    }

    /// Scales the sample distance by the square root of the ratio between
    /// the last render time and the allocated one, within the configured
    /// bounds.
    fn adjust_sample_distance(&mut self, allocated: Option<Duration>) {
        if !self.options.auto_adjust_sample_distances {
            return;
        }
        let (Some(previous), Some(allocated)) = (self.last_render_time, allocated) else {
            return;
        };
        let (previous, allocated) = (previous.as_secs_f64(), allocated.as_secs_f64());
        if previous <= 0.0 || allocated <= 0.0 {
            return;
        }
        let adjusted = (self.options.image_sample_distance * (previous / allocated).sqrt()).clamp(
            self.options.minimum_image_sample_distance,
            self.options.maximum_image_sample_distance,
        );
        log::debug!(
            "image sample distance {} -> {adjusted}",
            self.options.image_sample_distance
        );
        self.options.image_sample_distance = adjusted;
    }
}

/// Smallest depth of the corners of the mesh's bounding box, capped at 1.
fn min_bounds_depth(mesh: &TetMesh, view_projection: DMat4) -> Option<f64> {
    let (min, max) = mesh.bounding_box()?;
    let mut depth: f64 = 1.0;
    for corner in 0..8 {
        let p = DVec3::new(
            if corner & 1 == 0 { min.x } else { max.x },
            if corner & 2 == 0 { min.y } else { max.y },
            if corner & 4 == 0 { min.z } else { max.z },
        );
        let clip = view_projection * p.extend(1.0);
        if clip.w > 0.0 {
            depth = depth.min(clip.z / clip.w);
        }
    }
    Some(depth)
}
