//! Rendering backend for zsweep-rs.
//!
//! This crate provides the CPU Z-sweep renderer, including:
//! - Camera and vertex projection into an event queue
//! - Transfer-function sampling and the ray segment integrators
//! - Pooled per-pixel fragment lists and face scan conversion
//! - The sweep driver and compositor
//! - Float/8-bit image buffers, external depth buffers and image export

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_arguments)]

pub mod camera;
pub mod buffers;
pub mod integrator;
pub mod pixel_list;
pub mod projector;
pub mod rasterizer;
pub mod screenshot;
pub mod sweep;
pub mod transfer_sampler;

pub use camera::{Camera, ProjectionMode};
pub use buffers::{memory_size_for, DepthBuffer, FloatImage, Rgba8Image, MIN_MEMORY_SIZE};
pub use integrator::{
    composite_over, composite_under, create_integrator, resolve_kind, HomogeneousIntegrator,
    LinearIntegrator, PartialPreIntegrator, PreIntegrator, PsiTable, RayIntegrator,
    PSI_TABLE_SIZE,
};
pub use pixel_list::{Fragment, FragmentPool, PixelListStore, DEPTH_TOLERANCE, POOL_BLOCK_SIZE};
pub use projector::{Event, EventQueue, ProjectedVertex, Projection, ScreenMapping, SCALAR_INDEX};
pub use rasterizer::{PixelBounds, Rasterizer};
pub use screenshot::{save_image, save_to_buffer, ScreenshotOptions};
pub use sweep::{AbortCheck, NeverAbort, Sweep, SweepStats};
pub use transfer_sampler::{SampledFunction, TransferSampler};
