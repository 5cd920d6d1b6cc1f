//! Core abstractions for zsweep-rs.
//!
//! This crate provides the configuration types shared by the renderer:
//! - [`ZsweepError`] and the crate-wide [`Result`]
//! - [`RenderOptions`] with serde/JSON support
//! - Transfer functions ([`PiecewiseFunction`], [`ColorTransferFunction`]) and [`VolumeProperty`]
//! - Built-in color presets
//! - [`TimeStamp`] modification times for cache invalidation

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Index and count conversions are bounded by mesh sizes
#![allow(clippy::cast_precision_loss)]

pub mod color_preset;
pub mod error;
pub mod options;
pub mod time_stamp;
pub mod transfer_function;
pub mod volume_property;

pub use color_preset::ColorPreset;
pub use error::{Result, ZsweepError};
pub use options::{
    IntegratorKind, PreIntegrationConfig, RenderOptions, SweepDirection, DEFAULT_MAX_TABLE_ENTRIES,
};
pub use time_stamp::TimeStamp;
pub use transfer_function::{
    hsv_to_rgb, rgb_to_hsv, ColorNode, ColorSpace, ColorTransferFunction, PiecewiseFunction,
    PiecewiseNode,
};
pub use volume_property::{
    ComponentColor, ComponentProperty, VolumeProperty, MAX_COMPONENTS, MIN_UNIT_DISTANCE,
};

// Re-export glam types for convenience
pub use glam::{DMat4, DVec3, DVec4};
