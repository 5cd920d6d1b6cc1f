//! Image buffers: the float accumulation image, its 8-bit conversion and
//! external depth buffers.
//!
//! Rows are stored bottom-up: row 0 is the bottom of the screen, matching
//! the screen mapping of the projector.

use zsweep_core::{Result, ZsweepError};

/// Smallest memory dimension of a [`FloatImage`].
pub const MIN_MEMORY_SIZE: usize = 32;

/// Power of two holding `in_use` pixels, at least [`MIN_MEMORY_SIZE`].
pub fn memory_size_for(in_use: usize) -> usize {
    in_use.max(1).next_power_of_two().max(MIN_MEMORY_SIZE)
}

/// Premultiplied RGBA accumulation image.
///
/// The allocation (memory size) is a power of two per axis and is reused
/// across renders as long as it is not more than twice too big; only the
/// lower-left in-use part is rendered.
#[derive(Debug, Clone, Default)]
pub struct FloatImage {
    memory: [usize; 2],
    in_use: [usize; 2],
    pixels: Vec<[f32; 4]>,
}

impl FloatImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the image for a render of `in_use` pixels and clears it.
    ///
    /// Returns true when the buffer was reallocated.
    pub fn resize(&mut self, in_use: [usize; 2]) -> bool {
        let needed = in_use.map(memory_size_for);
        let fits = (0..2).all(|i| self.memory[i] >= in_use[i] && self.memory[i] <= 2 * needed[i]);
        let reallocated = !fits || self.pixels.is_empty();
        if reallocated {
            self.memory = needed;
            self.pixels = vec![[0.0; 4]; needed[0] * needed[1]];
            log::debug!("allocated {}x{} float image", needed[0], needed[1]);
        } else {
            self.clear();
        }
        self.in_use = in_use;
        reallocated
    }

    /// Sets every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    /// Allocated size.
    pub fn memory_size(&self) -> [usize; 2] {
        self.memory
    }

    /// Rendered size.
    pub fn in_use_size(&self) -> [usize; 2] {
        self.in_use
    }

    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.pixels[y * self.memory[0] + x]
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f32; 4] {
        &mut self.pixels[y * self.memory[0] + x]
    }

    /// The whole allocation, row-major with memory-width rows.
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// Raw bytes of the allocation (native-endian `f32` RGBA).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Converts the in-use part to 8 bits per channel.
    ///
    /// Channels are clamped to `[0, 1]` and scaled by 255; pixels with zero
    /// alpha become fully zero. Colors stay premultiplied.
    pub fn to_rgba8(&self) -> Rgba8Image {
        let [width, height] = self.in_use;
        let mut data = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let p = self.pixel(x, y);
                if p[3] <= 0.0 {
                    data.extend_from_slice(&[0; 4]);
                } else {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    data.extend(p.iter().map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8));
                }
            }
        }
        Rgba8Image {
            width,
            height,
            data,
        }
    }
}

/// 8-bit premultiplied RGBA image, rows bottom-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rgba8Image {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Rgba8Image {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Copy with rows ordered top-down, as image files expect.
    pub fn flipped_rows(&self) -> Vec<u8> {
        let row = self.width * 4;
        if row == 0 {
            return Vec::new();
        }
        self.data.chunks_exact(row).rev().flatten().copied().collect()
    }
}

/// Depth of opaque geometry drawn before the volume, in normalized device
/// depth, one value per viewport pixel, rows bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != width * height {
            return Err(ZsweepError::SizeMismatch {
                expected: width * height,
                actual: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Buffer with every pixel at `depth`.
    pub fn filled(width: usize, height: usize, depth: f32) -> Self {
        Self {
            width,
            height,
            values: vec![depth; width * height],
        }
    }

    /// Reads raw native-endian `f32` bytes.
    pub fn from_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != width * height * 4 {
            return Err(ZsweepError::SizeMismatch {
                expected: width * height * 4,
                actual: bytes.len(),
            });
        }
        // The slice may be unaligned for f32; copy into an aligned buffer.
        let mut values = vec![0.0f32; width * height];
        bytemuck::cast_slice_mut::<f32, u8>(&mut values).copy_from_slice(bytes);
        Self::new(width, height, values)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Depth behind image pixel `(x, y)` rendered at `sample_distance`
    /// viewport pixels per image pixel. Positions are clamped to the buffer.
    pub fn sample(&self, x: usize, y: usize, sample_distance: f64) -> f64 {
        if self.values.is_empty() {
            return f64::INFINITY;
        }
        let scale = |p: usize, size: usize| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let scaled = (p as f64 * sample_distance).floor().max(0.0) as usize;
            scaled.min(size - 1)
        };
        let (sx, sy) = (scale(x, self.width), scale(y, self.height));
        f64::from(self.values[sy * self.width + sx])
    }
}
