//! Framebuffers and output orientation.

use std::io::{self, Write};

use serde::Deserialize;

use crate::common::constants::ALPHA_OPAQUE;

/// Output rotation applied while pixels are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "i8")]
pub enum Rotation {
    /// 90 degrees anti-clockwise (`-1` in configuration).
    CounterClockwise,
    /// No rotation (`0`).
    #[default]
    None,
    /// 90 degrees clockwise (`1`).
    Clockwise,
}

impl TryFrom<i8> for Rotation {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::CounterClockwise),
            0 => Ok(Self::None),
            1 => Ok(Self::Clockwise),
            other => Err(format!("rotation must be -1, 0 or 1, got {other}")),
        }
    }
}

impl Rotation {
    /// Output dimensions for a `width x height` source.
    pub fn output_size(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::None => (width, height),
            Self::Clockwise | Self::CounterClockwise => (height, width),
        }
    }

    /// Maps source coordinates inside a `width x height` source to output coordinates.
    #[inline]
    pub fn map(self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::None => (x, y),
            Self::Clockwise => (height - 1 - y, x),
            Self::CounterClockwise => (y, width - 1 - x),
        }
    }
}

/// A raster of packed `0xAABBGGRR` samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Frame {
    /// Allocates an opaque black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![ALPHA_OPAQUE; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// One row of pixels, or `None` past the bottom edge.
    pub fn row(&self, y: u32) -> Option<&[u32]> {
        if y >= self.height {
            return None;
        }
        let start = (y * self.width) as usize;
        Some(&self.pixels[start..start + self.width as usize])
    }

    /// Pixel at `(x, y)`, or `None` out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Writes a pixel; out-of-bounds writes are dropped and return `false`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, colour: u32) -> bool {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = colour;
            true
        } else {
            false
        }
    }

    /// Resets every pixel to opaque black.
    pub fn clear(&mut self) {
        self.pixels.fill(ALPHA_OPAQUE);
    }

    /// Returns a rotated copy.
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let (w, h) = rotation.output_size(self.width, self.height);
        let mut out = Self::new(w, h);
        for y in 0..self.height {
            for x in 0..self.width {
                let (dx, dy) = rotation.map(x, y, self.width, self.height);
                let _ = out.set(dx, dy, self.pixels[(y * self.width + x) as usize]);
            }
        }
        out
    }

    /// Returns a copy with the row order inverted.
    pub fn flipped_vertically(&self) -> Self {
        let mut out = Self::new(self.width, self.height);
        for (dst, src) in out
            .pixels
            .chunks_exact_mut(self.width.max(1) as usize)
            .zip(self.pixels.chunks_exact(self.width.max(1) as usize).rev())
        {
            dst.copy_from_slice(src);
        }
        out
    }

    /// Writes the frame as a binary PPM (`P6`) image, dropping alpha.
    ///
    /// # Errors
    ///
    /// Propagates any error from `out`.
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut rgb = Vec::with_capacity(self.pixels.len() * 3);
        for &p in &self.pixels {
            let [r, g, b, _] = p.to_le_bytes();
            rgb.extend_from_slice(&[r, g, b]);
        }
        out.write_all(&rgb)
    }
}
