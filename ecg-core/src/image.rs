//! The immutable raster view the Digitization Core reads from.
//!
//! `ecg-core` never decodes PNG/JPEG — the caller hands over an already
//! decoded pixel buffer (see spec.md §6, EXTERNAL INTERFACES).

use serde::{Deserialize, Serialize};

/// An RGBA sample, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn darkness(&self) -> f64 {
        255.0 - (self.r as f64 + self.g as f64 + self.b as f64) / 3.0
    }

    /// Euclidean distance in RGB space, ignoring alpha.
    pub fn color_distance(&self, other: &Rgba) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

/// A decoded raster: dense row-major RGBA samples over a known width/height.
/// Never mutated once constructed.
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Image {
    /// Build an image from a row-major RGBA byte buffer (4 bytes/pixel).
    pub fn from_rgba_bytes(width: u32, height: u32, bytes: &[u8]) -> crate::error::Result<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if bytes.len() != expected || width == 0 || height == 0 {
            return Err(crate::error::Error::LoadingFailed(format!(
                "expected {} bytes for a {}x{} RGBA buffer, got {}",
                expected,
                width,
                height,
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|c| Rgba::new(c[0], c[1], c[2], c[3]))
            .collect();
        Ok(Self { width, height, pixels })
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgba>) -> crate::error::Result<Self> {
        if pixels.len() != (width as usize) * (height as usize) || width == 0 || height == 0 {
            return Err(crate::error::Error::LoadingFailed(
                "pixel buffer does not match width*height".into(),
            ));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn row(&self, y: u32) -> &[Rgba] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Sum of per-row darkness, used by the local-CV grid detector to find
    /// periodic horizontal structure.
    pub fn row_darkness_sums(&self) -> Vec<f64> {
        (0..self.height)
            .map(|y| self.row(y).iter().map(|p| p.darkness()).sum())
            .collect()
    }

    /// Sum of per-column darkness, the column-axis analogue of the above.
    pub fn column_darkness_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.width as usize];
        for y in 0..self.height {
            for (x, p) in self.row(y).iter().enumerate() {
                sums[x] += p.darkness();
            }
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let bytes = vec![0u8; 10];
        assert!(Image::from_rgba_bytes(4, 4, &bytes).is_err());
    }

    #[test]
    fn builds_from_exact_buffer() {
        let bytes = vec![255u8; 4 * 2 * 3];
        let img = Image::from_rgba_bytes(2, 3, &bytes).unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 3);
        assert_eq!(img.get(0, 0), Rgba::new(255, 255, 255, 255));
    }
}
