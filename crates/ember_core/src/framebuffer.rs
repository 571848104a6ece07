//! Shared accumulation target.

/// RGBA32F image buffer the backend accumulates into and the presenter
/// reads from. Four floats per pixel, rows top to bottom.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

impl FrameBuffer {
    /// Create a buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0.0; (width * height * 4) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    /// Reallocate for a new size, discarding the contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize((width * height * 4) as usize, 0.0);
    }

    /// Fill with black without reallocating.
    pub fn clear(&mut self) {
        self.pixels.fill(0.0);
    }

    /// Convert to 8-bit RGBA with gamma correction, for texture upload and
    /// screenshots.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .flat_map(|px| {
                [
                    quantize(px[0]),
                    quantize(px[1]),
                    quantize(px[2]),
                    255u8,
                ]
            })
            .collect()
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

#[inline]
fn quantize(linear: f32) -> u8 {
    (255.0 * linear_to_gamma(linear).clamp(0.0, 1.0)) as u8
}
