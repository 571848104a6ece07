//! Optional post-process stage.

use ember_core::{FrameBuffer, FrameError, PostProcess};

/// Spatial 3x3 box filter over the accumulated image.
///
/// A stand-in for a real denoiser: it runs at the same place in the frame
/// (immediately before each presentation, and before screenshots) and
/// owns its output buffer so the accumulation itself is never touched.
pub struct DenoiseFilter {
    output: FrameBuffer,
}

impl DenoiseFilter {
    pub fn new() -> Self {
        Self {
            output: FrameBuffer::new(0, 0),
        }
    }
}

impl Default for DenoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcess for DenoiseFilter {
    fn run(&mut self, frame: &FrameBuffer) -> Result<&FrameBuffer, FrameError> {
        let width = frame.width() as i64;
        let height = frame.height() as i64;
        if width == 0 || height == 0 {
            return Err(FrameError::PostProcess("zero-sized source image".into()));
        }

        if self.output.width() != frame.width() || self.output.height() != frame.height() {
            self.output.resize(frame.width(), frame.height());
        }

        let src = frame.pixels();
        let dst = self.output.pixels_mut();
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0.0f32; 3];
                let mut taps = 0.0f32;
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let s = ((ny * width + nx) * 4) as usize;
                        sum[0] += src[s];
                        sum[1] += src[s + 1];
                        sum[2] += src[s + 2];
                        taps += 1.0;
                    }
                }
                let d = ((y * width + x) * 4) as usize;
                dst[d] = sum[0] / taps;
                dst[d + 1] = sum[1] / taps;
                dst[d + 2] = sum[2] / taps;
                dst[d + 3] = 1.0;
            }
        }
        Ok(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_unchanged() {
        let mut frame = FrameBuffer::new(4, 4);
        for px in frame.pixels_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[0.5, 0.25, 0.125, 1.0]);
        }

        let mut filter = DenoiseFilter::new();
        let out = filter.run(&frame).unwrap();
        for px in out.pixels().chunks_exact(4) {
            assert!((px[0] - 0.5).abs() < 1.0e-6);
            assert!((px[1] - 0.25).abs() < 1.0e-6);
            assert!((px[2] - 0.125).abs() < 1.0e-6);
        }
    }

    #[test]
    fn test_isolated_spike_spreads() {
        let mut frame = FrameBuffer::new(3, 3);
        // Single bright pixel in the center
        let center = (1 * 3 + 1) * 4;
        frame.pixels_mut()[center] = 9.0;

        let mut filter = DenoiseFilter::new();
        let out = filter.run(&frame).unwrap();
        // Center averaged over its 9 taps
        assert!((out.pixels()[center] - 1.0).abs() < 1.0e-6);
        // Corner averaged over its 4 taps
        assert!((out.pixels()[0] - 9.0 / 4.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_zero_sized_source_rejected() {
        let frame = FrameBuffer::new(0, 0);
        let mut filter = DenoiseFilter::new();
        assert!(matches!(
            filter.run(&frame),
            Err(FrameError::PostProcess(_))
        ));
    }
}
