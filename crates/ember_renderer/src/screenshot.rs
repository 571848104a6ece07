//! Screenshot output.

use std::path::Path;

use ember_core::FrameBuffer;

/// Save the (post-processed) accumulated image as an 8-bit PNG.
pub fn save_png<P: AsRef<Path>>(frame: &FrameBuffer, path: P) -> image::ImageResult<()> {
    let path = path.as_ref();
    image::save_buffer(
        path,
        &frame.to_rgba8(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
    )?;
    log::info!(
        "saved {}x{} screenshot to {}",
        frame.width(),
        frame.height(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_png_roundtrip() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.pixels_mut()[0] = 1.0; // red top-left

        let path = std::env::temp_dir().join("ember_screenshot_test.png");
        save_png(&frame, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 1)[0], 0);
        std::fs::remove_file(&path).ok();
    }
}
