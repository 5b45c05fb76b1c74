use crate::core::color::unpack_rgb;
use crate::error::{Error, Result};
use image::{ImageBuffer, Rgb};
use std::path::Path;

/// Saves a u32 (0RGB, top row first) buffer to an image file. The format
/// follows the extension.
pub fn save_buffer_to_image(buffer: &[u32], width: usize, height: usize, path: &str) -> Result<()> {
    let mut img_buf = ImageBuffer::new(width as u32, height as u32);

    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        let idx = (y as usize) * width + (x as usize);
        *pixel = Rgb(unpack_rgb(buffer[idx]));
    }

    img_buf
        .save(Path::new(path))
        .map_err(|source| Error::ImageSave {
            path: path.to_string(),
            source,
        })
}
