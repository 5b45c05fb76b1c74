use nalgebra::Vector3;

/// Clamps each channel into the displayable [0, 1] range.
#[inline]
pub fn saturate(color: Vector3<f32>) -> Vector3<f32> {
    color.map(|c| c.clamp(0.0, 1.0))
}

/// Packs a [0, 1] RGB color into the 0RGB layout expected by the window.
#[inline]
pub fn pack_rgb(color: Vector3<f32>) -> u32 {
    let c = saturate(color);
    let r = (c.x * 255.0).round() as u32;
    let g = (c.y * 255.0).round() as u32;
    let b = (c.z * 255.0).round() as u32;
    (r << 16) | (g << 8) | b
}

/// Inverse of [`pack_rgb`], used when writing PNG files.
#[inline]
pub fn unpack_rgb(pixel: u32) -> [u8; 3] {
    [
        ((pixel >> 16) & 0xFF) as u8,
        ((pixel >> 8) & 0xFF) as u8,
        (pixel & 0xFF) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_clamps_out_of_range_channels() {
        let packed = pack_rgb(Vector3::new(1.5, -0.2, 0.5));
        assert_eq!(unpack_rgb(packed), [255, 0, 128]);
    }
}
