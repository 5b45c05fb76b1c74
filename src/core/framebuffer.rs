use nalgebra::Vector3;
use std::cell::UnsafeCell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// The window-sized color and depth buffers.
///
/// Rows are stored bottom-up so that pixel `(x, y)` matches window
/// coordinates with a lower-left origin. Depth is stored as atomic `f32` bits
/// and color behind striped locks so triangles can be rasterized row-parallel.
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,

    /// Color buffer wrapped in UnsafeCell to allow interior mutability.
    /// Writes only happen while holding the stripe lock for the pixel.
    color_buffer: UnsafeCell<Vec<Vector3<f32>>>,

    /// Depth buffer stored as atomic bits of f32, in [0, 1].
    depth_buffer: Vec<AtomicU32>,

    /// Striped locks protecting color writes.
    locks: Vec<Mutex<()>>,
}

// Thread safety is managed manually via the atomics and stripe locks.
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        let one_bits = 1.0f32.to_bits();

        let lock_count = 1024;
        Self {
            width,
            height,
            color_buffer: UnsafeCell::new(vec![Vector3::zeros(); size]),
            depth_buffer: (0..size).map(|_| AtomicU32::new(one_bits)).collect(),
            locks: (0..lock_count).map(|_| Mutex::new(())).collect(),
        }
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn clear_color(&mut self, color: Vector3<f32>) {
        self.color_buffer.get_mut().fill(color);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        let bits = depth.to_bits();
        for d in &mut self.depth_buffer {
            *d.get_mut() = bits;
        }
    }

    /// Depth test with the LESS function. Stores `new_depth` and returns true
    /// when it passes.
    #[inline]
    pub fn depth_test_and_update(&self, x: usize, y: usize, new_depth: f32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let depth_atomic = &self.depth_buffer[self.index(x, y)];
        let new_bits = new_depth.to_bits();

        let mut current_bits = depth_atomic.load(Ordering::Relaxed);
        loop {
            if new_depth >= f32::from_bits(current_bits) {
                return false;
            }
            match depth_atomic.compare_exchange_weak(
                current_bits,
                new_bits,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated_bits) => current_bits = updated_bits,
            }
        }
    }

    /// Thread-safe pixel write.
    /// Should only be called after `depth_test_and_update` returned true.
    #[inline]
    pub fn set_pixel_safe(&self, x: usize, y: usize, color: Vector3<f32>) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.index(x, y);
        let lock_idx = idx % self.locks.len();
        let _guard = self.locks[lock_idx].lock().unwrap();

        // Safe: we hold the lock for this stripe of pixels.
        unsafe {
            let buffer = &mut *self.color_buffer.get();
            buffer[idx] = color;
        }
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Vector3<f32>> {
        if !self.in_bounds(x, y) {
            return None;
        }
        // Only read between passes, never while a triangle is being rasterized.
        let buffer = unsafe { &*self.color_buffer.get() };
        Some(buffer[self.index(x, y)])
    }

    pub fn get_depth(&self, x: usize, y: usize) -> Option<f32> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(f32::from_bits(
            self.depth_buffer[self.index(x, y)].load(Ordering::Relaxed),
        ))
    }

    /// Reads a rectangle of depth values, bottom row first. Texels outside the
    /// buffer read as the far plane.
    pub fn read_depth(&self, x: usize, y: usize, width: usize, height: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(width * height);
        for row in y..y + height {
            for col in x..x + width {
                out.push(self.get_depth(col, row).unwrap_or(1.0));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_test_keeps_nearest_value() {
        let fb = FrameBuffer::new(4, 4);
        assert!(fb.depth_test_and_update(1, 2, 0.5));
        assert!(!fb.depth_test_and_update(1, 2, 0.7));
        assert!(fb.depth_test_and_update(1, 2, 0.25));
        assert_eq!(fb.get_depth(1, 2), Some(0.25));
        assert!(!fb.depth_test_and_update(9, 9, 0.0));
    }

    #[test]
    fn clear_resets_both_buffers() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.depth_test_and_update(0, 0, 0.1);
        fb.set_pixel_safe(0, 0, Vector3::new(1.0, 0.0, 0.0));

        fb.clear_depth(1.0);
        fb.clear_color(Vector3::zeros());
        assert_eq!(fb.get_depth(0, 0), Some(1.0));
        assert_eq!(fb.get_pixel(0, 0), Some(Vector3::zeros()));
    }

    #[test]
    fn read_depth_is_bottom_row_first() {
        let fb = FrameBuffer::new(2, 2);
        fb.depth_test_and_update(0, 0, 0.1);
        fb.depth_test_and_update(1, 1, 0.9);
        assert_eq!(fb.read_depth(0, 0, 2, 2), vec![0.1, 1.0, 1.0, 0.9]);
    }
}
