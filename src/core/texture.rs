/// Minification/magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// What a lookup into a depth texture returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// The stored depth itself.
    None,
    /// The result of comparing the reference `r` against the stored depth.
    CompareRefToTexture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    /// Lit when `r <= stored`.
    LessEqual,
}

impl CompareFunc {
    #[inline]
    fn passes(self, reference: f32, stored: f32) -> bool {
        match self {
            CompareFunc::LessEqual => reference <= stored,
        }
    }
}

/// Sampler state of a depth texture. Addressing is always clamp-to-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParameters {
    pub filter: TextureFilter,
    pub compare_mode: CompareMode,
    pub compare_func: CompareFunc,
}

impl Default for TextureParameters {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            compare_mode: CompareMode::None,
            compare_func: CompareFunc::LessEqual,
        }
    }
}

/// A square texture in the native depth format (one `f32` per texel).
///
/// Texel rows are stored bottom-up, matching the framebuffer, so texture
/// coordinate `t = 0` is the bottom edge of the captured viewport.
#[derive(Debug, Clone)]
pub struct DepthTexture {
    size: usize,
    texels: Vec<f32>,
    pub params: TextureParameters,
}

impl DepthTexture {
    /// Allocates storage for a `size` x `size` texture. Texels start at the
    /// far plane so an uncaptured map shadows nothing.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            texels: vec![1.0; size * size],
            params: TextureParameters::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Replaces a sub-rectangle of texels in place. `data` is `width * height`
    /// values, bottom row first. Parts falling outside the texture are dropped.
    pub fn copy_sub_image(
        &mut self,
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
        data: &[f32],
    ) {
        for row in 0..height {
            let ty = y_offset + row;
            if ty >= self.size {
                break;
            }
            for col in 0..width {
                let tx = x_offset + col;
                if tx >= self.size {
                    break;
                }
                if let Some(&value) = data.get(row * width + col) {
                    self.texels[ty * self.size + tx] = value;
                }
            }
        }
    }

    /// Texel fetch with clamp-to-edge addressing.
    #[inline]
    pub fn texel(&self, x: isize, y: isize) -> f32 {
        let max = self.size as isize - 1;
        let cx = x.clamp(0, max) as usize;
        let cy = y.clamp(0, max) as usize;
        self.texels[cy * self.size + cx]
    }

    /// Looks the texture up at `(s, t)` with reference depth `r`.
    ///
    /// With comparison enabled the result is the fraction of filter taps that
    /// pass the compare function, so `1.0` is fully lit and `0.0` fully in
    /// shadow. Without comparison the (filtered) stored depth is returned.
    pub fn sample(&self, s: f32, t: f32, r: f32) -> f32 {
        let reference = r.clamp(0.0, 1.0);
        let tap = |x: isize, y: isize| -> f32 {
            let stored = self.texel(x, y);
            match self.params.compare_mode {
                CompareMode::None => stored,
                CompareMode::CompareRefToTexture => {
                    if self.params.compare_func.passes(reference, stored) {
                        1.0
                    } else {
                        0.0
                    }
                }
            }
        };

        let size = self.size as f32;
        match self.params.filter {
            TextureFilter::Nearest => {
                let x = (s * size).floor() as isize;
                let y = (t * size).floor() as isize;
                tap(x, y)
            }
            TextureFilter::Linear => {
                let u = s * size - 0.5;
                let v = t * size - 0.5;
                let x0 = u.floor();
                let y0 = v.floor();
                let fx = u - x0;
                let fy = v - y0;
                let (x0, y0) = (x0 as isize, y0 as isize);

                let bottom = tap(x0, y0) * (1.0 - fx) + tap(x0 + 1, y0) * fx;
                let top = tap(x0, y0 + 1) * (1.0 - fx) + tap(x0 + 1, y0 + 1) * fx;
                bottom * (1.0 - fy) + top * fy
            }
        }
    }
}
