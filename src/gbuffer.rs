//! Per-pixel position/normal buffer written concurrently by the workers.
//!
//! Every component is an `AtomicU32` holding `f32` bits and accessed with
//! relaxed ordering. Writers never block each other or the reader; a reader
//! can see a texel whose four components come from different samples. The
//! consumer is a display, so such torn texels are acceptable.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

#[derive(Debug, Default)]
struct AtomicTexel([AtomicU32; 4]);

impl AtomicTexel {
    #[inline(always)]
    fn store(&self, value: Vec4) {
        for (slot, component) in self.0.iter().zip(value.to_array()) {
            slot.store(component.to_bits(), Ordering::Relaxed);
        }
    }

    #[inline(always)]
    fn load(&self) -> Vec4 {
        Vec4::from_array(std::array::from_fn(|i| {
            f32::from_bits(self.0[i].load(Ordering::Relaxed))
        }))
    }
}

/// Shared G-buffer of `width * height` texels, indexed `x + y * width`.
#[derive(Debug)]
pub struct GBuffer {
    width: u32,
    height: u32,
    positions: Box<[AtomicTexel]>,
    normals: Box<[AtomicTexel]>,
}

impl GBuffer {
    /// Buffer with every texel zeroed.
    pub fn new(width: u32, height: u32) -> Self {
        let texels = width as usize * height as usize;
        let allocate = || -> Box<[AtomicTexel]> { (0..texels).map(|_| AtomicTexel::default()).collect() };
        Self {
            width,
            height,
            positions: allocate(),
            normals: allocate(),
        }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of texels.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True for a zero-sized buffer.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Row-major texel index of pixel (x, y).
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        x as usize + y as usize * self.width as usize
    }

    /// Overwrite one pixel. Callers keep `index` in range.
    #[inline]
    pub fn write(&self, index: usize, position: Vec4, normal: Vec4) {
        self.positions[index].store(position);
        self.normals[index].store(normal);
    }

    /// Position texel at a flat index.
    pub fn position(&self, index: usize) -> Vec4 {
        self.positions[index].load()
    }

    /// Normal texel at a flat index.
    pub fn normal(&self, index: usize) -> Vec4 {
        self.normals[index].load()
    }

    /// Zero every texel.
    pub fn clear(&self) {
        for texel in self.positions.iter().chain(self.normals.iter()) {
            texel.store(Vec4::ZERO);
        }
    }

    /// Copy the current contents out for display or saving.
    pub fn snapshot(&self) -> GBufferSnapshot {
        GBufferSnapshot {
            width: self.width,
            height: self.height,
            positions: self.positions.iter().map(AtomicTexel::load).collect(),
            normals: self.normals.iter().map(AtomicTexel::load).collect(),
        }
    }
}

/// A plain copy of the G-buffer, row-major from the top-left pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct GBufferSnapshot {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// `(x, y, z, 1)` for a hit, zero for a miss or an unsampled pixel.
    pub positions: Vec<Vec4>,
    /// `(nx, ny, nz, 0)`.
    pub normals: Vec<Vec4>,
}

impl GBufferSnapshot {
    /// Position texel of pixel (x, y).
    pub fn position(&self, x: u32, y: u32) -> Vec4 {
        self.positions[(x + y * self.width) as usize]
    }

    /// Normal texel of pixel (x, y).
    pub fn normal(&self, x: u32, y: u32) -> Vec4 {
        self.normals[(x + y * self.width) as usize]
    }

    /// Positions as interleaved RGBA32F, ready for texture upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normals as interleaved RGBA32F, ready for texture upload.
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Number of pixels holding a hit.
    pub fn coverage(&self) -> usize {
        self.positions.iter().filter(|p| p.w != 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn writes_land_at_row_major_indices() {
        let buffer = GBuffer::new(4, 3);
        assert_eq!(buffer.len(), 12);
        let index = buffer.index(1, 2);
        assert_eq!(index, 9);
        buffer.write(index, Vec4::new(1.0, 2.0, 3.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 0.0));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.position(1, 2), Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(snapshot.normal(1, 2), Vec4::new(0.0, 1.0, 0.0, 0.0));
        assert_eq!(snapshot.coverage(), 1);
        assert_eq!(snapshot.position_bytes().len(), 12 * 16);

        buffer.clear();
        assert_eq!(buffer.position(index), Vec4::ZERO);
    }

    #[test]
    fn concurrent_writers_to_distinct_pixels() {
        let buffer = Arc::new(GBuffer::new(64, 4));
        let handles: Vec<_> = (0..4u32)
            .map(|row| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for x in 0..64 {
                        let index = buffer.index(x, row);
                        let value = Vec4::new(x as f32, row as f32, 0.0, 1.0);
                        buffer.write(index, value, Vec4::Z);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.coverage(), 256);
        assert_eq!(snapshot.position(17, 3), Vec4::new(17.0, 3.0, 0.0, 1.0));
    }
}
