//! Render-target storage
//!
//! Targets live in a slotmap pool owned by the active capture. Keys handed
//! to the render side are weak: a released target leaves a stale key behind,
//! and every lookup tolerates staleness by returning `None`. Pixel data is
//! CPU-resident RGBA32F regardless of declared format; the format records
//! the precision and encoding the pass kernels should honor.

use bitflags::bitflags;
use slotmap::{new_key_type, Key, KeyData, SlotMap};

new_key_type! {
    /// Weak handle to a pooled render target.
    pub struct TargetKey;
}

impl TargetKey {
    /// Stable identity suitable for handing across the device boundary.
    pub fn identity(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a key from [`Self::identity`]. The result may be stale.
    pub fn from_identity(identity: u64) -> Self {
        KeyData::from_ffi(identity).into()
    }
}

/// Storage format of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, sRGB-encoded on read/write
    Rgba8Srgb,
    /// 8 bits per channel, linear
    Rgba8,
    /// 32-bit float per channel, linear
    Rgba32F,
    /// Single-channel 32-bit float depth
    Depth32F,
}

bitflags! {
    /// How a target participates in the frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TargetUsage: u8 {
        /// Written by a scene capture or compositing pass
        const COLOR = 1 << 0;
        /// Holds scene depth
        const DEPTH = 1 << 1;
        /// Readable by the external consumer after submission
        const SHARED = 1 << 2;
        /// 1x1 exposure storage for eye adaptation
        const EXPOSURE = 1 << 3;
    }
}

/// Size, format and usage of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Storage format
    pub format: PixelFormat,
    /// Participation flags
    pub usage: TargetUsage,
}

impl TargetDesc {
    /// A full-resolution color target.
    pub fn color(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TargetUsage::COLOR,
        }
    }

    /// A full-resolution color target the consumer reads after submission.
    pub fn shared_output(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8Srgb,
            usage: TargetUsage::COLOR | TargetUsage::SHARED,
        }
    }

    /// A full-resolution depth target.
    pub fn depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Depth32F,
            usage: TargetUsage::DEPTH,
        }
    }

    /// The 1x1 eye-adaptation exposure target.
    pub fn exposure() -> Self {
        Self {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba32F,
            usage: TargetUsage::COLOR | TargetUsage::EXPOSURE,
        }
    }
}

/// A CPU-resident render target.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    desc: TargetDesc,
    pixels: Vec<[f32; 4]>,
}

impl RenderTarget {
    fn new(desc: TargetDesc) -> Self {
        let len = desc.width as usize * desc.height as usize;
        Self {
            desc,
            pixels: vec![[0.0; 4]; len],
        }
    }

    /// The target's descriptor.
    pub fn desc(&self) -> TargetDesc {
        self.desc
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// Raw pixel rows, row-major.
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// Mutable raw pixels, row-major.
    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    /// Read one pixel. Out-of-bounds reads clamp to the edge.
    pub fn read(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.desc.width.saturating_sub(1)) as usize;
        let y = y.min(self.desc.height.saturating_sub(1)) as usize;
        self.pixels[y * self.desc.width as usize + x]
    }

    /// Write one pixel. Out-of-bounds writes are dropped.
    pub fn write(&mut self, x: u32, y: u32, value: [f32; 4]) {
        if x < self.desc.width && y < self.desc.height {
            self.pixels[y as usize * self.desc.width as usize + x as usize] = value;
        }
    }

    /// Fill every pixel with one value.
    pub fn clear(&mut self, value: [f32; 4]) {
        self.pixels.fill(value);
    }
}

/// Pool of render targets owned by one capture configuration.
#[derive(Debug, Default)]
pub struct TargetPool {
    targets: SlotMap<TargetKey, RenderTarget>,
}

impl TargetPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a target. Zero-sized requests yield no resource; callers
    /// treat the absence as "nothing to render this tick".
    pub fn create(&mut self, desc: TargetDesc) -> Option<TargetKey> {
        if desc.width == 0 || desc.height == 0 {
            log::warn!(
                "refusing {}x{} render target allocation",
                desc.width,
                desc.height
            );
            return None;
        }
        Some(self.targets.insert(RenderTarget::new(desc)))
    }

    /// Release a target. Stale keys are ignored.
    pub fn release(&mut self, key: TargetKey) {
        self.targets.remove(key);
    }

    /// Whether the key refers to a live target.
    pub fn contains(&self, key: TargetKey) -> bool {
        self.targets.contains_key(key)
    }

    /// Borrow a live target.
    pub fn get(&self, key: TargetKey) -> Option<&RenderTarget> {
        self.targets.get(key)
    }

    /// Mutably borrow a live target.
    pub fn get_mut(&mut self, key: TargetKey) -> Option<&mut RenderTarget> {
        self.targets.get_mut(key)
    }

    /// Mutably borrow two distinct live targets at once.
    pub fn get_disjoint_mut(
        &mut self,
        a: TargetKey,
        b: TargetKey,
    ) -> Option<[&mut RenderTarget; 2]> {
        self.targets.get_disjoint_mut([a, b])
    }

    /// Number of live targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the pool holds no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Release every target.
    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_key_is_stale() {
        let mut pool = TargetPool::new();
        let key = pool
            .create(TargetDesc::shared_output(16, 16))
            .unwrap();
        assert!(pool.contains(key));
        pool.release(key);
        assert!(!pool.contains(key));
        assert!(pool.get(key).is_none());
    }

    #[test]
    fn zero_sized_allocation_yields_no_resource() {
        let mut pool = TargetPool::new();
        assert!(pool.create(TargetDesc::shared_output(0, 1080)).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn reallocation_does_not_resurrect_old_keys() {
        let mut pool = TargetPool::new();
        let old = pool.create(TargetDesc::shared_output(8, 8)).unwrap();
        pool.release(old);
        let new = pool.create(TargetDesc::shared_output(8, 8)).unwrap();
        assert_ne!(old, new);
        assert!(!pool.contains(old));
        assert!(pool.contains(new));
    }

    #[test]
    fn reads_clamp_and_writes_drop_out_of_bounds() {
        let mut pool = TargetPool::new();
        let key = pool.create(TargetDesc::shared_output(2, 2)).unwrap();
        let target = pool.get_mut(key).unwrap();
        target.write(1, 1, [1.0, 0.5, 0.25, 1.0]);
        target.write(5, 5, [9.0; 4]);
        assert_eq!(target.read(1, 1), [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(target.read(10, 10), [1.0, 0.5, 0.25, 1.0]);
    }
}
