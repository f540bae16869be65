//! Plain value types shared across crates.

/// Pixel dimensions of a drawable or swapchain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window, transient resize).
    #[inline]
    pub const fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or 1.0 for degenerate extents.
    pub fn aspect_ratio(self) -> f32 {
        if self.is_degenerate() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Pack into a single word: width in the high half, height in the low half.
    #[inline]
    pub const fn pack(self) -> u64 {
        ((self.width as u64) << 32) | self.height as u64
    }

    #[inline]
    pub const fn unpack(bits: u64) -> Self {
        Self {
            width: (bits >> 32) as u32,
            height: bits as u32,
        }
    }
}
