//! Per-pass light population.
//!
//! The scene hands the shader generator a per-type count vector rather than
//! the lights themselves; light data reaches the GPU through the auto-bound
//! light arrays at draw time. The counts participate in the program
//! fingerprint, so a change in population regenerates the affected programs.

/// Classic light categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

/// Number of active lights per type for one pass.
///
/// The engine packs the light arrays in `directional, point, spot` order;
/// the unrolled lighting atoms index them in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    pub directional: u32,
    pub point: u32,
    pub spot: u32,
}

impl LightCounts {
    #[must_use]
    pub const fn new(directional: u32, point: u32, spot: u32) -> Self {
        Self {
            directional,
            point,
            spot,
        }
    }

    /// Total lights across all types.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.directional + self.point + self.spot
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Type of the light stored at `index` in the packed arrays.
    ///
    /// # Panics
    /// Panics if `index >= self.total()`.
    #[must_use]
    pub fn type_at(&self, index: u32) -> LightType {
        if index < self.directional {
            LightType::Directional
        } else if index < self.directional + self.point {
            LightType::Point
        } else if index < self.total() {
            LightType::Spot
        } else {
            panic!("light index {index} out of range (total {})", self.total())
        }
    }

    /// Iterate `(packed_index, type)` in array order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, LightType)> + '_ {
        (0..self.total()).map(|i| (i, self.type_at(i)))
    }
}
