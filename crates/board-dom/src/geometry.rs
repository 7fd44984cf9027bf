//! Box geometry shared by the tree and the render layer

use serde::{Deserialize, Serialize};

/// Width and height of a laid-out box, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Inline size
    pub width: f32,
    /// Block size
    pub height: f32,
}

impl Size {
    /// Zero-sized box
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    /// Create a size
    #[inline]
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when the box has a positive height
    ///
    /// Collapsed boxes report zero height while their content is in flight,
    /// so height alone decides whether a measurement is usable.
    #[inline]
    #[must_use]
    pub fn has_height(&self) -> bool {
        self.height > 0.0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_has_no_height() {
        assert!(!Size::ZERO.has_height());
        assert!(!Size::new(120.0, 0.0).has_height());
        assert!(Size::new(0.0, 4.0).has_height());
    }

    #[test]
    fn size_display() {
        assert_eq!(Size::new(200.0, 48.5).to_string(), "200x48.5");
    }
}
