//! Resolution-independent pointer coordinates
//!
//! Recordings store every position as a fraction of the screen size that was
//! in effect when it was captured. Playback maps the fraction back onto
//! whatever screen is current when the event fires.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn normalize(&self, x: f64, y: f64) -> (f64, f64) {
        normalize(x, y, self.width, self.height)
    }

    pub fn denormalize(&self, nx: f64, ny: f64) -> (i32, i32) {
        denormalize(nx, ny, self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Absolute pixels to fractions of the screen. Does not clamp.
pub fn normalize(x: f64, y: f64, width: u32, height: u32) -> (f64, f64) {
    (x / width as f64, y / height as f64)
}

/// Fractions of the screen back to the nearest pixel
pub fn denormalize(nx: f64, ny: f64, width: u32, height: u32) -> (i32, i32) {
    (
        (nx * width as f64).round() as i32,
        (ny * height as f64).round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn centre_scales_to_new_resolution() {
        let (nx, ny) = normalize(500.0, 500.0, 1000, 1000);
        assert_eq!(denormalize(nx, ny, 2000, 1000), (1000, 500));
    }

    #[test]
    fn denormalize_rounds_to_nearest() {
        assert_eq!(denormalize(0.3333, 0.6667, 3, 3), (1, 2));
        assert_eq!(denormalize(0.0, 1.0, 1920, 1080), (0, 1080));
    }

    #[test]
    fn normalize_does_not_clamp() {
        assert_eq!(normalize(-10.0, 2000.0, 1000, 1000), (-0.01, 2.0));
    }

    #[test]
    fn resolution_validity() {
        assert!(Resolution::new(1, 1).is_valid());
        assert!(!Resolution::new(0, 1080).is_valid());
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
    }

    proptest! {
        #[test]
        fn round_trip_within_one_pixel(w in 1u32..8000, h in 1u32..8000, fx in 0.0f64..=1.0, fy in 0.0f64..=1.0) {
            let x = (fx * w as f64).floor();
            let y = (fy * h as f64).floor();
            let (nx, ny) = normalize(x, y, w, h);
            let (rx, ry) = denormalize(nx, ny, w, h);
            prop_assert!((rx as f64 - x).abs() <= 1.0);
            prop_assert!((ry as f64 - y).abs() <= 1.0);
        }
    }
}
