//! Four-lane Vector Processing
//!
//! The phasor bank always runs four channels side by side. `Float4` is a
//! fixed array-of-4 value type with lane-wise arithmetic, written as plain
//! unrolled loops so the optimizer can vectorize it. Results are identical to
//! processing each lane with scalar code.

use core::ops::{Add, Index, IndexMut, Mul, Sub};

/// Number of lanes processed together
pub const SIMD_BLOCK_SIZE: usize = 4;

/// Four `f64` lanes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Float4(pub [f64; SIMD_BLOCK_SIZE]);

impl Float4 {
    pub const ZERO: Float4 = Float4([0.0; SIMD_BLOCK_SIZE]);

    /// Broadcast one value to every lane
    #[inline]
    pub const fn splat(value: f64) -> Self {
        Float4([value; SIMD_BLOCK_SIZE])
    }

    #[inline]
    pub fn from_array(values: [f64; SIMD_BLOCK_SIZE]) -> Self {
        Float4(values)
    }

    #[inline]
    pub fn to_array(self) -> [f64; SIMD_BLOCK_SIZE] {
        self.0
    }

    /// Apply a function to every lane
    #[inline]
    pub fn map<F: Fn(f64) -> f64>(self, f: F) -> Self {
        let [a, b, c, d] = self.0;
        Float4([f(a), f(b), f(c), f(d)])
    }

    /// Combine two vectors lane by lane
    #[inline]
    pub fn zip_map<F: Fn(f64, f64) -> f64>(self, other: Float4, f: F) -> Self {
        let mut out = [0.0; SIMD_BLOCK_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = f(self.0[i], other.0[i]);
        }
        Float4(out)
    }

    /// Pick lanes from `if_set` where the mask bit is 1, else from `if_clear`.
    ///
    /// Bit `i` of `mask` selects lane `i`.
    #[inline]
    pub fn select(mask: u8, if_set: Float4, if_clear: Float4) -> Self {
        let mut out = if_clear.0;
        for (i, slot) in out.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *slot = if_set.0[i];
            }
        }
        Float4(out)
    }

    #[inline]
    pub fn clamp(self, min: f64, max: f64) -> Self {
        self.map(|x| x.clamp(min, max))
    }

    /// Linear rescale of every lane from `[x0, x1]` to `[y0, y1]`
    #[inline]
    pub fn rescale(self, x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        self.map(|x| rescale(x, x0, x1, y0, y1))
    }
}

/// Scalar linear rescale from `[x0, x1]` to `[y0, y1]`
#[inline]
pub fn rescale(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    y0 + (x - x0) / (x1 - x0) * (y1 - y0)
}

impl Add for Float4 {
    type Output = Float4;

    #[inline]
    fn add(self, rhs: Float4) -> Float4 {
        self.zip_map(rhs, |a, b| a + b)
    }
}

impl Sub for Float4 {
    type Output = Float4;

    #[inline]
    fn sub(self, rhs: Float4) -> Float4 {
        self.zip_map(rhs, |a, b| a - b)
    }
}

impl Mul for Float4 {
    type Output = Float4;

    #[inline]
    fn mul(self, rhs: Float4) -> Float4 {
        self.zip_map(rhs, |a, b| a * b)
    }
}

impl Mul<f64> for Float4 {
    type Output = Float4;

    #[inline]
    fn mul(self, rhs: f64) -> Float4 {
        self.map(|a| a * rhs)
    }
}

impl Index<usize> for Float4 {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Float4 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl From<[f64; SIMD_BLOCK_SIZE]> for Float4 {
    fn from(values: [f64; SIMD_BLOCK_SIZE]) -> Self {
        Float4(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splat_and_index() {
        let v = Float4::splat(2.5);
        for i in 0..SIMD_BLOCK_SIZE {
            assert_eq!(v[i], 2.5);
        }
    }

    #[test]
    fn test_lane_arithmetic() {
        let a = Float4([1.0, 2.0, 3.0, 4.0]);
        let b = Float4([0.5, 0.5, 0.5, 0.5]);
        assert_eq!((a + b).to_array(), [1.5, 2.5, 3.5, 4.5]);
        assert_eq!((a - b).to_array(), [0.5, 1.5, 2.5, 3.5]);
        assert_eq!((a * b).to_array(), [0.5, 1.0, 1.5, 2.0]);
        assert_eq!((a * 2.0).to_array(), [2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_select_by_mask() {
        let set = Float4::splat(1.0);
        let clear = Float4::splat(0.0);
        let picked = Float4::select(0b0101, set, clear);
        assert_eq!(picked.to_array(), [1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_rescale_and_clamp() {
        let v = Float4([-10.0, -5.0, 0.0, 7.5]);
        let r = v.rescale(-5.0, 5.0, -1.0, 1.0).clamp(-1.0, 1.0);
        assert_eq!(r.to_array(), [-1.0, -1.0, 0.0, 1.0]);
    }
}
