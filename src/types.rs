use std::fmt::{Debug, Display};
use std::ops::{AddAssign, MulAssign};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::debug;
use num_traits::Float;
use serde::{de::DeserializeOwned, Serialize};

/// Scalar type used for tile norms.
///
/// Besides the floating-point arithmetic, this trait carries the process-wide
/// zero threshold of the screening machinery: one value per scalar type,
/// defaulting to the type's machine epsilon. Normalized tile norms strictly
/// below the threshold are stored as exact zeros.
///
/// Readers and writers of the threshold are not synchronized beyond the
/// atomicity of the backing cell. Callers must set the threshold before
/// issuing work that depends on it; changing it mid-operation yields stale
/// but well-defined screening, never undefined behavior.
pub trait ShapeScalar:
    Float
    + AddAssign
    + MulAssign
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + Serialize
    + DeserializeOwned
    + 'static
{
    /// Scalar type name used in diagnostics.
    const NAME: &'static str;

    /// Returns the current zero threshold for this scalar type.
    fn threshold() -> Self;

    /// Sets the process-wide zero threshold for this scalar type.
    ///
    /// Existing shapes are not rescreened.
    fn set_threshold(value: Self);

    /// Converts a tile extent to a norm scalar.
    fn from_extent(extent: usize) -> Self;

    /// Lossy conversion from `f64`, for generated test data.
    fn from_f64(value: f64) -> Self;
}

static F32_THRESHOLD: AtomicU32 = AtomicU32::new(f32::EPSILON.to_bits());
static F64_THRESHOLD: AtomicU64 = AtomicU64::new(f64::EPSILON.to_bits());

impl ShapeScalar for f32 {
    const NAME: &'static str = "f32";

    fn threshold() -> Self {
        f32::from_bits(F32_THRESHOLD.load(Ordering::Relaxed))
    }

    fn set_threshold(value: Self) {
        debug!("zero threshold for f32 set to {value:e}");
        F32_THRESHOLD.store(value.to_bits(), Ordering::Relaxed);
    }

    fn from_extent(extent: usize) -> Self {
        extent as f32
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl ShapeScalar for f64 {
    const NAME: &'static str = "f64";

    fn threshold() -> Self {
        f64::from_bits(F64_THRESHOLD.load(Ordering::Relaxed))
    }

    fn set_threshold(value: Self) {
        debug!("zero threshold for f64 set to {value:e}");
        F64_THRESHOLD.store(value.to_bits(), Ordering::Relaxed);
    }

    fn from_extent(extent: usize) -> Self {
        extent as f64
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::ShapeScalar;

    #[test]
    fn test_default_threshold_is_epsilon() {
        assert_eq!(f32::threshold(), f32::EPSILON);
        assert_eq!(f64::threshold(), f64::EPSILON);
    }

    #[test]
    fn test_thresholds_are_independent() {
        // f32 updates must not leak into the f64 cell.
        let before = f64::threshold();
        f32::set_threshold(f32::EPSILON);
        assert_eq!(f64::threshold(), before);
    }

    #[test]
    fn test_from_extent() {
        assert_eq!(f64::from_extent(12), 12.0);
        assert_eq!(f32::from_extent(3), 3.0);
    }
}
