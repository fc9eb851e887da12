//! Scalar vector math used by the store and the embedders.

use crate::{RagError, Result, NORM_EPSILON};

/// Computes the dot product of two vectors.
///
/// When both vectors are unit-norm this equals their cosine similarity,
/// which is the invariant the index maintains for every stored row.
///
/// # Errors
///
/// Returns `RagError::DimensionMismatch` if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use regula_core::vector::dot_product;
///
/// let a = vec![1.0, 0.0, 0.0];
/// let b = vec![0.5, 0.5, 0.0];
/// assert!((dot_product(&a, &b).unwrap() - 0.5).abs() < 1e-6);
/// ```
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(dot_unchecked(a, b))
}

/// Dot product without the length check, for the scan loop where dimensions
/// were validated once up front.
#[inline]
pub(crate) fn dot_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Computes the cosine similarity between two vectors, clamped to [-1, 1].
///
/// Zero vectors compare as 0.0 rather than producing NaN.
///
/// # Errors
///
/// Returns `RagError::DimensionMismatch` if the vectors differ in length.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot_unchecked(a, b) / (norm_a * norm_b);
    Ok(similarity.clamp(-1.0, 1.0))
}

/// L2 norm (vector magnitude).
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalizes a vector to unit length in place. Zero vectors are left
/// untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Whether `v` is unit-norm within the index tolerance.
///
/// The embedder contract promises normalized output, but the loader and the
/// store verify rather than trust: a de-normalized vector would silently
/// turn every dot-product score into a non-cosine quantity.
#[inline]
pub fn is_unit_norm(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() < NORM_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert_eq!(dot_product(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dot_product_identical_unit_vectors() {
        let a = vec![0.6, 0.8, 0.0];
        assert!((dot_product(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(matches!(
            dot_product(&a, &b),
            Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_cosine_equals_dot_for_unit_vectors() {
        let a = vec![0.6, 0.8, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let dot = dot_product(&a, &b).unwrap();
        let cos = cosine_similarity(&a, &b).unwrap();
        assert!((dot - cos).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_opposite_direction() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_is_unit_norm_tolerance() {
        assert!(is_unit_norm(&[1.0, 0.0]));
        assert!(is_unit_norm(&[1.0005, 0.0]));
        assert!(!is_unit_norm(&[1.1, 0.0]));
        assert!(!is_unit_norm(&[0.0, 0.0]));
    }
}
