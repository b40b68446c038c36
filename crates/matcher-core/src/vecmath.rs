//! Pure numeric routines over embedding vectors
//!
//! Everything here is total: degenerate inputs (zero vectors, mismatched
//! sources that were never normalized) yield a score of 0 rather than an
//! error, and results are clamped to [-1, 1] to absorb floating-point
//! overshoot.

/// Norms below this are treated as zero to avoid dividing by ~0.
pub const NORM_EPSILON: f32 = 1e-8;

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Unit-normalize a vector.
///
/// A vector with norm below [`NORM_EPSILON`] is returned unchanged; it can
/// never match anything with a non-zero score.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm < NORM_EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity of two vectors, clamped to [-1, 1].
///
/// Zero-vector inputs score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < NORM_EPSILON || norm_b < NORM_EPSILON {
        return 0.0;
    }
    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine similarity of every query row against every matrix row.
///
/// The matrix is normalized once up front, not per query; this is the
/// performance-critical primitive behind the exact index.
pub fn batch_cosine(queries: &[Vec<f32>], matrix: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let normalized: Vec<Vec<f32>> = matrix.iter().map(|row| normalize(row)).collect();

    queries
        .iter()
        .map(|query| {
            let q = normalize(query);
            normalized
                .iter()
                .map(|row| dot(&q, row).clamp(-1.0, 1.0))
                .collect()
        })
        .collect()
}
