pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with precomputed norms (both must be non-zero).
pub fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_vectors_score_one() {
        let a = [3.0, 4.0];
        let b = [6.0, 8.0];
        assert_eq!(l2_norm(&a), 5.0);
        let s = cosine_similarity(&a, &b, l2_norm(&a), l2_norm(&b));
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = [1.0, 0.0];
        let b = [0.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b, 1.0, 2.0), 0.0);
    }
}
