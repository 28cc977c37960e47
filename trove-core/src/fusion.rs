//! Vector arithmetic for fusing and querying multimodal embeddings.

/// Norms at or below this are treated as zero.
const NORM_EPSILON: f32 = 1e-12;

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide `v` by its L2 norm in place.
///
/// Returns `false` (leaving `v` untouched) when the norm is at or below
/// the epsilon guard.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm <= NORM_EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Concatenate a text and an image embedding (text first) and unit-normalize.
///
/// Returns `None` when either input is empty or the fused vector has zero
/// norm.
pub fn fuse(text: &[f32], image: &[f32]) -> Option<Vec<f32>> {
    if text.is_empty() || image.is_empty() {
        return None;
    }
    let mut fused = Vec::with_capacity(text.len() + image.len());
    fused.extend_from_slice(text);
    fused.extend_from_slice(image);
    if !normalize(&mut fused) {
        return None;
    }
    Some(fused)
}

/// Repeat `v` end-to-end until `target` dimensions are reached, truncating
/// the final copy. A target at or below the input length truncates instead.
pub fn tile(v: &[f32], target: usize) -> Vec<f32> {
    if v.is_empty() || target == 0 {
        return Vec::new();
    }
    v.iter().copied().cycle().take(target).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fused_vector_is_text_then_image() {
        let fused = fuse(&[3.0, 0.0], &[0.0, 4.0]).unwrap();
        assert_eq!(fused.len(), 4);
        // 3-4-5 triangle: norm 5, so components scale to 0.6 and 0.8.
        assert!((fused[0] - 0.6).abs() < 1e-6);
        assert_eq!(fused[1], 0.0);
        assert_eq!(fused[2], 0.0);
        assert!((fused[3] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn fused_vector_has_unit_norm() {
        let fused = fuse(&[0.1, 0.2, 0.3], &[0.4, 0.5, 0.6]).unwrap();
        assert!((l2_norm(&fused) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn zero_norm_inputs_are_rejected() {
        assert!(fuse(&[0.0, 0.0], &[0.0, 0.0]).is_none());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(fuse(&[], &[1.0]).is_none());
        assert!(fuse(&[1.0], &[]).is_none());
    }

    #[test]
    fn tile_repeats_the_vector_end_to_end() {
        let tiled = tile(&[1.0, 2.0], 5);
        assert_eq!(tiled, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn tile_halves_are_identical_when_target_doubles() {
        let v = vec![0.1, -0.2, 0.3, 0.4];
        let tiled = tile(&v, v.len() * 2);
        assert_eq!(&tiled[..v.len()], &tiled[v.len()..]);
        assert_eq!(&tiled[..v.len()], v.as_slice());
    }

    #[test]
    fn tile_truncates_when_target_is_smaller() {
        assert_eq!(tile(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn tile_of_empty_input_is_empty() {
        assert!(tile(&[], 4).is_empty());
        assert!(tile(&[1.0], 0).is_empty());
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        assert!(!normalize(&mut v));
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
