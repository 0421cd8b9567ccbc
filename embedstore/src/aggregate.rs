use crate::StoreError;

/// Reduces per-utterance embeddings to one speaker embedding by taking the
/// elementwise arithmetic mean along the batch axis.
///
/// All vectors must share the dimensionality of the first one. Sums are
/// accumulated in f64, so the result does not depend on input order beyond
/// f32 rounding of the final division.
pub fn aggregate<V: AsRef<[f32]>>(entity_id: &str, vectors: &[V]) -> Result<Vec<f32>, StoreError> {
    let first = vectors.first().ok_or_else(|| StoreError::NoEmbeddingsFound {
        entity_id: entity_id.to_string(),
    })?;
    let dim = first.as_ref().len();

    let mut sum = vec![0.0f64; dim];
    for v in vectors {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                got: v.len(),
            });
        }
        for (acc, &x) in sum.iter_mut().zip(v) {
            *acc += x as f64;
        }
    }

    let n = vectors.len() as f64;
    Ok(sum.into_iter().map(|s| (s / n) as f32).collect())
}
