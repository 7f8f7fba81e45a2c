//! K-fold splitting over sequence indices

use crate::error::{Result, SeqselError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single train/test split over sequence indices.
#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `0..n_items` into `n_folds` train/test splits.
///
/// Folds are contiguous and deterministic unless a `shuffle_seed` is given,
/// in which case indices are shuffled reproducibly first. Fold sizes differ by
/// at most one.
pub fn k_fold(n_items: usize, n_folds: usize, shuffle_seed: Option<u64>) -> Result<Vec<FoldSplit>> {
    if n_folds < 2 {
        return Err(SeqselError::ValidationError(
            "n_folds must be at least 2".to_string(),
        ));
    }
    if n_items < n_folds {
        return Err(SeqselError::InsufficientData {
            needed: n_folds,
            available: n_items,
        });
    }

    let mut indices: Vec<usize> = (0..n_items).collect();
    if let Some(seed) = shuffle_seed {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    }

    let base = n_items / n_folds;
    let remainder = n_items % n_folds;

    let mut splits = Vec::with_capacity(n_folds);
    let mut current = 0;
    for fold_idx in 0..n_folds {
        let fold_size = if fold_idx < remainder { base + 1 } else { base };
        let test: Vec<usize> = indices[current..current + fold_size].to_vec();
        let train: Vec<usize> = indices[..current]
            .iter()
            .chain(indices[current + fold_size..].iter())
            .copied()
            .collect();
        splits.push(FoldSplit { train, test });
        current += fold_size;
    }

    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_covers_every_index_once() {
        let splits = k_fold(10, 3, None).unwrap();
        assert_eq!(splits.len(), 3);

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..10).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.test.len(), 10);
            for idx in &split.test {
                assert!(!split.train.contains(idx));
            }
        }
    }

    #[test]
    fn test_k_fold_sizes_differ_by_at_most_one() {
        let splits = k_fold(11, 3, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
    }

    #[test]
    fn test_k_fold_shuffle_is_reproducible() {
        let a = k_fold(8, 2, Some(42)).unwrap();
        let b = k_fold(8, 2, Some(42)).unwrap();
        assert_eq!(a[0].test, b[0].test);
    }

    #[test]
    fn test_k_fold_rejects_bad_input() {
        assert!(k_fold(10, 1, None).is_err());
        assert!(matches!(
            k_fold(2, 3, None),
            Err(SeqselError::InsufficientData {
                needed: 3,
                available: 2
            })
        ));
    }
}
