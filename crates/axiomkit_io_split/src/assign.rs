//! Slicing of an ordered file list into per-split chunks.

use crate::allocate::validate_counts;
use crate::spec::SplitAllocationError;

/// Slice `l_items` into `counts.len()` contiguous, order-preserving chunks.
///
/// Chunk `i` holds items `[offset_i, offset_i + counts[i])` with
/// `offset_i = counts[..i].sum()`. Counts must add up to `l_items.len()`.
pub fn assign_to_splits<T>(
    l_items: Vec<T>,
    counts: &[usize],
) -> Result<Vec<Vec<T>>, SplitAllocationError> {
    validate_counts(l_items.len(), counts.len(), counts)?;

    let mut iter_items = l_items.into_iter();
    Ok(counts
        .iter()
        .map(|n_count| iter_items.by_ref().take(*n_count).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::assign_to_splits;
    use crate::spec::SplitAllocationError;

    #[test]
    fn assign_slices_contiguously() {
        let l_files: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
        let l_splits = assign_to_splits(l_files.clone(), &[7, 2, 1]).expect("assign");
        assert_eq!(l_splits[0], l_files[..7]);
        assert_eq!(l_splits[1], l_files[7..9]);
        assert_eq!(l_splits[2], l_files[9..]);
        assert_eq!(l_splits.concat(), l_files);
    }

    #[test]
    fn assign_allows_empty_chunks() {
        let l_splits = assign_to_splits(vec!["a", "b"], &[0, 2, 0]).expect("assign");
        assert!(l_splits[0].is_empty());
        assert_eq!(l_splits[1], vec!["a", "b"]);
        assert!(l_splits[2].is_empty());

        let l_splits = assign_to_splits(Vec::<&str>::new(), &[0, 0]).expect("assign");
        assert_eq!(l_splits, vec![Vec::<&str>::new(), Vec::new()]);
    }

    #[test]
    fn assign_rejects_mismatched_counts() {
        let err = assign_to_splits(vec![1, 2, 3], &[1, 1]).expect_err("must fail");
        assert!(matches!(err, SplitAllocationError::InvariantViolation { .. }));
    }
}
