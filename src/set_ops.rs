//! Sorted-merge set algebra used by every bulk persist path.
//!
//! All operations work on any totally ordered `T`. `Option<T>` gets the
//! ordering the store needs for free: `None` sorts strictly before any
//! `Some`, and two `None`s compare equal.

/// Sort a copy of `input` and collapse runs of equal elements.
///
/// # Examples
///
/// ```
/// use docman::set_ops::distinct_sorted;
///
/// assert_eq!(distinct_sorted(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
/// ```
pub fn distinct_sorted<T: Ord + Clone>(input: &[T]) -> Vec<T> {
    distinct_sorted_owned(input.to_vec())
}

/// Like [`distinct_sorted`], reusing the caller's buffer.
pub fn distinct_sorted_owned<T: Ord>(mut input: Vec<T>) -> Vec<T> {
    input.sort();
    input.dedup();
    input
}

/// Return every element of `input` that does not occur in `to_remove`.
///
/// The result is sorted. Elements equal to any element of `to_remove` are
/// dropped, every other element passes through with its multiplicity, unless
/// `distinct` is set, in which case duplicates are collapsed too. Neither
/// input is modified.
///
/// # Examples
///
/// ```
/// use docman::set_ops::remove_all;
///
/// let kept = remove_all(&["b", "a", "c", "a"], &["c"], false);
/// assert_eq!(kept, vec!["a", "a", "b"]);
///
/// let kept = remove_all(&["b", "a", "c", "a"], &["c"], true);
/// assert_eq!(kept, vec!["a", "b"]);
/// ```
pub fn remove_all<T: Ord + Clone>(
    input: &[T],
    to_remove: &[T],
    distinct: bool,
) -> Vec<T> {
    remove_all_owned(input.to_vec(), to_remove.to_vec(), distinct)
}

/// Like [`remove_all`], taking ownership of both buffers so they can be
/// sorted in place instead of copied.
pub fn remove_all_owned<T: Ord>(
    input: Vec<T>,
    mut to_remove: Vec<T>,
    distinct: bool,
) -> Vec<T> {
    let mut input = if distinct {
        distinct_sorted_owned(input)
    } else {
        let mut input = input;
        input.sort();
        input
    };

    if to_remove.is_empty() {
        return input;
    }
    to_remove.sort();

    // Single merge pass: the cursor only ever moves forward, so the whole
    // scan is O(n + m) on top of the two sorts.
    let mut cursor = 0;
    input.retain(|el| {
        while cursor < to_remove.len() && to_remove[cursor] < *el {
            cursor += 1;
        }
        cursor >= to_remove.len() || to_remove[cursor] != *el
    });
    input
}

/// Split `items` into consecutive chunks of at most `max_size` elements.
///
/// Order is preserved. A `max_size` of zero is treated as one.
///
/// # Examples
///
/// ```
/// use docman::set_ops::partition;
///
/// let chunks: Vec<&[u32]> = partition(&[1, 2, 3, 4, 5], 2).collect();
/// assert_eq!(chunks, vec![&[1, 2][..], &[3, 4][..], &[5][..]]);
/// ```
pub fn partition<T>(
    items: &[T],
    max_size: usize,
) -> impl Iterator<Item = &[T]> {
    items.chunks(max_size.max(1))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn naive_remove_all(input: &[u16], to_remove: &[u16]) -> Vec<u16> {
        let mut kept: Vec<u16> = input
            .iter()
            .copied()
            .filter(|el| !to_remove.contains(el))
            .collect();
        kept.sort();
        kept
    }

    #[test]
    fn removes_exact_matches_only() {
        let kept = remove_all(&[5, 1, 4, 2, 3], &[4, 2, 9], false);
        assert_eq!(kept, vec![1, 3, 5]);
    }

    #[test]
    fn duplicates_pass_through_without_distinct() {
        let kept = remove_all(&[2, 1, 2, 3, 1], &[3], false);
        assert_eq!(kept, vec![1, 1, 2, 2]);
    }

    #[test]
    fn every_copy_of_a_removed_value_goes() {
        let kept = remove_all(&[7, 7, 7, 8], &[7], false);
        assert_eq!(kept, vec![8]);
    }

    #[test]
    fn empty_to_remove_returns_sorted_input() {
        assert_eq!(remove_all(&[3, 1, 3], &[], false), vec![1, 3, 3]);
        assert_eq!(remove_all(&[3, 1, 3], &[], true), vec![1, 3]);
    }

    #[test]
    fn empty_input() {
        let empty: [u8; 0] = [];
        assert!(remove_all(&empty, &[1, 2], true).is_empty());
    }

    #[test]
    fn inputs_are_not_modified() {
        let input = vec![3, 2, 1];
        let to_remove = vec![2, 1];
        let _ = remove_all(&input, &to_remove, true);
        assert_eq!(input, vec![3, 2, 1]);
        assert_eq!(to_remove, vec![2, 1]);
    }

    #[test]
    fn none_sorts_before_some() {
        let input = vec![Some("b"), None, Some("a"), None];
        assert_eq!(
            distinct_sorted(&input),
            vec![None, Some("a"), Some("b")]
        );
        assert_eq!(
            remove_all(&input, &[None], false),
            vec![Some("a"), Some("b")]
        );
    }

    #[test]
    fn partition_preserves_order_and_bounds() {
        let items: Vec<u32> = (0..2500).collect();
        let chunks: Vec<&[u32]> = partition(&items, 999).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 999);
        assert_eq!(chunks[1].len(), 999);
        assert_eq!(chunks[2].len(), 502);
        let joined: Vec<u32> = chunks.concat();
        assert_eq!(joined, items);
    }

    #[test]
    fn partition_of_nothing_is_empty() {
        let items: [u8; 0] = [];
        assert_eq!(partition(&items, 10).count(), 0);
    }

    #[test]
    fn partition_zero_size_means_one() {
        assert_eq!(partition(&[1, 2, 3], 0).count(), 3);
    }

    proptest! {
        #[test]
        fn removing_self_leaves_nothing(a in prop::collection::vec(any::<u16>(), 0..300)) {
            prop_assert!(remove_all(&a, &a, false).is_empty());
        }

        #[test]
        fn removing_nothing_is_distinct_sort(a in prop::collection::vec(any::<u16>(), 0..300)) {
            let mut expected = a.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(remove_all(&a, &[], true), expected);
        }

        #[test]
        fn matches_naive_reference(
            a in prop::collection::vec(0u16..64, 0..300),
            b in prop::collection::vec(0u16..64, 0..300),
        ) {
            prop_assert_eq!(remove_all(&a, &b, false), naive_remove_all(&a, &b));
        }

        #[test]
        fn distinct_result_has_no_neighbours_equal(
            a in prop::collection::vec(0u16..32, 0..200),
            b in prop::collection::vec(0u16..32, 0..50),
        ) {
            let kept = remove_all(&a, &b, true);
            prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
