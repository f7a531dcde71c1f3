//! Longest increasing subsequence, used to minimize moves in keyed diffs.

/// Positions (indices into `values`) of a longest strictly increasing
/// subsequence of the non-zero entries of `values`.
///
/// Zero entries are ignored: in the keyed diff they mark nodes that have no
/// old counterpart. Runs in O(n log n) using the classic tails array plus a
/// predecessor chain.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];
    // tails[k] = index of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }

        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            predecessors[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = predecessors[i];
    }
    result.reverse();
    result
}
