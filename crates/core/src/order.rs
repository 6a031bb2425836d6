//! Ordering reconciliation for matched sequences
//!
//! After the differ pairs up two child lists by matching key, the pairs are
//! presented in an order that starts with the left-hand list's order and
//! weaves in as much of the right-hand list's order as is compatible.

/// Updates `indexes1` with items from `indexes2`, incorporating as much of
/// the latter's order as is compatible.
///
/// New items are greedily inserted at the first position satisfying the
/// right-hand ordering.
///
/// Example, before and after:
///
/// ```text
/// indexes1: rose, george, emily
/// indexes2: george, ted, emily
///
/// indexes1: rose, george, ted, emily
/// ```
pub fn extend_order<T: PartialEq + Clone>(indexes1: &mut Vec<T>, indexes2: &[T]) {
    // keep track of where we can insert in indexes1
    let mut pos = 0;
    for value in indexes2 {
        match indexes1.iter().position(|item| item == value) {
            None => {
                // new item, insert at first possible place, then point past it
                indexes1.insert(pos, value.clone());
                pos += 1;
            }
            Some(found) if found >= pos => {
                // safe to use the constraint, point past the found item
                pos = found + 1;
            }
            Some(_) => {}
        }
    }
}

/// Permutes `data` in place: each `data[i]` receives `data[permutation[i]]`,
/// and the permutation is reset to the identity.
///
/// The vectors must have the same length and `permutation` must contain
/// every index exactly once.
pub fn permute<T>(data: &mut [T], permutation: &mut [usize]) {
    let size = permutation.len();
    assert_eq!(data.len(), size, "internal error: bad permute vectors");
    for from in 0..size {
        let mut to = from;
        while permutation[to] != from {
            let next = permutation[to];
            assert!(next < size, "internal error: bad permute index");
            data.swap(to, next);
            permutation[to] = to;
            // continue resolving the cycle from the swapped-in slot
            to = next;
        }
        permutation[to] = to;
    }
}

/// Reorders matched pairs according to their implicit ordering constraints.
///
/// Each element carries up to two abstract positions, the original indexes
/// of the matched item in the left and right sequences; at least one must
/// be present. The left ordering has precedence in the event of a conflict.
pub fn reorder(data: &mut [(Option<usize>, Option<usize>)]) {
    let size = data.len();
    // Split out the ordering constraints as position-index pairs.
    let mut positions1 = Vec::with_capacity(size);
    let mut positions2 = Vec::with_capacity(size);
    for (index, (position1, position2)) in data.iter().enumerate() {
        assert!(
            position1.is_some() || position2.is_some(),
            "internal error: reorder constraint with no positions"
        );
        if let Some(position1) = position1 {
            positions1.push((*position1, index));
        }
        if let Some(position2) = position2 {
            positions2.push((*position2, index));
        }
    }
    // Order the indexes by the desired positions.
    positions1.sort();
    positions2.sort();
    let mut indexes1: Vec<usize> = positions1.into_iter().map(|(_, index)| index).collect();
    let indexes2: Vec<usize> = positions2.into_iter().map(|(_, index)| index).collect();
    // Merge the two orderings of indexes.
    extend_order(&mut indexes1, &indexes2);
    // Use this to permute the original data array.
    permute(data, &mut indexes1);
}
