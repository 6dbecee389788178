//! Position arithmetic for a forest of perfect binary trees.
//!
//! Positions number every node of a forest that has room for
//! `2^forest_rows` leaves. Row 0 (the leaves) occupies `0..2^forest_rows`,
//! each following row starts right after the previous one, and the single
//! top node sits at `2^(forest_rows + 1) - 2`.

use std::collections::BTreeSet;

use thicket_core::types::Hash256;

/// Domain separation prefix for internal node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Number of rows needed to hold `num_leaves` leaves.
pub fn tree_rows(num_leaves: u64) -> u8 {
    if num_leaves <= 1 {
        0
    } else {
        (64 - (num_leaves - 1).leading_zeros()) as u8
    }
}

/// Position of the parent of `pos`.
pub fn parent(pos: u64, forest_rows: u8) -> u64 {
    (pos >> 1) | (1u64 << forest_rows)
}

/// Row that `pos` lives on.
pub fn detect_row(pos: u64, forest_rows: u8) -> u8 {
    let mut marker = 1u64 << forest_rows;
    let mut row = 0u8;
    while marker != 0 && pos & marker != 0 {
        marker >>= 1;
        row += 1;
    }
    row
}

/// Position of the root on `row`. Only meaningful when bit `row` of
/// `num_leaves` is set.
pub fn root_position(num_leaves: u64, row: u8, forest_rows: u8) -> u64 {
    let mask = (2u64 << forest_rows).wrapping_sub(1);
    let before = num_leaves & mask.checked_shl(u32::from(row) + 1).unwrap_or(0);
    let shifted = (before >> row) | mask.checked_shl(u32::from(forest_rows + 1 - row)).unwrap_or(0);
    shifted & mask
}

/// Whether `pos` is one of the roots of a forest with `num_leaves` leaves.
pub fn is_root_position(pos: u64, num_leaves: u64, forest_rows: u8) -> bool {
    let row = detect_row(pos, forest_rows);
    (num_leaves >> row) & 1 == 1 && root_position(num_leaves, row, forest_rows) == pos
}

/// Positions of the roots, tallest tree first.
pub fn root_positions(num_leaves: u64) -> Vec<u64> {
    let rows = tree_rows(num_leaves);
    (0..=rows)
        .rev()
        .filter(|row| (num_leaves >> row) & 1 == 1)
        .map(|row| root_position(num_leaves, row, rows))
        .collect()
}

/// Hash of an internal node: `BLAKE3(0x01 || left || right)`.
///
/// A node whose children are both empty is itself empty.
pub fn parent_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    if left.is_zero() && right.is_zero() {
        return Hash256::ZERO;
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Positions whose hashes a proof for `targets` must carry, ascending.
///
/// A sibling is needed unless it can itself be computed from the targets.
pub fn proof_positions(targets: &[u64], num_leaves: u64, forest_rows: u8) -> Vec<u64> {
    let mut computed: BTreeSet<u64> = targets.iter().copied().collect();
    let mut needed = BTreeSet::new();

    for row in 0..=forest_rows {
        let row_nodes: Vec<u64> = computed
            .iter()
            .copied()
            .filter(|&p| detect_row(p, forest_rows) == row)
            .collect();
        for pos in row_nodes {
            if is_root_position(pos, num_leaves, forest_rows) {
                continue;
            }
            let sibling = pos ^ 1;
            if !computed.contains(&sibling) {
                needed.insert(sibling);
            }
            computed.insert(parent(pos, forest_rows));
        }
    }

    needed.into_iter().collect()
}
