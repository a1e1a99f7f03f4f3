//!
//! Pure key arithmetic on one-dimensional (level, index) pairs.
//!
//! Level `0` encodes the two boundary anchors `(0,0)` and `(0,1)`; both share
//! the single child `(1,1)`. For `level >= 1` the index is odd and lies in
//! `1..2^level`.
//!

/// Deepest level that can be represented without overflowing a `u32` index.
pub const MAX_LEVEL: u8 = 31;

#[inline]
pub fn is_valid(level: u8, index: u32) -> bool
{
    if level == 0
    {
        index <= 1
    }
    else
    {
        level <= MAX_LEVEL && index % 2 == 1 && (index as u64) < (1u64 << level)
    }
}

///
/// Left child of `(level, index)`. Level-zero anchors descend to `(1,1)`.
/// Returns `None` if the child would exceed [`MAX_LEVEL`].
///
#[inline]
pub fn left_child(level: u8, index: u32) -> Option<(u8, u32)>
{
    if level == 0
    {
        return Some((1, 1));
    }
    if level >= MAX_LEVEL
    {
        return None;
    }
    Some((level + 1, 2 * index - 1))
}

#[inline]
pub fn right_child(level: u8, index: u32) -> Option<(u8, u32)>
{
    if level == 0
    {
        return Some((1, 1));
    }
    if level >= MAX_LEVEL
    {
        return None;
    }
    Some((level + 1, 2 * index + 1))
}

///
/// Hierarchical parent: `(level - 1, nearest odd of index / 2)`.
/// Level one and level zero have no parent on the interior hierarchy.
///
#[inline]
pub fn parent(level: u8, index: u32) -> Option<(u8, u32)>
{
    if level < 2
    {
        return None;
    }
    Some((level - 1, (index >> 1) | 1))
}

/// Position of `(level, index)` in the unit interval.
#[inline]
pub fn unit_coordinate(level: u8, index: u32) -> f64
{
    index as f64 / (1u64 << level) as f64
}

#[test]
fn test_children_and_parent()
{
    assert_eq!(left_child(2, 3), Some((3, 5)));
    assert_eq!(right_child(2, 3), Some((3, 7)));
    assert_eq!(parent(3, 5), Some((2, 3)));
    assert_eq!(parent(3, 7), Some((2, 3)));
    assert_eq!(parent(3, 1), Some((2, 1)));
    assert_eq!(parent(3, 3), Some((2, 1)));
    assert_eq!(parent(2, 1), Some((1, 1)));
    assert_eq!(parent(1, 1), None);
    assert_eq!(parent(0, 1), None);
}

#[test]
fn test_level_zero_and_overflow()
{
    assert_eq!(left_child(0, 0), Some((1, 1)));
    assert_eq!(right_child(0, 1), Some((1, 1)));
    let deepest = (1u32 << 31) - 1;
    assert!(is_valid(MAX_LEVEL, deepest));
    assert_eq!(left_child(MAX_LEVEL, deepest), None);
    assert_eq!(right_child(MAX_LEVEL - 1, (1u32 << 30) - 1), Some((MAX_LEVEL, deepest)));
}

#[test]
fn test_validity()
{
    assert!(is_valid(0, 0));
    assert!(is_valid(0, 1));
    assert!(!is_valid(0, 2));
    assert!(is_valid(3, 7));
    assert!(!is_valid(3, 8));
    assert!(!is_valid(3, 9));
    assert!(!is_valid(32, 1));
    assert_eq!(unit_coordinate(2, 3), 0.75);
    assert_eq!(unit_coordinate(0, 1), 1.0);
}
